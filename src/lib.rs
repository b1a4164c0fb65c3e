//! `mock_http` provides a mock HTTP server that really works, to unit test programs that
//! depend on web services.
//!
//! You tell the server which requests to expect - method, path and, optionally, headers,
//! query parameters, body, how many times and in which order - and what to answer. Then you
//! exercise your code against it: the server runs on a background thread and answers real
//! HTTP requests. At the end of the test, [`MockHttp::verify`] tells you whether the server
//! got what it expected.
//!
//! # Table of Contents
//! 1. [Getting started](#getting-started)
//! 2. [Expectations](#expectations)
//! 3. [Verification](#verification)
//! 4. [Test isolation](#test-isolation)
//! 5. [Configuration](#configuration)
//!
//! ## Getting started
//! ```rust
//! use mock_http::{Expectation, MockHttp, ResponseTemplate};
//!
//! // Start a background HTTP server on a random local port
//! let mock_server = MockHttp::start().unwrap();
//!
//! // Arrange the behaviour of the MockHttp registering an Expectation:
//! // when it receives a GET request on '/index.html' it will respond with a 200 and a body.
//! mock_server
//!     .expects(Expectation::given("GET", "/index.html"))
//!     .unwrap()
//!     .will(ResponseTemplate::new(200).set_body_string("A HTML body."));
//!
//! // If we probe the MockHttp using any HTTP client it behaves as expected.
//! let response = reqwest::blocking::get(format!("{}/index.html", mock_server.uri())).unwrap();
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.text().unwrap(), "A HTML body.");
//!
//! // Stop the server and check it got what it expected.
//! assert!(mock_server.verify().is_ok());
//! ```
//!
//! ## Expectations
//!
//! An [`Expectation`] is identified by method and path: requests for anything else get a `404`.
//! Constraints on headers, query parameters and body are optional - check [`Expectation`]'s
//! documentation. [`Times`] constrains how many times an expectation may be invoked, while
//! [`Expectation::named`] and [`Expectation::after`] impose an order between expectations.
//!
//! ## Verification
//!
//! A request that breaks an expectation is answered with a `404` and the failure is kept
//! aside. [`MockHttp::verify`] stops the server and returns it as an [`ExpectationFailure`] -
//! or, if no request was rejected, complains about [`Times::Once`] and [`Times::AtLeastOnce`]
//! expectations that were never invoked.
//!
//! Only one failure is reported: the most recent one. Requests that succeed afterwards do not
//! clear it.
//!
//! ## Test isolation
//!
//! Each instance of [`MockHttp`] is fully isolated: [`MockHttp::start`] takes care of finding a
//! random port available on your local machine which is assigned to the new [`MockHttp`].
//!
//! You should use one instance of [`MockHttp`] for each test. When a [`MockHttp`] instance goes
//! out of scope without being verified, the server is shut down anyway to free up its port.
//!
//! ## Configuration
//!
//! Use [`MockHttp::builder`] to pick a port, tune how quickly the server notices it has been
//! asked to stop, or how long [`MockHttp::verify`] is willing to wait for it.
//! See [`MockHttpBuilder`] for the environment variables that override the defaults.
mod error;
mod expectation;
pub mod http;
mod matchers;
mod mock_server;
mod registry;
mod request;
mod response_template;
mod session;
mod verification;

pub use error::{ExpectationFailure, MockHttpError, RequestLine};
pub use expectation::{Expectation, ExpectationHandle, Times};
pub use mock_server::{MockHttp, MockHttpBuilder};
pub use request::{BodyPrintLimit, Request, BODY_PRINT_LIMIT};
pub use response_template::ResponseTemplate;
pub use verification::VerificationReport;
