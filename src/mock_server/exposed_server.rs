use crate::mock_server::bare_server::BareMockHttp;
use crate::mock_server::MockHttpBuilder;
use crate::{Expectation, ExpectationHandle, MockHttpError, Request, VerificationReport};
use log::debug;
use std::net::SocketAddr;

/// An HTTP server running in the background to behave as one of your dependencies, according
/// to the [`Expectation`]s you register on it.
///
/// Requests are served on a dedicated thread, one at a time. A request that does not live up
/// to the registered expectations gets a `404`; the failure is kept aside and reported when
/// you call [`verify`](MockHttp::verify) at the end of your test.
///
/// You should use one instance of `MockHttp` for each test, to ensure full isolation and
/// no cross-test interference.
pub struct MockHttp(BareMockHttp);

impl MockHttp {
    pub(super) fn new(server: BareMockHttp) -> Self {
        Self(server)
    }

    /// You can use `MockHttp::builder` if you need to specify custom configuration - e.g.
    /// run on a specific port or tune shutdown timings.
    ///
    /// If this is not your case, use [`MockHttp::start`].
    pub fn builder() -> MockHttpBuilder {
        MockHttpBuilder::new()
    }

    /// Start a new instance of a `MockHttp` listening on a random port.
    ///
    /// It returns once the server is ready to accept connections: no request sent after
    /// `start` returns can be missed.
    ///
    /// ### Example:
    /// ```rust
    /// use mock_http::{Expectation, MockHttp};
    ///
    /// let mock_server_one = MockHttp::start().unwrap();
    /// let mock_server_two = MockHttp::start().unwrap();
    ///
    /// assert!(mock_server_one.address() != mock_server_two.address());
    ///
    /// // Registering the expectation with the first mock server only!
    /// mock_server_one.expects(Expectation::given("GET", "/")).unwrap();
    ///
    /// let status = reqwest::blocking::get(mock_server_one.uri()).unwrap().status();
    /// assert_eq!(status, 200);
    ///
    /// // This would have matched, but nothing is registered on `mock_server_two`.
    /// let status = reqwest::blocking::get(mock_server_two.uri()).unwrap().status();
    /// assert_eq!(status, 404);
    ///
    /// assert!(mock_server_one.verify().is_ok());
    /// assert!(mock_server_two.verify().is_err());
    /// ```
    pub fn start() -> Result<Self, MockHttpError> {
        Self::builder().start()
    }

    /// Register an [`Expectation`] on this `MockHttp`, replacing any expectation previously
    /// registered for the same method and path.
    ///
    /// It fails with [`MockHttpError::NameResolution`] if the expectation is declared
    /// [`after`](Expectation::after) a name no registered expectation carries.
    pub fn expects(&self, expectation: Expectation) -> Result<ExpectationHandle, MockHttpError> {
        self.0.register(expectation)
    }

    /// Stop the server and check that it has met all its expectations.
    ///
    /// It blocks until the serving thread has answered any in-flight request and closed the
    /// listener (or until the shutdown timeout expires). Then:
    /// - if any request was rejected, the most recent rejection is the error;
    /// - otherwise, the first [`Times::Once`] or [`Times::AtLeastOnce`] expectation that was
    ///   never invoked fails with [`ExpectationFailure::UnretrievedUrl`].
    ///
    /// [`Times::Once`]: crate::Times::Once
    /// [`Times::AtLeastOnce`]: crate::Times::AtLeastOnce
    /// [`ExpectationFailure::UnretrievedUrl`]: crate::ExpectationFailure::UnretrievedUrl
    pub fn verify(mut self) -> Result<VerificationReport, MockHttpError> {
        debug!("Verify mock expectations.");
        let outcome = self.0.verify();
        if let Err(e) = &outcome {
            debug!("Verification failed: {}\n{}", e, self.received_requests_message());
        }
        outcome
    }

    fn received_requests_message(&self) -> String {
        match self.0.received_requests() {
            Some(received_requests) if received_requests.is_empty() => {
                "The server did not receive any request.".into()
            }
            Some(received_requests) => format!(
                "Received requests:\n{}",
                received_requests
                    .iter()
                    .enumerate()
                    .map(|(index, request)| {
                        format!("- Request #{}\n\t{}", index + 1, request.request_line())
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
            None => "Enable request recording on the mock server to get the list of incoming requests as part of the failure message.".into(),
        }
    }

    /// Return the base uri of this running instance of `MockHttp`, e.g. `http://127.0.0.1:4372`.
    ///
    /// Use this method to compose uris when interacting with this instance of `MockHttp` via
    /// an HTTP client.
    pub fn uri(&self) -> String {
        self.0.uri()
    }

    /// Return the socket address of this running instance of `MockHttp`, e.g. `127.0.0.1:4372`.
    ///
    /// Use this method to interact with the `MockHttp` using `TcpStream`s.
    pub fn address(&self) -> &SocketAddr {
        self.0.address()
    }

    /// Return a vector with all the requests received by the `MockHttp` since it started,
    /// matched or not, in arrival order.
    ///
    /// It returns `None` if request recording has been disabled.
    ///
    /// ### Example:
    /// ```rust
    /// use mock_http::MockHttp;
    ///
    /// let mock_server = MockHttp::start().unwrap();
    /// reqwest::blocking::get(format!("{}/nothing-here", mock_server.uri())).unwrap();
    ///
    /// let received_requests = mock_server.received_requests().unwrap();
    /// assert_eq!(received_requests.len(), 1);
    /// assert_eq!(received_requests[0].path(), "/nothing-here");
    /// ```
    pub fn received_requests(&self) -> Option<Vec<Request>> {
        self.0.received_requests()
    }
}
