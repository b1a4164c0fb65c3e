use crate::mock_server::SharedState;
use crate::registry::ExpectationId;
use crate::{ExpectationFailure, MockHttp, MockHttpError, ResponseTemplate};
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::convert::TryInto;
use std::str::FromStr;

/// How many times an [`Expectation`] may, or must, be invoked during a session.
///
/// `Never`, `Once` and `AtLeastOnce` are checked against every matching request and again
/// when the server is verified; `Unconstrained` (the default) accepts any number of calls,
/// including none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Times {
    #[default]
    Unconstrained,
    /// Any request for this method and path is a failure.
    Never,
    /// Exactly one request must arrive; a second one is rejected.
    Once,
    /// One or more requests must arrive.
    AtLeastOnce,
}

impl Times {
    /// Whether verification fails if the expectation was never invoked.
    pub(crate) fn is_mandatory(self) -> bool {
        matches!(self, Times::Once | Times::AtLeastOnce)
    }
}

/// A request that a [`MockHttp`] is expecting, together with the response it should get.
///
/// An `Expectation` is identified by its method and path: both have to match an incoming
/// request exactly. All other constraints are optional - if you don't set them, the server
/// doesn't care:
/// - [`header`](Expectation::header): the request must carry the header with exactly that value.
///   Headers you don't mention are ignored;
/// - [`query_param`](Expectation::query_param): same, for decoded query parameters;
/// - [`body`](Expectation::body): the request body must be byte-for-byte identical;
/// - [`times`](Expectation::times): how many times the expectation may be invoked;
/// - [`after`](Expectation::after): another, [`named`](Expectation::named), expectation that must
///   have been invoked first.
///
/// Registering a second expectation with the same method and path replaces the first one.
///
/// ### Example:
/// ```rust
/// use mock_http::{Expectation, MockHttp, ResponseTemplate, Times};
///
/// let mock_server = MockHttp::start().unwrap();
///
/// Expectation::given("POST", "/entries")
///     .header("content-type", "application/atom+xml; type=entry")
///     .body("<entry/>")
///     .times(Times::Once)
///     .respond_with(ResponseTemplate::new(201))
///     .mount(&mock_server)
///     .unwrap();
///
/// let status = reqwest::blocking::Client::new()
///     .post(format!("{}/entries", mock_server.uri()))
///     .header("content-type", "application/atom+xml; type=entry")
///     .body("<entry/>")
///     .send()
///     .unwrap()
///     .status();
/// assert_eq!(status, 201);
///
/// mock_server.verify().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Expectation {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) query_params: Vec<(String, String)>,
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) times: Times,
    pub(crate) name: Option<String>,
    pub(crate) after: Option<String>,
    pub(crate) response: ResponseTemplate,
}

impl Expectation {
    /// Start building an `Expectation` for requests with the given method and path.
    ///
    /// Any method is accepted, including extension methods: `"GET"`, `"get"` and
    /// [`Method::GET`] are all equivalent.
    ///
    /// The path must not contain a query string - use [`query_param`](Expectation::query_param)
    /// for that. A missing leading `/` is added for you.
    pub fn given<M, P>(method: M, path: P) -> Self
    where
        M: AsRef<str>,
        P: Into<String>,
    {
        let method = Method::from_str(&method.as_ref().to_ascii_uppercase())
            .expect("Failed to convert to HTTP method.");
        let path = path.into();
        if path.contains('?') {
            panic!(
                "mock_http can't match the path `{}` because it contains a `?`. Use `Expectation::query_param` to require query parameters (the part of the path after the `?`).",
                path
            );
        }
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        Self {
            method,
            path,
            headers: Vec::new(),
            query_params: Vec::new(),
            body: None,
            times: Times::default(),
            name: None,
            after: None,
            response: ResponseTemplate::default(),
        }
    }

    /// Require a header with exactly this value. The header name is case-insensitive.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert into header name.");
        let value = value
            .try_into()
            .expect("Failed to convert into header value.");
        self.headers.push((key, value));
        self
    }

    /// Require several headers at once. See [`header`](Expectation::header).
    pub fn headers<K, V, I>(self, headers: I) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
        I: IntoIterator<Item = (K, V)>,
    {
        headers
            .into_iter()
            .fold(self, |expectation, (key, value)| expectation.header(key, value))
    }

    /// Require a query parameter with exactly this (decoded) value.
    pub fn query_param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Require the request body to be exactly `body`.
    pub fn body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Require the request body to be exactly the JSON serialization of `body`.
    ///
    /// The comparison is still byte-for-byte: the client must serialize the payload the same
    /// way `serde_json` does.
    pub fn body_json<B: Serialize>(mut self, body: B) -> Self {
        let body = serde_json::to_vec(&body).expect("Failed to serialize JSON body");
        self.body = Some(body);
        self
    }

    /// Constrain how many times this expectation may be invoked. See [`Times`].
    pub fn times(mut self, times: Times) -> Self {
        self.times = times;
        self
    }

    /// Assign a name to this expectation, so that later expectations can refer to it with
    /// [`after`](Expectation::after).
    pub fn named<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Only accept requests for this expectation once the expectation named `name` has been
    /// invoked.
    ///
    /// The name is resolved when the expectation is registered: it must belong to an
    /// expectation that has already been mounted, otherwise registration fails with
    /// [`MockHttpError::NameResolution`].
    pub fn after<T: Into<String>>(mut self, name: T) -> Self {
        self.after = Some(name.into());
        self
    }

    /// Set the response returned to matching requests.
    /// It can be changed after registration with [`ExpectationHandle::will`].
    pub fn respond_with(mut self, template: ResponseTemplate) -> Self {
        self.response = template;
        self
    }

    /// Register this expectation on `server`.
    ///
    /// It is a shorthand for [`MockHttp::expects`].
    pub fn mount(self, server: &MockHttp) -> Result<ExpectationHandle, MockHttpError> {
        server.expects(self)
    }
}

/// A reference to an [`Expectation`] registered on a [`MockHttp`].
///
/// Use it to configure the response after registration, or to peek at how many times the
/// expectation has been invoked so far.
#[derive(Clone)]
pub struct ExpectationHandle {
    pub(crate) id: ExpectationId,
    pub(crate) state: SharedState,
}

impl ExpectationHandle {
    /// Specify what to answer to requests matching this expectation.
    ///
    /// The whole response is replaced: status, headers and body set by an earlier
    /// [`respond_with`](Expectation::respond_with) or `will` are dropped, not merged.
    ///
    /// ### Example:
    /// ```rust
    /// use mock_http::{Expectation, MockHttp, ResponseTemplate};
    ///
    /// let mock_server = MockHttp::start().unwrap();
    /// mock_server
    ///     .expects(Expectation::given("GET", "/x"))
    ///     .unwrap()
    ///     .will(ResponseTemplate::new(201).set_body_string("hello"));
    ///
    /// let response = reqwest::blocking::get(format!("{}/x", mock_server.uri())).unwrap();
    /// assert_eq!(response.status(), 201);
    /// assert_eq!(response.text().unwrap(), "hello");
    ///
    /// mock_server.verify().unwrap();
    /// ```
    pub fn will(self, template: ResponseTemplate) -> Self {
        self.state
            .write()
            .registry
            .get_mut(self.id)
            .specification
            .response = template;
        self
    }

    /// How many requests have matched this expectation so far.
    pub fn invocation_count(&self) -> u64 {
        self.state.read().registry.get(self.id).invocation_count
    }

    /// The name given with [`Expectation::named`], if any.
    pub fn name(&self) -> Option<String> {
        self.state
            .read()
            .registry
            .get(self.id)
            .specification
            .name
            .clone()
    }

    /// The most recent failure raised by a request for this expectation, if any.
    ///
    /// Unlike [`MockHttp::verify`], it only looks at requests that reached this expectation:
    /// requests for unregistered routes are not counted here.
    pub fn last_failure(&self) -> Option<ExpectationFailure> {
        self.state
            .read()
            .registry
            .get(self.id)
            .last_failure
            .clone()
    }
}
