use http::Method;
use std::fmt;
use std::time::Duration;

/// The method and path of the request an [`ExpectationFailure`] is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub path: String,
}

impl RequestLine {
    pub(crate) fn new(method: &Method, path: &str) -> Self {
        Self {
            method: method.clone(),
            path: path.to_owned(),
        }
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A way in which a [`MockHttp`] has failed to live up to the expectations registered on it.
///
/// Failures are detected while the server is handling requests in the background - the
/// offending request is answered with a `404` - and are surfaced to the test author by
/// [`MockHttp::verify`], wrapped in [`MockHttpError::Expectation`].
///
/// [`MockHttp`]: crate::MockHttp
/// [`MockHttp::verify`]: crate::MockHttp::verify
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpectationFailure {
    /// A request for a method and path nobody registered, or for an expectation
    /// registered with [`Times::Never`](crate::Times::Never).
    #[error("Unexpected request {request}: {detail}")]
    UnexpectedUrl { request: RequestLine, detail: String },
    /// A second request for an expectation registered with [`Times::Once`](crate::Times::Once).
    #[error("{request} was requested again: {detail}")]
    AlreadyRetrieved { request: RequestLine, detail: String },
    /// A mandatory expectation that never received a request.
    #[error("{request} was never requested: {detail}")]
    UnretrievedUrl { request: RequestLine, detail: String },
    /// A request that arrived before the one it was registered `after`.
    #[error("{request} was requested out of order: {detail}")]
    OutOfOrder { request: RequestLine, detail: String },
    #[error("Wrong request body on {request}: {detail}")]
    WrongBody { request: RequestLine, detail: String },
    #[error("Missing header on {request}: {detail}")]
    MissingHeader { request: RequestLine, detail: String },
    #[error("Wrong header value on {request}: {detail}")]
    WrongHeaderValue { request: RequestLine, detail: String },
    #[error("Missing query parameter on {request}: {detail}")]
    WrongQueryParam { request: RequestLine, detail: String },
    #[error("Wrong query parameter value on {request}: {detail}")]
    WrongQueryParamValue { request: RequestLine, detail: String },
}

impl ExpectationFailure {
    /// The request this failure was raised for.
    pub fn request(&self) -> &RequestLine {
        match self {
            Self::UnexpectedUrl { request, .. }
            | Self::AlreadyRetrieved { request, .. }
            | Self::UnretrievedUrl { request, .. }
            | Self::OutOfOrder { request, .. }
            | Self::WrongBody { request, .. }
            | Self::MissingHeader { request, .. }
            | Self::WrongHeaderValue { request, .. }
            | Self::WrongQueryParam { request, .. }
            | Self::WrongQueryParamValue { request, .. } => request,
        }
    }

    /// A human-readable explanation of which check failed.
    pub fn detail(&self) -> &str {
        match self {
            Self::UnexpectedUrl { detail, .. }
            | Self::AlreadyRetrieved { detail, .. }
            | Self::UnretrievedUrl { detail, .. }
            | Self::OutOfOrder { detail, .. }
            | Self::WrongBody { detail, .. }
            | Self::MissingHeader { detail, .. }
            | Self::WrongHeaderValue { detail, .. }
            | Self::WrongQueryParam { detail, .. }
            | Self::WrongQueryParamValue { detail, .. } => detail,
        }
    }
}

/// Everything that can go wrong when driving a [`MockHttp`](crate::MockHttp).
#[derive(thiserror::Error, Debug)]
pub enum MockHttpError {
    /// The server observed a request that violated the registered expectations,
    /// or a mandatory expectation was never satisfied.
    #[error(transparent)]
    Expectation(#[from] ExpectationFailure),
    /// The serving thread did not confirm its shutdown in time.
    #[error("The mock server did not shut down within {timeout:?}")]
    ServerShutdownTimeout { timeout: Duration },
    /// `after` referenced a name that no previously registered expectation carries.
    #[error("No expectation named `{name}` has been registered yet")]
    NameResolution { name: String },
    /// The serving thread went away without reporting back.
    #[error("The mock server's serving thread terminated unexpectedly")]
    ServerCrashed,
    #[error("Failed to start the mock server")]
    Startup(#[source] std::io::Error),
}
