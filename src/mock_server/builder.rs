use crate::mock_server::bare_server::{BareMockHttp, RequestRecording};
use crate::mock_server::hyper::ServingConfig;
use crate::request::{BodyPrintLimit, BODY_PRINT_LIMIT};
use crate::{MockHttp, MockHttpError};
use std::env;
use std::net::TcpListener;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A builder providing a fluent API to assemble a [`MockHttp`] step-by-step.
/// Use [`MockHttp::builder`] to get started.
///
/// Defaults can be overridden with environment variables, read when the builder is created:
/// - `MOCK_HTTP_BODY_PRINT_LIMIT`, in bytes;
/// - `MOCK_HTTP_POLL_INTERVAL_MS`;
/// - `MOCK_HTTP_SHUTDOWN_TIMEOUT_MS`;
/// - `MOCK_HTTP_REQUEST_TIMEOUT_MS`.
pub struct MockHttpBuilder {
    listener: Option<TcpListener>,
    port: Option<u16>,
    record_incoming_requests: bool,
    body_print_limit: BodyPrintLimit,
    poll_interval: Duration,
    shutdown_timeout: Duration,
    request_timeout: Duration,
}

impl MockHttpBuilder {
    pub(super) fn new() -> Self {
        let body_print_limit = match env::var("MOCK_HTTP_BODY_PRINT_LIMIT")
            .ok()
            .and_then(|x| x.parse::<usize>().ok())
        {
            Some(limit) => BodyPrintLimit::Limited(limit),
            None => BodyPrintLimit::Limited(BODY_PRINT_LIMIT),
        };
        Self {
            listener: None,
            port: None,
            record_incoming_requests: true,
            body_print_limit,
            poll_interval: env_millis("MOCK_HTTP_POLL_INTERVAL_MS").unwrap_or(POLL_INTERVAL),
            shutdown_timeout: env_millis("MOCK_HTTP_SHUTDOWN_TIMEOUT_MS")
                .unwrap_or(SHUTDOWN_TIMEOUT),
            request_timeout: env_millis("MOCK_HTTP_REQUEST_TIMEOUT_MS").unwrap_or(REQUEST_TIMEOUT),
        }
    }

    /// Each instance of [`MockHttp`] is, by default, running on a random
    /// port available on your local machine.
    /// With `MockHttpBuilder::listener` you can choose to start the `MockHttp`
    /// instance on a specific port you have already bound.
    ///
    /// ### Example:
    /// ```rust
    /// use mock_http::MockHttp;
    ///
    /// let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    /// let expected_server_address = listener
    ///     .local_addr()
    ///     .expect("Failed to get server address.");
    ///
    /// let mock_server = MockHttp::builder().listener(listener).start().unwrap();
    ///
    /// assert_eq!(&expected_server_address, mock_server.address());
    /// ```
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Listen on `127.0.0.1:<port>` instead of a random port.
    /// Ignored if a [`listener`](MockHttpBuilder::listener) was provided.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// By default, [`MockHttp`] records all incoming requests, see
    /// [`MockHttp::received_requests`]. They are also logged when verification fails.
    pub fn disable_request_recording(mut self) -> Self {
        self.record_incoming_requests = false;
        self
    }

    /// Failure messages include the bodies of the offending requests, truncated to this limit.
    pub fn body_print_limit(mut self, limit: BodyPrintLimit) -> Self {
        self.body_print_limit = limit;
        self
    }

    /// How often an idle server checks whether it has been asked to stop. 100ms by default.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// How long [`MockHttp::verify`] waits for the server to confirm it has stopped before
    /// failing with [`MockHttpError::ServerShutdownTimeout`]. 5s by default.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// How long a single connection may take to deliver its request and receive the response.
    /// Slower connections are dropped. 5s by default.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Finalise the builder and launch the [`MockHttp`] instance!
    ///
    /// It returns once the server is accepting connections.
    pub fn start(self) -> Result<MockHttp, MockHttpError> {
        let listener = match self.listener {
            Some(listener) => listener,
            None => TcpListener::bind(("127.0.0.1", self.port.unwrap_or(0)))
                .map_err(MockHttpError::Startup)?,
        };
        let recording = if self.record_incoming_requests {
            RequestRecording::Enabled
        } else {
            RequestRecording::Disabled
        };
        let config = ServingConfig {
            // A zero interval would turn the accept loop into a busy loop.
            poll_interval: self.poll_interval.max(Duration::from_millis(1)),
            request_timeout: self.request_timeout,
            body_print_limit: self.body_print_limit,
        };
        let bare = BareMockHttp::start(listener, config, self.shutdown_timeout, recording)?;
        Ok(MockHttp::new(bare))
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|x| x.parse::<u64>().ok())
        .map(Duration::from_millis)
}
