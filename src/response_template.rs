use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use serde::Serialize;
use std::convert::TryInto;

/// The blueprint for the response returned by a [`MockHttp`] when an [`Expectation`] matches
/// an incoming request.
///
/// It defaults to a `200 OK` with no headers and an empty body.
///
/// [`Expectation`]: crate::Expectation
/// [`MockHttp`]: crate::MockHttp
#[derive(Clone, Debug)]
pub struct ResponseTemplate {
    mime: String,
    status_code: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

// `mock_http` is a crate meant for testing - failures are most likely not handled/temporary mistakes.
// Hence we prefer to panic and provide an easier API than to use `Result`s thus pushing
// the burden of "correctness" (and conversions) on the user.
//
// All methods try to accept the widest possible set of inputs and then perform the fallible conversion
// internally, bailing if the fallible conversion fails.
impl ResponseTemplate {
    /// Start building a `ResponseTemplate` specifying the status code of the response.
    pub fn new<S>(s: S) -> Self
    where
        S: TryInto<StatusCode>,
        <S as TryInto<StatusCode>>::Error: std::fmt::Debug,
    {
        let status_code = s.try_into().expect("Failed to convert into status code.");
        Self {
            status_code,
            headers: HeaderMap::new(),
            mime: String::new(),
            body: Vec::new(),
        }
    }

    /// Append a header `value` to list of headers with `key` as header name.
    ///
    /// Unlike `insert_header`, this function will not override the contents of a header.
    pub fn append_header<K, V>(mut self, key: K, value: V) -> Self
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
        self.headers.append(key, value);
        self
    }

    /// Insert a header `value` with `key` as header name, dropping any value already set
    /// for `key`.
    ///
    /// ### Example:
    /// ```rust
    /// use mock_http::{Expectation, MockHttp, ResponseTemplate};
    ///
    /// let mock_server = MockHttp::start().unwrap();
    /// let correlation_id = "1311db4f-fe65-4cb2-b514-1bb47f781aa7";
    /// Expectation::given("GET", "/")
    ///     .respond_with(ResponseTemplate::new(200).insert_header("X-Correlation-ID", correlation_id))
    ///     .mount(&mock_server)
    ///     .unwrap();
    ///
    /// let res = reqwest::blocking::get(mock_server.uri()).unwrap();
    /// assert_eq!(res.headers().get("X-Correlation-ID").unwrap().to_str().unwrap(), correlation_id);
    /// mock_server.verify().unwrap();
    /// ```
    pub fn insert_header<K, V>(mut self, key: K, value: V) -> Self
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
        self.headers.insert(key, value);
        self
    }

    /// Append multiple header key-value pairs.
    ///
    /// Existing header values will not be overridden.
    pub fn append_headers<K, V, I>(mut self, headers: I) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
        I: IntoIterator<Item = (K, V)>,
    {
        let headers = headers.into_iter().map(|(key, value)| {
            (
                key.try_into().expect("Failed to convert into header name."),
                value
                    .try_into()
                    .expect("Failed to convert into header value."),
            )
        });
        self.headers.extend(headers);
        self
    }

    /// Set the response body with bytes.
    ///
    /// No `Content-Type` header is added: set one yourself if your client cares.
    pub fn set_body_bytes<B>(mut self, body: B) -> Self
    where
        B: TryInto<Vec<u8>>,
        <B as TryInto<Vec<u8>>>::Error: std::fmt::Debug,
    {
        self.body = body.try_into().expect("Failed to convert into body.");
        self
    }

    /// Set the response body from a string.
    ///
    /// Like `set_body_bytes`, it does not add a `Content-Type` header.
    pub fn set_body_string<T>(mut self, body: T) -> Self
    where
        T: TryInto<String>,
        <T as TryInto<String>>::Error: std::fmt::Debug,
    {
        let body = body.try_into().expect("Failed to convert into body.");
        self.body = body.into_bytes();
        self
    }

    /// Set the response body to the JSON representation of `body`.
    ///
    /// It sets "Content-Type" to "application/json".
    pub fn set_body_json<B: Serialize>(mut self, body: B) -> Self {
        self.body = serde_json::to_vec(&body).expect("Failed to convert into body.");
        self.mime = "application/json".to_string();
        self
    }

    /// Set a raw response body. The mime type needs to be set because the
    /// raw body could be of any type.
    pub fn set_body_raw<B>(mut self, body: B, mime: &str) -> Self
    where
        B: TryInto<Vec<u8>>,
        <B as TryInto<Vec<u8>>>::Error: std::fmt::Debug,
    {
        self.body = body.try_into().expect("Failed to convert into body.");
        self.mime = mime.to_string();
        self
    }

    /// Generate a response from the template.
    pub(crate) fn generate_response(&self) -> Response<Full<Bytes>> {
        let mut headers = self.headers.clone();
        if !self.mime.is_empty() {
            if let Ok(mime) = HeaderValue::from_str(&self.mime) {
                headers.insert(http::header::CONTENT_TYPE, mime);
            }
        }

        let mut response = Response::new(Full::new(Bytes::from(self.body.clone())));
        *response.status_mut() = self.status_code;
        *response.headers_mut() = headers;
        response
    }
}
