use std::fmt;

use http::{HeaderMap, Method};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::RequestLine;

pub const BODY_PRINT_LIMIT: usize = 10_000;

/// Specifies limitations on printing request bodies when logging requests or building failure
/// messages. For some mock servers the bodies may be too large to reasonably print and it may
/// be desirable to limit them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyPrintLimit {
    /// Maximum length of a body to print in bytes.
    Limited(usize),
    /// There is no limit to the size of a body that may be printed.
    Unlimited,
}

/// An incoming request to an instance of [`MockHttp`].
///
/// Each matching attempt works against a `Request`, and every request received by the server
/// is recorded as one (unless recording was disabled), see [`MockHttp::received_requests`].
///
/// [`MockHttp`]: crate::MockHttp
/// [`MockHttp::received_requests`]: crate::MockHttp::received_requests
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    raw_path: String,
}

impl Request {
    /// The path of the request target exactly as it was received, without the query string.
    ///
    /// Unlike `url.path()`, dot segments are left alone: `/a/../b` stays `/a/../b`.
    /// Expectations are matched against this path.
    pub fn path(&self) -> &str {
        &self.raw_path
    }

    /// Look up the decoded value of a query parameter.
    /// If the parameter is repeated, the first occurrence wins.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub(crate) fn request_line(&self) -> RequestLine {
        RequestLine::new(&self.method, self.path())
    }

    pub(crate) async fn from_hyper(
        request: hyper::Request<hyper::body::Incoming>,
    ) -> Result<Request, Box<dyn std::error::Error + Send + Sync>> {
        let (parts, body) = request.into_parts();
        let raw_path = parts.uri.path().to_owned();
        let url = match parts.uri.authority() {
            Some(_) => parts.uri.to_string(),
            None => format!("http://localhost{}", parts.uri),
        }
        .parse()?;

        let body = body.collect().await?.to_bytes();

        Ok(Self {
            url,
            method: parts.method,
            headers: parts.headers,
            body: body.to_vec(),
            raw_path,
        })
    }

    pub(crate) fn print_with_limit(
        &self,
        mut buffer: impl fmt::Write,
        body_print_limit: BodyPrintLimit,
    ) -> fmt::Result {
        writeln!(buffer, "{} {}", self.method, self.url)?;
        for name in self.headers.keys() {
            let values = self
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>();
            let values = values.join(",");
            writeln!(buffer, "{}: {}", name, values)?;
        }
        write_body(buffer, &self.body, body_print_limit)
    }
}

/// Render a body for humans, truncating it to `limit` bytes (on a char boundary).
pub(crate) fn printable_body(body: &[u8], limit: BodyPrintLimit) -> String {
    let mut buffer = String::new();
    // Writing into a `String` cannot fail.
    let _ = write_body(&mut buffer, body, limit);
    buffer.trim_end().to_owned()
}

fn write_body(mut buffer: impl fmt::Write, body: &[u8], limit: BodyPrintLimit) -> fmt::Result {
    match limit {
        BodyPrintLimit::Limited(limit) if body.len() > limit => {
            // A utf-8 char is at most 4 bytes long: one of the next few cut points must work.
            for end_byte in limit..(limit + 4).min(body.len()) {
                if let Ok(truncated) = std::str::from_utf8(&body[..end_byte]) {
                    writeln!(buffer, "{}", truncated)?;
                    return writeln!(
                        buffer,
                        "We truncated the body because it was too large: {} bytes (limit: {} bytes)\n\
                         Increase this limit by setting `MOCK_HTTP_BODY_PRINT_LIMIT`, or calling \
                         `MockHttpBuilder::body_print_limit` when building your MockHttp instance",
                        body.len(),
                        limit
                    );
                }
            }
            writeln!(
                buffer,
                "Body is likely binary (invalid utf-8) size is {} bytes",
                body.len()
            )
        }
        _ => {
            if let Ok(body) = std::str::from_utf8(body) {
                writeln!(buffer, "{}", body)
            } else {
                writeln!(
                    buffer,
                    "Body is likely binary (invalid utf-8) size is {} bytes",
                    body.len()
                )
            }
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print_with_limit(f, BodyPrintLimit::Unlimited)
    }
}
