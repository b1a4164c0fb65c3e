//! Convenient re-exports of http types that are part of `mock_http`'s public API.
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
pub use url::Url;
