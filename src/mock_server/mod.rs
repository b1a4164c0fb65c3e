//! All bits and pieces concerning the HTTP mock server are in this module.
//!
//! `bare_server::BareMockHttp` is the lifecycle controller: it owns the background thread
//! running the `hyper` HTTP server defined in the `hyper` sub-module, tells it when to stop
//! and collects what it observed.
//!
//! `bare_server::BareMockHttp` is not exposed directly: crate users only get to interact with
//! `exposed_server::MockHttp`, a thin facade over it, and with `builder::MockHttpBuilder` to
//! configure it.
mod bare_server;
mod builder;
mod exposed_server;
mod hyper;

pub(crate) use bare_server::SharedState;
pub use builder::MockHttpBuilder;
pub use exposed_server::MockHttp;
