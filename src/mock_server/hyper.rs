use crate::matchers::match_request;
use crate::mock_server::bare_server::SharedState;
use crate::request::BodyPrintLimit;
use crate::session::SessionLog;
use crate::Request;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::{TokioIo, TokioTimer};
use log::debug;
use std::cell::RefCell;
use std::error::Error;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

type DynError = Box<dyn Error + Send + Sync>;

/// Knobs of the serving loop, see `MockHttpBuilder`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ServingConfig {
    /// Upper bound on how long a stop request can go unnoticed while the server is idle.
    pub(crate) poll_interval: Duration,
    /// Upper bound on how long a single connection can keep the loop busy.
    pub(crate) request_timeout: Duration,
    pub(crate) body_print_limit: BodyPrintLimit,
}

/// The actual HTTP server responding to incoming requests according to the registered
/// expectations.
///
/// Connections are served one at a time, in arrival order, each carrying a single request.
/// Between connections the loop checks `stop_signal`, at least once every `poll_interval`.
/// Once it is raised the listener is closed and the session log is returned.
pub(super) async fn run_server(
    listener: std::net::TcpListener,
    state: SharedState,
    config: ServingConfig,
    stop_signal: Arc<AtomicBool>,
    ready: SyncSender<io::Result<()>>,
) -> SessionLog {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            let _ = ready.send(Err(e));
            return SessionLog::default();
        }
    };
    let _ = ready.send(Ok(()));
    if let Ok(address) = listener.local_addr() {
        debug!("Mock server started listening on {}.", address);
    }

    let session = Rc::new(RefCell::new(SessionLog::default()));
    while !stop_signal.load(Ordering::Acquire) {
        let stream = match tokio::time::timeout(config.poll_interval, listener.accept()).await {
            Err(_elapsed) => continue,
            Ok(Ok((stream, _peer))) => stream,
            Ok(Err(e)) if is_transient_io_error(&e) => {
                debug!("Failed to accept a connection: {}", e);
                continue;
            }
            Ok(Err(e)) => {
                session
                    .borrow_mut()
                    .record_serving_error(format!("failed to accept a connection: {}", e));
                // Most likely out of file descriptors: give the OS some room.
                tokio::time::sleep(config.poll_interval).await;
                continue;
            }
        };
        serve_connection(stream, &state, &session, config).await;
    }

    drop(listener);
    debug!("Mock server stopped.");
    session.take()
}

async fn serve_connection(
    stream: TcpStream,
    state: &SharedState,
    session: &Rc<RefCell<SessionLog>>,
    config: ServingConfig,
) {
    let service = {
        let state = state.clone();
        let session = session.clone();
        service_fn(move |request| {
            handle_request(
                request,
                state.clone(),
                session.clone(),
                config.body_print_limit,
            )
        })
    };

    let mut builder = http1::Builder::new();
    builder.keep_alive(false).timer(TokioTimer::new());
    let connection = builder.serve_connection(TokioIo::new(stream), service);

    match tokio::time::timeout(config.request_timeout, connection).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) if is_transient_connection_error(&e) => {
            debug!("Dropping connection: {}", e);
        }
        Ok(Err(e)) => {
            session
                .borrow_mut()
                .record_serving_error(format!("failed to serve a connection: {}", e));
        }
        Err(_elapsed) => {
            debug!(
                "Dropping connection: no complete request/response within {:?}.",
                config.request_timeout
            );
        }
    }
}

async fn handle_request(
    request: hyper::Request<Incoming>,
    state: SharedState,
    session: Rc<RefCell<SessionLog>>,
    body_print_limit: BodyPrintLimit,
) -> Result<hyper::Response<Full<Bytes>>, DynError> {
    let request = Request::from_hyper(request).await?;
    let mut printout = String::new();
    if request.print_with_limit(&mut printout, body_print_limit).is_ok() {
        debug!("Handling request:\n{}", printout);
    }

    let outcome = {
        let mut state = state.write();
        let state = &mut *state;
        if let Some(received_requests) = &mut state.received_requests {
            received_requests.push(request.clone());
        }
        match_request(&mut state.registry, &request, body_print_limit)
    };

    let mut session = session.borrow_mut();
    session.requests_served += 1;
    let response = match outcome {
        Ok(template) => template.generate_response(),
        Err(failure) => {
            debug!("Rejecting request: {}", failure);
            let mut response = hyper::Response::new(Full::new(Bytes::from(failure.to_string())));
            *response.status_mut() = StatusCode::NOT_FOUND;
            session.record_failure(failure);
            response
        }
    };
    Ok(response)
}

/// Errors a misbehaving or impatient client can cause. They must not stop the server.
fn is_transient_io_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

fn is_transient_connection_error(error: &hyper::Error) -> bool {
    let is_transient_hyper_error = |e: &hyper::Error| {
        e.is_incomplete_message()
            || e.is_parse()
            || e.is_closed()
            || e.is_canceled()
            || e.is_timeout()
            || e.is_body_write_aborted()
    };
    if is_transient_hyper_error(error) {
        return true;
    }
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            return is_transient_io_error(e);
        }
        if let Some(e) = cause.downcast_ref::<hyper::Error>() {
            if is_transient_hyper_error(e) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
