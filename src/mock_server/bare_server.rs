use crate::mock_server::hyper::{run_server, ServingConfig};
use crate::registry::Registry;
use crate::session::SessionLog;
use crate::verification::{self, VerificationReport};
use crate::{Expectation, ExpectationHandle, MockHttpError, Request};
use log::{debug, warn};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// The state shared between the test thread and the serving thread.
pub(crate) struct MockHttpState {
    pub(crate) registry: Registry,
    pub(crate) received_requests: Option<Vec<Request>>,
}

/// A cheaply clonable, lock-protected handle to [`MockHttpState`].
///
/// A panic while holding the lock cannot leave the registry half-updated - every update is a
/// single assignment or push - so poisoning is ignored.
#[derive(Clone)]
pub(crate) struct SharedState(Arc<RwLock<MockHttpState>>);

impl SharedState {
    fn new(recording: RequestRecording) -> Self {
        let received_requests = match recording {
            RequestRecording::Enabled => Some(Vec::new()),
            RequestRecording::Disabled => None,
        };
        Self(Arc::new(RwLock::new(MockHttpState {
            registry: Registry::new(),
            received_requests,
        })))
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, MockHttpState> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, MockHttpState> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestRecording {
    Enabled,
    Disabled,
}

/// Where a server is in its life.
///
/// `NotStarted -> Serving -> StopRequested -> Stopped`. There is no way back: a stopped server
/// cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    NotStarted,
    Serving,
    StopRequested,
    Stopped,
}

/// An HTTP server running on a background thread, answering requests according to the
/// registered expectations.
///
/// `BareMockHttp` is the lifecycle controller behind the publicly-exposed `MockHttp`: it owns
/// the serving thread, the stop signal and the channel the serving thread reports back on.
pub(crate) struct BareMockHttp {
    state: SharedState,
    server_address: SocketAddr,
    lifecycle: Lifecycle,
    shutdown_timeout: Duration,
    stop_signal: Arc<AtomicBool>,
    shutdown_receiver: mpsc::Receiver<SessionLog>,
    serving_thread: Option<JoinHandle<()>>,
}

impl BareMockHttp {
    /// Start serving on `listener`.
    ///
    /// It does not return until the serving loop is up and accepting connections.
    pub(super) fn start(
        listener: TcpListener,
        config: ServingConfig,
        shutdown_timeout: Duration,
        recording: RequestRecording,
    ) -> Result<Self, MockHttpError> {
        let mut lifecycle = Lifecycle::NotStarted;
        let server_address = listener.local_addr().map_err(MockHttpError::Startup)?;
        listener
            .set_nonblocking(true)
            .map_err(MockHttpError::Startup)?;

        let state = SharedState::new(recording);
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (ready_sender, ready_receiver) = mpsc::sync_channel(1);
        let (shutdown_sender, shutdown_receiver) = mpsc::sync_channel(1);

        let server_state = state.clone();
        let server_stop_signal = stop_signal.clone();
        let serving_thread = std::thread::Builder::new()
            .name(format!("mock-http-{}", server_address))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_sender.send(Err(e));
                        return;
                    }
                };
                let session = runtime.block_on(run_server(
                    listener,
                    server_state,
                    config,
                    server_stop_signal,
                    ready_sender,
                ));
                // The controller may have given up waiting: nobody to report to.
                let _ = shutdown_sender.send(session);
            })
            .map_err(MockHttpError::Startup)?;

        match ready_receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(MockHttpError::Startup(e)),
            Err(_) => return Err(MockHttpError::ServerCrashed),
        }
        debug!("{:?} -> {:?}", lifecycle, Lifecycle::Serving);
        lifecycle = Lifecycle::Serving;

        Ok(Self {
            state,
            server_address,
            lifecycle,
            shutdown_timeout,
            stop_signal,
            shutdown_receiver,
            serving_thread: Some(serving_thread),
        })
    }

    /// Register an `Expectation` on this instance of `BareMockHttp`.
    pub(crate) fn register(
        &self,
        expectation: Expectation,
    ) -> Result<ExpectationHandle, MockHttpError> {
        let id = self.state.write().registry.register(expectation)?;
        Ok(ExpectationHandle {
            id,
            state: self.state.clone(),
        })
    }

    /// Stop the server, then check what it observed against the registered expectations.
    pub(crate) fn verify(&mut self) -> Result<VerificationReport, MockHttpError> {
        let session = self.shutdown()?;
        let state = self.state.read();
        Ok(verification::verify(session, &state.registry)?)
    }

    /// Ask the serving loop to stop and wait, up to the shutdown timeout, for it to confirm
    /// that the in-flight request (if any) was answered and the listener was closed.
    fn shutdown(&mut self) -> Result<SessionLog, MockHttpError> {
        debug!("{:?} -> {:?}", self.lifecycle, Lifecycle::StopRequested);
        self.lifecycle = Lifecycle::StopRequested;
        self.stop_signal.store(true, Ordering::Release);

        match self.shutdown_receiver.recv_timeout(self.shutdown_timeout) {
            Ok(session) => {
                debug!("{:?} -> {:?}", self.lifecycle, Lifecycle::Stopped);
                self.lifecycle = Lifecycle::Stopped;
                if let Some(serving_thread) = self.serving_thread.take() {
                    // The thread has already sent its report, it is on its way out.
                    let _ = serving_thread.join();
                }
                Ok(session)
            }
            Err(RecvTimeoutError::Timeout) => Err(MockHttpError::ServerShutdownTimeout {
                timeout: self.shutdown_timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => {
                self.lifecycle = Lifecycle::Stopped;
                Err(MockHttpError::ServerCrashed)
            }
        }
    }

    /// Return the base uri of this running instance of `BareMockHttp`, e.g. `http://127.0.0.1:4372`.
    pub(crate) fn uri(&self) -> String {
        format!("http://{}", self.server_address)
    }

    /// Return the socket address of this running instance of `BareMockHttp`, e.g. `127.0.0.1:4372`.
    pub(crate) fn address(&self) -> &SocketAddr {
        &self.server_address
    }

    pub(crate) fn received_requests(&self) -> Option<Vec<Request>> {
        self.state.read().received_requests.clone()
    }
}

impl Drop for BareMockHttp {
    fn drop(&mut self) {
        // A server that timed out while stopping is left to finish on its own.
        if self.lifecycle == Lifecycle::Serving {
            debug!("Mock server dropped without being verified, shutting it down.");
            if let Err(e) = self.shutdown() {
                warn!("Failed to shut down the mock server: {}", e);
            }
        }
    }
}
