//! # ServerRunner: network servers as actors.
//!
//! [`ServerRunner`] bridges a "serve on a listener" component into the
//! [`Actor`] contract:
//!
//! ```text
//! execute()                      interrupt(cause)
//!   │                              ├─► closing = true
//!   ├─► log "starting server"      ├─► Graceful? shutdown()  ── bounded by
//!   └─► server.serve(listener)     │       │                     shutdown_timeout
//!         │                        │       └─ error ─► ErrorHandler   and force token
//!         │                        └─► server.close() (always)
//!         ▼                                └─ error ─► ErrorHandler
//!   Closed while closing → Ok(())
//!   other error          → ActorError::Serve
//! ```
//!
//! Servers without a graceful capability ([`ServerHandle::Basic`]) go straight to
//! `close`, even when a shutdown timeout is configured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::Actor;
use crate::error::{ActorError, RunnerError, ServerError};
use crate::events::{Bus, Event, EventKind, PublishExt};
use crate::reloader::Listener;
use crate::runner::error_handler::{ErrorHandler, LogErrorHandler};

/// Accepts connections from a listener and answers requests.
#[async_trait]
pub trait Server: Send + Sync + 'static {
    /// Serves on `listener` until the server is closed or fails.
    ///
    /// Should return [`ServerError::Closed`] when stopped by [`close`](Server::close)
    /// or by a completed graceful shutdown.
    async fn serve(&self, listener: Listener) -> Result<(), ServerError>;

    /// Stops serving immediately, dropping open connections.
    async fn close(&self) -> Result<(), ServerError>;
}

/// A server that can stop accepting and drain in-flight requests.
#[async_trait]
pub trait GracefulServer: Server {
    /// Stops accepting new connections and waits for in-flight ones to finish.
    ///
    /// The caller bounds the wait; implementations need not enforce a deadline.
    async fn shutdown(&self) -> Result<(), ServerError>;
}

/// A server together with its shutdown capability.
#[derive(Clone)]
pub enum ServerHandle {
    /// Only `serve` and `close`.
    Basic(Arc<dyn Server>),
    /// Supports graceful shutdown before `close`.
    Graceful(Arc<dyn GracefulServer>),
}

impl ServerHandle {
    /// Wraps a server without graceful shutdown.
    pub fn basic(server: impl Server) -> Self {
        ServerHandle::Basic(Arc::new(server))
    }

    /// Wraps a server with graceful shutdown.
    pub fn graceful(server: impl GracefulServer) -> Self {
        ServerHandle::Graceful(Arc::new(server))
    }

    /// True for [`ServerHandle::Graceful`].
    pub fn is_graceful(&self) -> bool {
        matches!(self, ServerHandle::Graceful(_))
    }

    async fn serve(&self, listener: Listener) -> Result<(), ServerError> {
        match self {
            ServerHandle::Basic(s) => s.serve(listener).await,
            ServerHandle::Graceful(s) => s.serve(listener).await,
        }
    }

    async fn close(&self) -> Result<(), ServerError> {
        match self {
            ServerHandle::Basic(s) => s.close().await,
            ServerHandle::Graceful(s) => s.close().await,
        }
    }
}

/// Actor serving one listener with one server.
pub struct ServerRunner {
    name: Arc<str>,
    server: ServerHandle,
    listener: Mutex<Option<Listener>>,
    closing: AtomicBool,
    shutdown_timeout: Option<Duration>,
    error_handler: Arc<dyn ErrorHandler>,
    force: CancellationToken,
    bus: Option<Bus>,
}

impl ServerRunner {
    /// Starts building a runner.
    pub fn builder() -> ServerRunnerBuilder {
        ServerRunnerBuilder::default()
    }

    /// Graceful shutdown bounded by the timeout and the force token.
    async fn drain(&self, server: &dyn GracefulServer) -> Result<(), ServerError> {
        let shutdown = async {
            match self.shutdown_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, server.shutdown()).await {
                    Ok(res) => res,
                    Err(_) => Err(ServerError::ShutdownTimeout { timeout }),
                },
                None => server.shutdown().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.force.cancelled() => Err(ServerError::ShutdownAborted),
            res = shutdown => res,
        }
    }

    fn report(&self, err: ServerError) {
        self.error_handler.handle(&err);
    }
}

#[async_trait]
impl Actor for ServerRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), ActorError> {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(listener) = listener else {
            return Err(RunnerError::AlreadyStarted {
                server: self.name.to_string(),
            }
            .into());
        };
        if self.closing.load(Ordering::SeqCst) {
            return Ok(());
        }

        let address = listener.address();
        tracing::info!(
            server = %self.name,
            network = listener.network(),
            %address,
            "starting server"
        );
        self.bus.emit(|| {
            Event::new(EventKind::ServerStarting)
                .with_actor(Arc::clone(&self.name))
                .with_address(address.as_str())
        });

        match self.server.serve(listener).await {
            Ok(()) => Ok(()),
            Err(ServerError::Closed) if self.closing.load(Ordering::SeqCst) => Ok(()),
            Err(err) => Err(ActorError::Serve {
                server: self.name.to_string(),
                error: err.to_string(),
            }),
        }
    }

    async fn interrupt(&self, cause: Option<ActorError>) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(server = %self.name, cause = ?cause, "shutting server down");

        if let ServerHandle::Graceful(server) = &self.server {
            tracing::info!(server = %self.name, timeout = ?self.shutdown_timeout, "attempting graceful shutdown");
            self.bus.emit(|| {
                let ev = Event::new(EventKind::ServerShuttingDown).with_actor(Arc::clone(&self.name));
                match self.shutdown_timeout {
                    Some(t) => ev.with_timeout(t),
                    None => ev,
                }
            });

            if let Err(err) = self.drain(server.as_ref()).await {
                self.bus.emit(|| {
                    Event::new(EventKind::GracefulShutdownFailed)
                        .with_actor(Arc::clone(&self.name))
                        .with_reason(err.to_string())
                });
                self.report(err);
            }
        }

        if let Err(err) = self.server.close().await {
            self.report(err);
        }
        self.bus
            .emit(|| Event::new(EventKind::ServerClosed).with_actor(Arc::clone(&self.name)));
    }
}

/// Builder for [`ServerRunner`].
///
/// ```no_run
/// # use gracevisor::{Reloader, ServerHandle, ServerRunner, Config};
/// # fn demo(reloader: &Reloader, server: ServerHandle) -> Result<(), Box<dyn std::error::Error>> {
/// let runner = ServerRunner::builder()
///     .name("http")
///     .server(server)
///     .listener(reloader.listen("tcp", "127.0.0.1:8080")?)
///     .shutdown_timeout(std::time::Duration::from_secs(15))
///     .build()?;
/// # Ok(()) }
/// ```
#[derive(Default)]
pub struct ServerRunnerBuilder {
    name: Option<Arc<str>>,
    server: Option<ServerHandle>,
    listener: Option<Listener>,
    shutdown_timeout: Duration,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    force: Option<CancellationToken>,
    bus: Option<Bus>,
}

impl ServerRunnerBuilder {
    /// Actor name (defaults to `server`).
    pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The server to run.
    pub fn server(mut self, server: ServerHandle) -> Self {
        self.server = Some(server);
        self
    }

    /// The listener to serve on; owned by the runner.
    pub fn listener(mut self, listener: Listener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Graceful shutdown deadline; `0s` waits indefinitely.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Receiver of shutdown and close errors (defaults to [`LogErrorHandler`]).
    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Token that, once cancelled, abandons a pending graceful shutdown.
    pub fn force_token(mut self, token: CancellationToken) -> Self {
        self.force = Some(token);
        self
    }

    /// Publishes server lifecycle events on `bus`.
    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Validates the configuration and builds the runner.
    pub fn build(self) -> Result<ServerRunner, RunnerError> {
        let server = self.server.ok_or(RunnerError::MissingServer)?;
        let listener = self.listener.ok_or(RunnerError::MissingListener)?;

        Ok(ServerRunner {
            name: self.name.unwrap_or_else(|| Arc::from("server")),
            server,
            listener: Mutex::new(Some(listener)),
            closing: AtomicBool::new(false),
            shutdown_timeout: (!self.shutdown_timeout.is_zero()).then_some(self.shutdown_timeout),
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(LogErrorHandler)),
            force: self.force.unwrap_or_default(),
            bus: self.bus,
        })
    }
}
