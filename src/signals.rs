//! # Termination signals as an actor.
//!
//! [`SignalActor`] turns the first termination signal into a clean group exit.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT`
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]
//!
//! ```text
//! new()  ── registers handlers (no signal lost before execute)
//! execute()
//!   ├─ signal      → publish ShutdownRequested, Ok(())
//!   └─ interrupt() → Ok(())
//!   └─► escalation watcher: next signal → force token cancelled
//!                           (ServerRunners skip the rest of graceful shutdown)
//! ```
//!
//! `SIGHUP` is not handled here; see [`Reloader::spawn_reload_listener`](crate::Reloader::spawn_reload_listener).

use std::io;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::Actor;
use crate::error::ActorError;
use crate::events::{Bus, Event, EventKind, PublishExt};

/// Registered termination signal streams.
struct Termination {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    quit: tokio::signal::unix::Signal,
}

impl Termination {
    #[cfg(unix)]
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    #[cfg(not(unix))]
    fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for the next signal and returns its name.
    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "CTRL-C",
            Err(_) => std::future::pending().await,
        }
    }
}

/// Actor that exits on the first termination signal.
pub struct SignalActor {
    signals: Mutex<Option<Termination>>,
    interrupted: CancellationToken,
    force: CancellationToken,
    bus: Option<Bus>,
}

impl SignalActor {
    /// Registers the signal handlers. Must be called inside a tokio runtime.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            signals: Mutex::new(Some(Termination::register()?)),
            interrupted: CancellationToken::new(),
            force: CancellationToken::new(),
            bus: None,
        })
    }

    /// Publishes signal events on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Token cancelled by a termination signal arriving after shutdown began.
    pub fn force_token(&self) -> CancellationToken {
        self.force.clone()
    }

    /// Watches for a repeated signal until forced.
    fn escalate(&self, mut signals: Termination) {
        let force = self.force.clone();
        let bus = self.bus.clone();
        tokio::spawn(async move {
            tokio::select! {
                name = signals.recv() => {
                    tracing::warn!(signal = name, "termination signal repeated, forcing shutdown");
                    bus.emit(|| Event::new(EventKind::ForceRequested).with_reason(name));
                    force.cancel();
                }
                _ = force.cancelled() => {}
            }
        });
    }
}

#[async_trait]
impl Actor for SignalActor {
    fn name(&self) -> &str {
        "signals"
    }

    async fn execute(&self) -> Result<(), ActorError> {
        let Some(mut signals) = self.signals.lock().await.take() else {
            return Err(ActorError::Signal {
                error: "signal actor already started".into(),
            });
        };

        let received = tokio::select! {
            name = signals.recv() => Some(name),
            _ = self.interrupted.cancelled() => None,
        };
        if let Some(name) = received {
            tracing::info!(signal = name, "termination signal received, shutting down");
            self.bus
                .emit(|| Event::new(EventKind::ShutdownRequested).with_reason(name));
        }

        self.escalate(signals);
        Ok(())
    }

    async fn interrupt(&self, _cause: Option<ActorError>) {
        self.interrupted.cancel();
    }
}
