use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::group::Group;
use super::supervisor::{Fanout, Supervisor};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::reloader::Reloader;
use crate::runner::{ErrorHandler, LogErrorHandler};
use crate::signals::SignalActor;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            error_handler: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (actors, servers, signals, upgrades)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Handler for shutdown and close errors of servers registered with
    /// [`Supervisor::serve`]. Defaults to [`LogErrorHandler`].
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Builds the supervisor.
    ///
    /// Initializes, in order:
    /// - the event bus
    /// - the reloader (adopting the parent's sockets after an upgrade)
    /// - termination signal handlers
    /// - the SIGHUP reload loop (if `reload_on_hangup`)
    /// - subscriber workers
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Supervisor, RuntimeError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        let reloader = Arc::new(Reloader::with_bus(&self.cfg, bus.clone())?);
        let signals = SignalActor::new()
            .map_err(RuntimeError::Signals)?
            .with_bus(bus.clone());

        let reload_task = if self.cfg.reload_on_hangup {
            match reloader.spawn_reload_listener() {
                Ok(task) => Some(task),
                Err(err) => {
                    reloader.stop();
                    return Err(RuntimeError::Signals(err));
                }
            }
        } else {
            None
        };

        let fanout = subscriber_listener(self.subscribers, &bus);
        Ok(Supervisor {
            group: Group::new().with_bus(bus.clone()),
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(LogErrorHandler)),
            cfg: self.cfg,
            bus,
            reloader,
            signals,
            reload_task,
            fanout,
        })
    }
}

/// Subscribes to the bus and forwards events to the subscriber set.
///
/// Once `done` is cancelled the listener drains what is already buffered,
/// then shuts the set down so every subscriber sees the final events.
fn subscriber_listener(subscribers: Vec<Arc<dyn Subscribe>>, bus: &Bus) -> Fanout {
    let done = CancellationToken::new();
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subscribers, bus.clone());

    let stop = done.clone();
    let task: JoinHandle<()> = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                received = rx.recv() => match received {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    });

    Fanout { done, task }
}
