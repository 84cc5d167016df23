//! # Supervisor: wires signals, the reloader and servers into one group.
//!
//! The [`Supervisor`] owns the event bus, the subscriber fan-out, the
//! [`Reloader`] and the [`SignalActor`]. Callers obtain listeners through it,
//! register servers and actors, then [`run`](Supervisor::run) everything as a
//! single [`Group`].
//!
//! ## High-level architecture
//! ```text
//! builder(cfg).build():
//!   Bus::new(cfg.bus_capacity)
//!   Reloader::with_bus()          adopts inherited sockets after an upgrade
//!   SignalActor::new()            SIGINT/SIGTERM/SIGQUIT registered eagerly
//!   spawn_reload_listener()       SIGHUP ─► Reloader::upgrade()
//!   subscriber_listener()         Bus ─► SubscriberSet ─► Subscribe::on_event
//!
//! caller:
//!   listen(net, addr) ─► Listener
//!   serve(name, handle, listener) ─► ServerRunner (shutdown_timeout, force token)
//!   register(actor) / add(name, execute, interrupt)
//!
//! run():
//!   Group[ servers..., actors..., SignalActor, RestartActor ]
//!     ├─ termination signal ─► SignalActor returns ─► servers drain
//!     ├─ successor ready    ─► RestartActor returns ─► servers drain
//!     └─ actor failure      ─► everything interrupted, error returned
//!   Reloader::stop(), subscribers flushed
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use gracevisor::{Config, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut sup = Supervisor::builder(Config::default()).build()?;
//!
//!     let listener = sup.listen("tcp", "127.0.0.1:8080")?;
//!     # #[cfg(feature = "http")]
//!     let app = gracevisor::HttpServer::new(axum::Router::new());
//!     # #[cfg(feature = "http")]
//!     sup.serve("http", app.into_handle(), listener)?;
//!
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::actor::ActorRef;
use super::builder::SupervisorBuilder;
use super::group::Group;
use crate::config::Config;
use crate::error::{ActorError, ReloadError, RunnerError};
use crate::events::Bus;
use crate::reloader::{ExitReason, Listener, Reloader, RestartActor};
use crate::runner::{ErrorHandler, ServerHandle, ServerRunner};
use crate::signals::SignalActor;

/// Subscriber listener task and its stop token.
pub(super) struct Fanout {
    pub(super) done: CancellationToken,
    pub(super) task: JoinHandle<()>,
}

/// Runs servers and actors of one process generation.
pub struct Supervisor {
    pub(super) cfg: Config,
    pub(super) bus: Bus,
    pub(super) reloader: Arc<Reloader>,
    pub(super) signals: SignalActor,
    pub(super) error_handler: Arc<dyn ErrorHandler>,
    pub(super) group: Group,
    pub(super) reload_task: Option<JoinHandle<()>>,
    pub(super) fanout: Fanout,
}

impl Supervisor {
    /// Creates a [`SupervisorBuilder`].
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    /// Event bus shared by every component.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The reloader of this process generation.
    pub fn reloader(&self) -> &Arc<Reloader> {
        &self.reloader
    }

    /// Token cancelled by a repeated termination signal.
    pub fn force_token(&self) -> CancellationToken {
        self.signals.force_token()
    }

    /// Returns a listener for `(network, address)`, inherited from the parent when available.
    pub fn listen(&self, network: &str, address: &str) -> Result<Listener, ReloadError> {
        self.reloader.listen(network, address)
    }

    /// Registers `server` on `listener`.
    ///
    /// The runner uses the configured shutdown timeout, the supervisor's error
    /// handler and the force token of the signal actor.
    pub fn serve(
        &mut self,
        name: &str,
        server: ServerHandle,
        listener: Listener,
    ) -> Result<(), RunnerError> {
        let runner = ServerRunner::builder()
            .name(name)
            .server(server)
            .listener(listener)
            .shutdown_timeout(self.cfg.shutdown_timeout)
            .error_handler(Arc::clone(&self.error_handler))
            .force_token(self.signals.force_token())
            .bus(self.bus.clone())
            .build()?;
        self.group.register(Arc::new(runner));
        Ok(())
    }

    /// Registers a trait actor.
    pub fn register(&mut self, actor: ActorRef) {
        self.group.register(actor);
    }

    /// Registers an actor given as an `execute` future and an `interrupt` callback.
    pub fn add<E, I, F>(&mut self, name: &str, execute: E, interrupt: I)
    where
        E: Future<Output = Result<(), ActorError>> + Send + 'static,
        I: FnOnce(Option<ActorError>) -> F + Send + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.group.add(name, execute, interrupt);
    }

    /// Runs every registered actor plus the signal and restart actors until the first exits.
    ///
    /// The restart actor declares this process ready as soon as it runs, so every
    /// `listen` call must happen before `run`.
    pub async fn run(self) -> Result<(), ActorError> {
        let Supervisor {
            mut group,
            reloader,
            signals,
            reload_task,
            fanout,
            ..
        } = self;

        group.register(Arc::new(signals));
        group.register(Arc::new(RestartActor::new(Arc::clone(&reloader))));

        let result = group.run().await;
        reloader.stop();
        if let Some(task) = reload_task {
            let _ = task.await;
        }

        match reloader.exit().await {
            ExitReason::Upgraded => {
                tracing::info!(generation = reloader.generation(), "handed over to successor")
            }
            ExitReason::Stopped => {
                tracing::info!(generation = reloader.generation(), "supervisor stopped")
            }
        }

        fanout.done.cancel();
        let _ = fanout.task.await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind};
    use crate::subscribers::Subscribe;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn quiet() -> Config {
        Config {
            reload_on_hangup: false,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn failing_actor_stops_everything_and_flushes_subscribers() {
        let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut sup = Supervisor::builder(quiet())
            .with_subscribers(vec![rec.clone()])
            .build()
            .unwrap();

        let stop = CancellationToken::new();
        let wait = stop.clone();
        sup.add(
            "waiter",
            async move {
                wait.cancelled().await;
                Ok(())
            },
            move |_cause: Option<ActorError>| async move { stop.cancel() },
        );
        sup.add(
            "broken",
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(ActorError::fail("broken"))
            },
            |_cause: Option<ActorError>| async {},
        );

        let reloader = Arc::clone(sup.reloader());
        assert_eq!(sup.run().await, Err(ActorError::fail("broken")));
        assert_eq!(reloader.exit().await, ExitReason::Stopped);

        let kinds = rec.0.lock().unwrap().clone();
        assert!(kinds.contains(&EventKind::ReadySignaled));
        assert!(kinds.contains(&EventKind::ReloaderStopped));
        assert_eq!(kinds.last(), Some(&EventKind::GroupStopped));
    }

    #[tokio::test]
    async fn served_listener_is_reused_by_key() {
        let sup = Supervisor::builder(quiet()).build().unwrap();
        let a = sup.listen("tcp", "127.0.0.1:0").unwrap();
        let b = sup.listen("tcp", "127.0.0.1:0").unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(sup.reloader().listeners().len(), 1);
        assert_eq!(sup.reloader().generation(), 1);
    }
}
