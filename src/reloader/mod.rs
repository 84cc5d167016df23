//! # Reloader: zero-downtime process replacement.
//!
//! The [`Reloader`] owns every listening socket of the process and coordinates
//! handing them to a successor:
//!
//! ```text
//!  generation N (parent)                       generation N+1 (successor)
//!  ─────────────────────                       ──────────────────────────
//!  listen(tcp, :8080) ── bind ─┐
//!  ready()                     │
//!  SIGHUP ─► upgrade()         │
//!    ├─ snapshot sockets ──────┴─ fds 3.. ───► Reloader::new(): adopt fds
//!    ├─ spawn current_exe                      listen(tcp, :8080) ── claim fd
//!    │                                         ...init...
//!    ├─ wait for readiness  ◄───── byte ────── ready()
//!    └─ Completed ─► exit() = Upgraded
//!  Group stops, servers drain, process exits ► wait_for_parent() resolves
//! ```
//!
//! ## Rules
//! - The successor inherits exactly the sockets open when `upgrade()` ran.
//! - A failed upgrade (spawn error, successor exit, timeout, stop) moves the state
//!   to [`UpgradeState::Failed`], kills the successor, and leaves this process serving.
//! - `ready()` and `stop()` are idempotent.

mod handoff;
mod listener;
mod registry;
mod restart;
mod state;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as platform;

#[cfg(not(unix))]
mod unsupported;
#[cfg(not(unix))]
use unsupported as platform;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{ReloadError, UpgradeError};
use crate::events::{Bus, Event, EventKind, PublishExt};

pub use handoff::HANDOFF_ENV;
pub use listener::{Listener, Network};
pub use registry::{ListenerInfo, Origin};
pub use restart::RestartActor;
pub use state::UpgradeState;

use handoff::Handoff;
use platform::{ParentLink, Successor};
use registry::ListenerRegistry;

/// Why [`Reloader::exit`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A successor took over; this process should stop serving and exit.
    Upgraded,
    /// The reloader was stopped.
    Stopped,
}

/// Listener registry plus the upgrade rendezvous of one process generation.
pub struct Reloader {
    generation: u64,
    upgrade_timeout: Option<Duration>,
    // None: the running binary.
    executable: Option<PathBuf>,
    registry: Mutex<ListenerRegistry>,
    state: watch::Sender<UpgradeState>,
    parent: Option<ParentLink>,
    ready: AtomicBool,
    upgrade_lock: tokio::sync::Mutex<()>,
    successor: Mutex<Option<Successor>>,
    exit_reason: OnceLock<ExitReason>,
    exited: CancellationToken,
    stopped: CancellationToken,
    bus: Option<Bus>,
}

impl Reloader {
    /// Creates the reloader, adopting the parent's sockets when started by an upgrade.
    pub fn new(cfg: &Config) -> Result<Self, ReloadError> {
        Self::build(cfg, None)
    }

    /// Like [`Reloader::new`], publishing lifecycle events on `bus`.
    pub fn with_bus(cfg: &Config, bus: Bus) -> Result<Self, ReloadError> {
        Self::build(cfg, Some(bus))
    }

    fn build(cfg: &Config, bus: Option<Bus>) -> Result<Self, ReloadError> {
        match Handoff::from_env()? {
            Some(handoff) => Self::from_handoff(cfg, handoff, bus),
            None => Ok(Self::assemble(cfg, 1, ListenerRegistry::new(1), None, bus)),
        }
    }

    pub(crate) fn from_handoff(
        cfg: &Config,
        handoff: Handoff,
        bus: Option<Bus>,
    ) -> Result<Self, ReloadError> {
        let (sockets, link) = platform::inherit(&handoff)?;
        tracing::info!(
            generation = handoff.generation,
            parent_pid = handoff.parent_pid,
            inherited = sockets.len(),
            "adopted listeners from parent"
        );
        let registry = ListenerRegistry::with_inherited(handoff.generation, sockets);
        Ok(Self::assemble(cfg, handoff.generation, registry, Some(link), bus))
    }

    fn assemble(
        cfg: &Config,
        generation: u64,
        registry: ListenerRegistry,
        parent: Option<ParentLink>,
        bus: Option<Bus>,
    ) -> Self {
        Self {
            generation,
            upgrade_timeout: cfg.upgrade_deadline(),
            executable: None,
            registry: Mutex::new(registry),
            state: watch::Sender::new(UpgradeState::Idle),
            parent,
            ready: AtomicBool::new(false),
            upgrade_lock: tokio::sync::Mutex::new(()),
            successor: Mutex::new(None),
            exit_reason: OnceLock::new(),
            exited: CancellationToken::new(),
            stopped: CancellationToken::new(),
            bus,
        }
    }

    #[cfg(test)]
    fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Generation of this process: 1 when started fresh, parent + 1 after an upgrade.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when this process was started by an upgrade.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Current upgrade state.
    pub fn state(&self) -> UpgradeState {
        *self.state.borrow()
    }

    /// Receiver observing every upgrade state change.
    pub fn watch_state(&self) -> watch::Receiver<UpgradeState> {
        self.state.subscribe()
    }

    /// Returns a listener for `(network, address)`.
    ///
    /// Reuses the socket already open for that key, else claims the one inherited
    /// from the parent, else binds a fresh one. Must be called inside a tokio runtime.
    pub fn listen(&self, network: &str, address: &str) -> Result<Listener, ReloadError> {
        let network: Network = network.parse()?;
        let (socket, origin) = self.registry().listen(network, address)?;

        tracing::debug!(%network, address, origin = origin.as_str(), "listener opened");
        self.bus.emit(|| {
            Event::new(EventKind::ListenerOpened)
                .with_address(address)
                .with_reason(origin.as_str())
                .with_generation(self.generation)
        });
        Ok(socket.into_tokio()?)
    }

    /// Active listeners, ordered by key.
    pub fn listeners(&self) -> Vec<ListenerInfo> {
        self.registry().infos()
    }

    /// Declares this process ready to serve.
    ///
    /// Closes inherited sockets nobody claimed and, in a successor, tells the
    /// parent it may stop. Calling it again does nothing.
    pub fn ready(&self) -> Result<(), ReloadError> {
        if self.ready.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let closed = self.registry().close_unclaimed();
        if closed > 0 {
            tracing::info!(closed, "closed unclaimed inherited listeners");
        }
        if let Some(link) = &self.parent {
            link.notify()?;
        }

        tracing::info!(generation = self.generation, "process ready");
        self.bus
            .emit(|| Event::new(EventKind::ReadySignaled).with_generation(self.generation));
        Ok(())
    }

    /// Replaces this process with a successor running the same binary and arguments.
    ///
    /// Returns once the successor signalled readiness; [`exit`](Self::exit) then
    /// yields [`ExitReason::Upgraded`]. On failure this process keeps serving and a
    /// later upgrade may be attempted.
    pub async fn upgrade(&self) -> Result<(), UpgradeError> {
        if self.stopped.is_cancelled() {
            return Err(UpgradeError::Stopped);
        }
        if self.has_parent() && !self.ready.load(Ordering::SeqCst) {
            return Err(UpgradeError::NotReady);
        }
        let Ok(_guard) = self.upgrade_lock.try_lock() else {
            return Err(UpgradeError::InProgress);
        };
        if self.state() == UpgradeState::Completed {
            return Err(UpgradeError::AlreadyUpgraded);
        }

        self.transition(UpgradeState::UpgradeRequested)?;
        tracing::info!(generation = self.generation, "upgrade requested");
        self.bus
            .emit(|| Event::new(EventKind::UpgradeRequested).with_generation(self.generation));

        match self.hand_off().await {
            Ok(successor) => {
                let pid = successor.pid();
                self.transition(UpgradeState::Completed)?;
                *self.successor.lock().unwrap_or_else(PoisonError::into_inner) = Some(successor);

                tracing::info!(generation = self.generation + 1, pid = ?pid, "upgrade completed");
                self.bus.emit(|| {
                    let ev = Event::new(EventKind::UpgradeCompleted).with_generation(self.generation + 1);
                    match pid {
                        Some(pid) => ev.with_pid(pid),
                        None => ev,
                    }
                });
                self.finish(ExitReason::Upgraded);
                Ok(())
            }
            Err(err) => {
                let _ = self.transition(UpgradeState::Failed);
                tracing::error!(
                    generation = self.generation,
                    error = %err,
                    reason = err.as_label(),
                    "upgrade failed, keeping current process"
                );
                self.bus.emit(|| {
                    Event::new(EventKind::UpgradeFailed)
                        .with_generation(self.generation)
                        .with_reason(err.to_string())
                });
                Err(err)
            }
        }
    }

    async fn hand_off(&self) -> Result<Successor, UpgradeError> {
        let sockets = self.registry().snapshot()?;
        self.transition(UpgradeState::ChildStarting)?;

        let mut successor =
            Successor::spawn(&sockets, self.generation + 1, self.executable.as_deref())?;
        drop(sockets);

        let pid = successor.pid();
        tracing::info!(generation = self.generation + 1, pid = ?pid, "successor started");
        self.bus.emit(|| {
            let ev = Event::new(EventKind::SuccessorStarted).with_generation(self.generation + 1);
            match pid {
                Some(pid) => ev.with_pid(pid),
                None => ev,
            }
        });

        let outcome = {
            let ready = async {
                match self.upgrade_timeout {
                    Some(timeout) => match tokio::time::timeout(timeout, successor.ready()).await {
                        Ok(res) => res,
                        Err(_) => Err(UpgradeError::Timeout { timeout }),
                    },
                    None => successor.ready().await,
                }
            };
            tokio::select! {
                biased;
                _ = self.stopped.cancelled() => Err(UpgradeError::Stopped),
                res = ready => res,
            }
        };

        match outcome.and_then(|()| self.transition(UpgradeState::ChildReady)) {
            Ok(()) => Ok(successor),
            Err(err) => {
                successor.abandon();
                Err(err)
            }
        }
    }

    /// Waits until this process should terminate.
    pub async fn exit(&self) -> ExitReason {
        self.exited.cancelled().await;
        self.exit_reason.get().copied().unwrap_or(ExitReason::Stopped)
    }

    /// Cancels a pending upgrade, releases [`exit`](Self::exit) and ends the reload
    /// signal loop.
    ///
    /// Without a successor every registry socket is closed, so new connections are
    /// refused once the servers stopped accepting. After an upgrade only unclaimed
    /// inherited sockets are closed.
    pub fn stop(&self) {
        if self.stopped.is_cancelled() {
            return;
        }
        self.stopped.cancel();
        self.finish(ExitReason::Stopped);
        match self.exit_reason.get() {
            Some(ExitReason::Upgraded) => {
                self.registry().close_unclaimed();
            }
            _ => {
                let closed = self.registry().close_all();
                tracing::debug!(closed, "closed listeners, no successor");
            }
        }

        tracing::debug!(generation = self.generation, "reloader stopped");
        self.bus.emit(|| Event::new(EventKind::ReloaderStopped));
    }

    /// Resolves once the parent process has exited; immediately without a parent.
    pub async fn wait_for_parent(&self) -> Result<(), ReloadError> {
        match &self.parent {
            Some(link) => Ok(link.closed().await?),
            None => Ok(()),
        }
    }

    /// Spawns the loop turning every SIGHUP into an [`upgrade`](Self::upgrade).
    ///
    /// The loop ends on [`stop`](Self::stop). Upgrade failures are logged, never fatal.
    #[cfg(unix)]
    pub fn spawn_reload_listener(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup())?;
        let reloader = Arc::clone(self);
        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reloader.stopped.cancelled() => break,
                    received = hangup.recv() => {
                        if received.is_none() {
                            break;
                        }
                        tracing::info!("reload signal received");
                        if let Err(err) = reloader.upgrade().await {
                            tracing::warn!(error = %err, reason = err.as_label(), "reload not performed");
                        }
                    }
                }
            }
        }))
    }

    /// Without reload signals the loop only waits for [`stop`](Self::stop).
    #[cfg(not(unix))]
    pub fn spawn_reload_listener(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        tracing::warn!("graceful upgrade is not supported on this platform");
        let reloader = Arc::clone(self);
        Ok(tokio::spawn(async move { reloader.stopped.cancelled().await }))
    }

    fn registry(&self) -> MutexGuard<'_, ListenerRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, to: UpgradeState) -> Result<(), UpgradeError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| match state.advance(to) {
            Ok(next) => {
                *state = next;
                true
            }
            Err(err) => {
                outcome = Err(err);
                false
            }
        });
        outcome
    }

    fn finish(&self, reason: ExitReason) {
        if self.exit_reason.set(reason).is_ok() {
            self.exited.cancel();
        }
    }
}
