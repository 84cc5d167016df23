//! # LogWriter: lifecycle events as log lines
//!
//! A subscriber that turns incoming [`Event`]s into `tracing` records with
//! structured fields. Enabled via the `logging` feature.
//!
//! ## Example output (with a `fmt` subscriber installed)
//! ```text
//! INFO gracevisor: starting server actor="http" address="127.0.0.1:8080"
//! INFO gracevisor: upgrade requested generation=1
//! INFO gracevisor: successor started generation=2 pid=4242
//! INFO gracevisor: upgrade completed generation=2 pid=4242
//! WARN gracevisor: graceful shutdown failed actor="http" reason="graceful shutdown timed out after 15s"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let actor = e.actor.as_deref().unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or_default();

        match e.kind {
            EventKind::ActorStarting => {
                tracing::debug!(target: "gracevisor", actor, "actor starting");
            }
            EventKind::ActorExited => {
                tracing::debug!(target: "gracevisor", actor, reason, "actor exited");
            }
            EventKind::InterruptRequested => {
                tracing::debug!(target: "gracevisor", actor, reason, "interrupt requested");
            }
            EventKind::GroupStopped => {
                tracing::info!(target: "gracevisor", reason, "all actors stopped");
            }
            EventKind::ServerStarting => {
                tracing::info!(
                    target: "gracevisor",
                    actor,
                    address = e.address.as_deref().unwrap_or_default(),
                    "starting server"
                );
            }
            EventKind::ServerShuttingDown => {
                tracing::info!(target: "gracevisor", actor, timeout_ms = ?e.timeout_ms, "shutting down server");
            }
            EventKind::GracefulShutdownFailed => {
                tracing::warn!(target: "gracevisor", actor, reason, "graceful shutdown failed");
            }
            EventKind::ServerClosed => {
                tracing::info!(target: "gracevisor", actor, "server closed");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "gracevisor", signal = reason, "shutdown requested");
            }
            EventKind::ForceRequested => {
                tracing::warn!(target: "gracevisor", signal = reason, "forced shutdown requested");
            }
            EventKind::ListenerOpened => {
                tracing::debug!(
                    target: "gracevisor",
                    address = e.address.as_deref().unwrap_or_default(),
                    origin = reason,
                    generation = ?e.generation,
                    "listener opened"
                );
            }
            EventKind::ReadySignaled => {
                tracing::info!(target: "gracevisor", generation = ?e.generation, "process ready");
            }
            EventKind::UpgradeRequested => {
                tracing::info!(target: "gracevisor", generation = ?e.generation, "upgrade requested");
            }
            EventKind::SuccessorStarted => {
                tracing::info!(target: "gracevisor", generation = ?e.generation, pid = ?e.pid, "successor started");
            }
            EventKind::UpgradeCompleted => {
                tracing::info!(target: "gracevisor", generation = ?e.generation, pid = ?e.pid, "upgrade completed");
            }
            EventKind::UpgradeFailed => {
                tracing::error!(target: "gracevisor", generation = ?e.generation, reason, "upgrade failed");
            }
            EventKind::ReloaderStopped => {
                tracing::debug!(target: "gracevisor", "reloader stopped");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "gracevisor", subscriber = actor, reason, "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(target: "gracevisor", subscriber = actor, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
