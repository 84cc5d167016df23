//! # Lifecycle events emitted by the group, runners, signal actor and reloader.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Group events**: actor starts, exits and interrupt requests
//! - **Server events**: serving, draining and closing
//! - **Process events**: termination signals, readiness and upgrades
//! - **Subscriber events**: delivery problems inside the fan-out
//!
//! The [`Event`] struct carries metadata such as timestamps, actor name,
//! reasons, addresses and process generations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use gracevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ActorExited)
//!     .with_actor("http")
//!     .with_reason("server closed");
//!
//! assert_eq!(ev.kind, EventKind::ActorExited);
//! assert_eq!(ev.actor.as_deref(), Some("http"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Group events ===
    /// An actor's `execute` was launched.
    ///
    /// Sets: `actor`.
    ActorStarting,

    /// An actor's `execute` returned.
    ///
    /// Sets: `actor`, `reason` (error message, absent on clean exit).
    ActorExited,

    /// The group asked an actor to stop because another one exited first.
    ///
    /// Sets: `actor` (the interrupted one), `reason` (first error, if any).
    InterruptRequested,

    /// Every actor of a group has returned.
    ///
    /// Sets: `reason` (first error, if any).
    GroupStopped,

    // === Server events ===
    /// A server runner is about to serve.
    ///
    /// Sets: `actor`, `address`.
    ServerStarting,

    /// A server runner began shutting down.
    ///
    /// Sets: `actor`, `timeout_ms` (graceful deadline, if bounded).
    ServerShuttingDown,

    /// Graceful shutdown failed or timed out; force-close follows.
    ///
    /// Sets: `actor`, `reason`.
    GracefulShutdownFailed,

    /// The server was force-closed.
    ///
    /// Sets: `actor`.
    ServerClosed,

    // === Process events ===
    /// A termination signal was received.
    ///
    /// Sets: `reason` (signal name).
    ShutdownRequested,

    /// A repeated termination signal asked to skip graceful shutdown.
    ///
    /// Sets: `reason` (signal name).
    ForceRequested,

    /// A listener was handed out by the reloader.
    ///
    /// Sets: `address`, `reason` (`bound` or `inherited`), `generation`.
    ListenerOpened,

    /// This process declared itself ready to serve.
    ///
    /// Sets: `generation`.
    ReadySignaled,

    /// An upgrade was requested.
    ///
    /// Sets: `generation` (the current one).
    UpgradeRequested,

    /// The successor process was spawned.
    ///
    /// Sets: `generation` (the successor's), `pid`.
    SuccessorStarted,

    /// The successor signalled readiness; this process should exit.
    ///
    /// Sets: `generation` (the successor's), `pid`.
    UpgradeCompleted,

    /// The upgrade failed; this process keeps serving.
    ///
    /// Sets: `generation` (the current one), `reason`.
    UpgradeFailed,

    /// The reloader was stopped.
    ReloaderStopped,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `actor` (subscriber name), `reason`.
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `actor` (subscriber name), `reason`.
    SubscriberOverflow,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the actor, server or subscriber, if applicable.
    pub actor: Option<Arc<str>>,
    /// Human-readable reason (errors, signal names, overflow details).
    pub reason: Option<Arc<str>>,
    /// Listener address, if applicable.
    pub address: Option<Arc<str>>,
    /// Process generation, if applicable.
    pub generation: Option<u64>,
    /// Process id of a successor, if applicable.
    pub pid: Option<u32>,
    /// Deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            actor: None,
            reason: None,
            address: None,
            generation: None,
            pid: None,
            timeout_ms: None,
        }
    }

    /// Attaches an actor name.
    #[inline]
    pub fn with_actor(mut self, actor: impl Into<Arc<str>>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a reason only when one is present.
    #[inline]
    pub fn with_cause(self, cause: Option<&impl std::fmt::Display>) -> Self {
        match cause {
            Some(c) => self.with_reason(c.to_string()),
            None => self,
        }
    }

    /// Attaches a listener address.
    #[inline]
    pub fn with_address(mut self, address: impl Into<Arc<str>>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Attaches a process generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a deadline (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_actor(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_actor(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::ActorStarting);
        let b = Event::new(EventKind::ActorExited);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn cause_is_optional() {
        let none: Option<&String> = None;
        assert!(Event::new(EventKind::GroupStopped)
            .with_cause(none)
            .reason
            .is_none());

        let cause = "boom".to_string();
        let ev = Event::new(EventKind::GroupStopped).with_cause(Some(&cause));
        assert_eq!(ev.reason.as_deref(), Some("boom"));
    }

    #[test]
    fn timeout_saturates() {
        let ev = Event::new(EventKind::ServerShuttingDown).with_timeout(Duration::MAX);
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
