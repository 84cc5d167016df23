//! # Event bus for broadcasting lifecycle events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so any component can publish without
//! blocking, whether or not somebody listens.
//!
//! ```text
//! Publishers (many):                 Receivers (any):
//!   Group        ──┐
//!   ServerRunner ──┼──────► Bus ───────► subscriber listener ──► SubscriberSet
//!   SignalActor  ──┤  (broadcast chan) └─► test receivers
//!   Reloader     ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; events without receivers are dropped.
//! - A single ring buffer of `capacity` events is shared by all receivers.
//! - Slow receivers observe `RecvError::Lagged(n)` and skip the `n` oldest events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for lifecycle events.
///
/// Cheap to clone: every clone publishes into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver for events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

/// Publishes on an optional bus; components work the same without one.
pub(crate) trait PublishExt {
    fn emit(&self, ev: impl FnOnce() -> Event);
}

impl PublishExt for Option<Bus> {
    #[inline]
    fn emit(&self, ev: impl FnOnce() -> Event) {
        if let Some(bus) = self {
            bus.publish(ev());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_only_see_later_events() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ShutdownRequested));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::GroupStopped));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::GroupStopped);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn optional_bus_is_lazy() {
        let none: Option<Bus> = None;
        none.emit(|| unreachable!("no bus, no event"));

        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        Some(bus).emit(|| Event::new(EventKind::ReadySignaled).with_generation(2));
        assert_eq!(rx.recv().await.unwrap().generation, Some(2));
    }
}
