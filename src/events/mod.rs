//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the group, server runners,
//! the signal actor and the reloader.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Group`, `ServerRunner`, `SignalActor`, `Reloader`.
//! - **Consumers**: `Supervisor`'s subscriber listener (fans out to `SubscriberSet`),
//!   and anyone holding a receiver from [`Bus::subscribe`] (tests do).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
pub(crate) use bus::PublishExt;
