//! # Event subscribers.
//!
//! Lifecycle events published on the [`Bus`](crate::events::Bus) are forwarded by the
//! supervisor to a [`SubscriberSet`], which fans them out to every [`Subscribe`]
//! implementation through a dedicated bounded queue and worker.
//!
//! ```text
//!   Group / ServerRunner / SignalActor / Reloader
//!        │ publish(Event)
//!        ▼
//!       Bus ──► subscriber listener ──► SubscriberSet::emit
//!                                            ├──► [queue] ─► LogWriter
//!                                            └──► [queue] ─► custom subscribers
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use gracevisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct UpgradeCounter;
//!
//! #[async_trait]
//! impl Subscribe for UpgradeCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::UpgradeCompleted {
//!             // increment a counter
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "upgrade-counter"
//!     }
//! }
//! ```

mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
