//! # gracevisor
//!
//! **Gracevisor** runs the long-lived parts of a network process (servers,
//! signal handling, background actors) as one group that starts together and
//! stops together, and replaces the process binary without dropping connections.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ ServerRunner │   │ ServerRunner │   │ user Actor   │
//!     │ (http app)   │   │ (admin)      │   │ (router...)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Group (first exit wins)                                          │
//! │  - SignalActor  (SIGINT/SIGTERM/SIGQUIT ─► clean exit)            │
//! │  - RestartActor (ready() ─► wait for successor or stop)           │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        │ Publishes        │                  │               │
//!        ▼                  ▼                  ▼               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                   (capacity: Config::bus_capacity)                │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          ┌─────────┼─────────┐
//!                          ▼         ▼         ▼
//!                       worker1   worker2   workerN
//! ```
//!
//! ### Zero-downtime upgrade
//! ```text
//! SIGHUP ─► Reloader::upgrade()
//!   ├─► snapshot listening sockets
//!   ├─► spawn current_exe (same args) with fds 3.. and GRACEVISOR_HANDOFF
//!   │         successor: Reloader adopts fds, listen() claims them, ready()
//!   ├─► readiness byte received ─► UpgradeState::Completed
//!   └─► RestartActor returns ─► Group interrupts servers ─► graceful drain ─► exit
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                         |
//! |-------------------|----------------------------------------------------------------|--------------------------------------------|
//! | **Actors**        | Units of work with execute/interrupt, run as a group.          | [`Actor`], [`ActorFn`], [`Group`]          |
//! | **Servers**       | Adapt servers to actors with bounded graceful shutdown.        | [`Server`], [`GracefulServer`], [`ServerRunner`] |
//! | **Reloader**      | Listener registry and process handoff.                         | [`Reloader`], [`Listener`], [`UpgradeState`] |
//! | **Signals**       | Termination signals as an actor, repeated signal forces close. | [`SignalActor`]                            |
//! | **Subscriber API**| Hook into lifecycle events.                                    | [`Subscribe`], [`Event`]                   |
//! | **Errors**        | Typed errors for actors, servers and upgrades.                 | [`ActorError`], [`UpgradeError`]          |
//! | **Configuration** | Centralize runtime settings.                                   | [`Config`]                                 |
//!
//! ## Optional features
//! - `http`: [`HttpServer`], a graceful server for `axum` routers.
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use gracevisor::{ActorError, ActorFn, ActorRef, Group};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), ActorError> {
//!     let mut group = Group::new();
//!
//!     let ticker: ActorRef = ActorFn::arc("ticker", |ctx: CancellationToken| async move {
//!         ctx.cancelled().await;
//!         Ok::<_, ActorError>(())
//!     });
//!     group.register(ticker);
//!     group.add("one-shot", async { Ok(()) }, |_cause| async {});
//!
//!     // "one-shot" exits first, "ticker" is interrupted.
//!     group.run().await
//! }
//! ```
mod adapters;
mod config;
mod core;
mod error;
mod events;
mod reloader;
mod runner;
mod signals;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{Actor, ActorFn, ActorRef, Group, Supervisor, SupervisorBuilder};
pub use error::{ActorError, ReloadError, RunnerError, RuntimeError, ServerError, UpgradeError};
pub use events::{Bus, Event, EventKind};
pub use reloader::{
    ExitReason, Listener, ListenerInfo, Network, Origin, Reloader, RestartActor, UpgradeState,
    HANDOFF_ENV,
};
pub use runner::{
    BoxError, ErrorHandler, GracefulServer, LogErrorHandler, NoopErrorHandler, RunCloser,
    RunCloserRunner, Server, ServerHandle, ServerRunner, ServerRunnerBuilder,
};
pub use signals::SignalActor;
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: graceful HTTP server for axum routers.
// Enable with: `--features http`
#[cfg(feature = "http")]
pub use adapters::HttpServer;

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
