//! Runtime core: actors, groups and the supervisor.
//!
//! - [`actor`]: the [`Actor`] trait and the closure-backed [`ActorFn`];
//! - [`group`]: runs actors together, first exit wins;
//! - [`supervisor`]: wires signals, the reloader and servers into one group;
//! - [`builder`]: assembles a [`Supervisor`].

mod actor;
mod builder;
mod group;
mod supervisor;

pub use actor::{Actor, ActorFn, ActorRef};
pub use builder::SupervisorBuilder;
pub use group::Group;
pub use supervisor::Supervisor;
