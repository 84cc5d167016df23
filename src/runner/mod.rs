//! Actor adapters for servers and run-until-closed components.
//!
//! - [`ServerRunner`]: serves a [`Listener`](crate::Listener) with a [`Server`] and
//!   drains it on interrupt when the server is a [`GracefulServer`].
//! - [`RunCloserRunner`]: `execute` = `run`, `interrupt` = `close`.
//! - [`ErrorHandler`]: receives errors that must not abort a stop sequence.

mod error_handler;
mod run_closer;
mod server;

pub use error_handler::{ErrorHandler, LogErrorHandler, NoopErrorHandler};
pub use run_closer::{BoxError, RunCloser, RunCloserRunner};
pub use server::{GracefulServer, Server, ServerHandle, ServerRunner, ServerRunnerBuilder};
