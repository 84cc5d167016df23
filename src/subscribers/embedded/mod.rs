//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders lifecycle events through `tracing`.

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
