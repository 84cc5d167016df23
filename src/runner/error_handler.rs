//! Sinks for errors that must not abort a stop sequence.
//!
//! A failed graceful shutdown or a failing `close` is reported here; the runner
//! carries on with its teardown regardless.

use std::error::Error;

/// Takes care of errors nobody else handles.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Handles one error.
    fn handle(&self, err: &(dyn Error + Send + Sync + 'static));
}

/// Logs errors through `tracing` at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, err: &(dyn Error + Send + Sync + 'static)) {
        tracing::error!(error = %err, "unhandled error");
    }
}

/// Discards errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopErrorHandler;

impl ErrorHandler for NoopErrorHandler {
    fn handle(&self, _err: &(dyn Error + Send + Sync + 'static)) {}
}
