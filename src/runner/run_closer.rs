//! Components that run until told to close (message routers, consumers) as actors.

use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Actor;
use crate::error::ActorError;
use crate::runner::error_handler::{ErrorHandler, LogErrorHandler};

/// Boxed error returned by [`RunCloser`] implementations.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Something that runs until [`close`](RunCloser::close) is called.
#[async_trait]
pub trait RunCloser: Send + Sync + 'static {
    /// Runs until done or closed.
    async fn run(&self) -> Result<(), BoxError>;

    /// Makes a pending `run` return.
    async fn close(&self) -> Result<(), BoxError>;
}

/// Actor adapter for a [`RunCloser`]: `execute` runs, `interrupt` closes.
pub struct RunCloserRunner {
    name: Arc<str>,
    inner: Arc<dyn RunCloser>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl RunCloserRunner {
    /// Wraps `inner`; close errors are logged.
    pub fn new(name: impl Into<Arc<str>>, inner: Arc<dyn RunCloser>) -> Self {
        Self {
            name: name.into(),
            inner,
            error_handler: Arc::new(LogErrorHandler),
        }
    }

    /// Sends close errors to `handler` instead.
    #[must_use]
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }
}

#[async_trait]
impl Actor for RunCloserRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), ActorError> {
        self.inner.run().await.map_err(ActorError::fail)
    }

    async fn interrupt(&self, _cause: Option<ActorError>) {
        if let Err(err) = self.inner.close().await {
            self.error_handler.handle(err.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Flags {
        started: AtomicBool,
        closed: AtomicBool,
    }

    #[async_trait]
    impl RunCloser for Flags {
        async fn run(&self) -> Result<(), BoxError> {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) -> Result<(), BoxError> {
            self.closed.store(true, Ordering::SeqCst);
            Err("already closed".into())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ErrorHandler for Recorder {
        fn handle(&self, err: &(dyn Error + Send + Sync + 'static)) {
            self.0.lock().unwrap().push(err.to_string());
        }
    }

    #[tokio::test]
    async fn runs_then_closes() {
        let flags = Arc::new(Flags::default());
        let errors = Arc::new(Recorder::default());
        let runner = RunCloserRunner::new("router", flags.clone()).with_error_handler(errors.clone());

        runner.execute().await.unwrap();
        assert!(flags.started.load(Ordering::SeqCst));

        runner.interrupt(None).await;
        assert!(flags.closed.load(Ordering::SeqCst));
        assert_eq!(*errors.0.lock().unwrap(), vec!["already closed".to_string()]);
    }
}
