//! # Actor abstraction and function-backed actor implementation.
//!
//! An [`Actor`] is a unit of concurrent work with two operations:
//! - [`execute`](Actor::execute) runs until the actor is done (or fails),
//! - [`interrupt`](Actor::interrupt) causes a pending `execute` to return promptly.
//!
//! `interrupt` receives the error that made the [`Group`](crate::Group) stop
//! (`None` when the first actor exited cleanly), so actors can log or adapt their
//! teardown.
//!
//! [`ActorFn`] builds an actor from a closure that receives a [`CancellationToken`];
//! interrupting it cancels the token.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ActorError;

/// Shared handle to a trait actor.
pub type ActorRef = Arc<dyn Actor>;

/// # Long-running unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use gracevisor::{Actor, ActorError};
/// use tokio_util::sync::CancellationToken;
///
/// struct Ticker {
///     stop: CancellationToken,
/// }
///
/// #[async_trait]
/// impl Actor for Ticker {
///     fn name(&self) -> &str { "ticker" }
///
///     async fn execute(&self) -> Result<(), ActorError> {
///         self.stop.cancelled().await;
///         Ok(())
///     }
///
///     async fn interrupt(&self, _cause: Option<ActorError>) {
///         self.stop.cancel();
///     }
/// }
/// ```
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// Returns a stable, human-readable actor name.
    fn name(&self) -> &str;

    /// Runs until done. Must return promptly after [`interrupt`](Actor::interrupt).
    async fn execute(&self) -> Result<(), ActorError>;

    /// Asks a running `execute` to return.
    ///
    /// Called at most once per group run, possibly before `execute` was polled.
    async fn interrupt(&self, cause: Option<ActorError>);
}

/// Function-backed actor.
///
/// The closure is called once per `execute` with a token that is cancelled by
/// `interrupt`.
pub struct ActorFn<F> {
    name: Cow<'static, str>,
    token: CancellationToken,
    f: F,
}

impl<F> ActorFn<F> {
    /// Creates a new function-backed actor.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            token: CancellationToken::new(),
            f,
        }
    }

    /// Creates the actor and returns it as a shared handle.
    ///
    /// ## Example
    /// ```rust
    /// use tokio_util::sync::CancellationToken;
    /// use gracevisor::{ActorFn, ActorRef, ActorError};
    ///
    /// let a: ActorRef = ActorFn::arc("worker", |ctx: CancellationToken| async move {
    ///     ctx.cancelled().await;
    ///     Ok::<_, ActorError>(())
    /// });
    /// assert_eq!(a.name(), "worker");
    /// ```
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Actor for ActorFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ActorError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), ActorError> {
        (self.f)(self.token.clone()).await
    }

    async fn interrupt(&self, _cause: Option<ActorError>) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interrupt_cancels_the_closure() {
        let actor = ActorFn::arc("waiter", |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err(ActorError::Canceled)
        });

        let runner = Arc::clone(&actor);
        let handle = tokio::spawn(async move { runner.execute().await });
        actor.interrupt(None).await;

        assert_eq!(handle.await.unwrap(), Err(ActorError::Canceled));
    }

    #[tokio::test]
    async fn interrupt_before_execute_is_remembered() {
        let actor = ActorFn::new("late", |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Ok::<_, ActorError>(())
        });
        actor.interrupt(Some(ActorError::fail("boom"))).await;
        assert_eq!(actor.execute().await, Ok(()));
    }
}
