//! Actor tying the group's lifetime to the reloader.
//!
//! `execute` declares the process ready, then waits until the reloader says the
//! process should exit (successor took over, or stopped). Returning makes the
//! group interrupt every server, which drain while the successor accepts on the
//! shared sockets.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::Actor;
use crate::error::ActorError;
use crate::reloader::{ExitReason, Reloader};

/// Waits for reload completion or shutdown.
pub struct RestartActor {
    reloader: Arc<Reloader>,
    cancel: CancellationToken,
}

impl RestartActor {
    /// Creates the actor for `reloader`.
    pub fn new(reloader: Arc<Reloader>) -> Self {
        Self {
            reloader,
            cancel: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl Actor for RestartActor {
    fn name(&self) -> &str {
        "reloader"
    }

    async fn execute(&self) -> Result<(), ActorError> {
        self.reloader.ready()?;

        tokio::select! {
            reason = self.reloader.exit() => {
                if reason == ExitReason::Upgraded {
                    tracing::info!(generation = self.reloader.generation(), "successor is ready, stopping");
                }
            }
            _ = self.cancel.cancelled() => {}
        }
        Ok(())
    }

    async fn interrupt(&self, _cause: Option<ActorError>) {
        self.cancel.cancel();
        self.reloader.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::reloader::UpgradeState;

    #[tokio::test]
    async fn interrupt_stops_the_reloader() {
        let reloader = Arc::new(Reloader::new(&Config::default()).unwrap());
        let actor = Arc::new(RestartActor::new(Arc::clone(&reloader)));

        let exec = Arc::clone(&actor);
        let handle = tokio::spawn(async move { exec.execute().await });
        actor.interrupt(None).await;

        assert_eq!(handle.await.unwrap(), Ok(()));
        assert_eq!(reloader.exit().await, ExitReason::Stopped);
        assert_eq!(reloader.state(), UpgradeState::Idle);
    }

    #[tokio::test]
    async fn stopping_the_reloader_ends_execute() {
        let reloader = Arc::new(Reloader::new(&Config::default()).unwrap());
        let actor = RestartActor::new(Arc::clone(&reloader));

        reloader.stop();
        assert_eq!(actor.execute().await, Ok(()));
    }
}
