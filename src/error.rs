//! Error types used by the gracevisor runtime, its actors and the reloader.
//!
//! - [`ActorError`] — why an actor's `execute` returned; the value a [`Group`](crate::Group) run yields.
//! - [`ServerError`] — failures reported by [`Server`](crate::Server) implementations.
//! - [`RunnerError`] — configuration defects of a [`ServerRunner`](crate::ServerRunner).
//! - [`ReloadError`] — listener creation and handoff failures.
//! - [`UpgradeError`] — failed or rejected zero-downtime upgrades.
//! - [`RuntimeError`] — failures while assembling a [`Supervisor`](crate::Supervisor).
//!
//! `ActorError` and `UpgradeError` provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::reloader::UpgradeState;

/// # Errors produced by actor execution.
///
/// The first error observed by a group is handed to every other actor's interrupt,
/// so this type is cheap to clone and carries messages rather than sources.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// Generic actor failure.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// A server stopped serving with an unexpected error.
    #[error("server {server} failed: {error}")]
    Serve {
        /// Name of the server runner.
        server: String,
        /// The underlying error message.
        error: String,
    },

    /// The actor was misconfigured and could not start.
    #[error("actor misconfigured: {error}")]
    Config {
        /// What is missing or wrong.
        error: String,
    },

    /// OS signal handling could not be set up.
    #[error("signal handling failed: {error}")]
    Signal {
        /// The underlying error message.
        error: String,
    },

    /// The graceful restart rendezvous failed.
    #[error("graceful restart failed: {error}")]
    Restart {
        /// The underlying error message.
        error: String,
    },

    /// Actor stopped because its context was cancelled.
    #[error("context cancelled")]
    Canceled,
}

impl ActorError {
    /// Wraps any displayable error into [`ActorError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        ActorError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use gracevisor::ActorError;
    ///
    /// let err = ActorError::fail("boom");
    /// assert_eq!(err.as_label(), "actor_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ActorError::Fail { .. } => "actor_failed",
            ActorError::Serve { .. } => "actor_serve_failed",
            ActorError::Config { .. } => "actor_misconfigured",
            ActorError::Signal { .. } => "actor_signal_failed",
            ActorError::Restart { .. } => "actor_restart_failed",
            ActorError::Canceled => "actor_canceled",
        }
    }
}

impl From<RunnerError> for ActorError {
    fn from(err: RunnerError) -> Self {
        ActorError::Config {
            error: err.to_string(),
        }
    }
}

impl From<ReloadError> for ActorError {
    fn from(err: ReloadError) -> Self {
        ActorError::Restart {
            error: err.to_string(),
        }
    }
}

/// # Errors reported by network servers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServerError {
    /// The server was closed; expected after an interrupt.
    #[error("server closed")]
    Closed,

    /// Graceful shutdown did not finish within the configured timeout.
    #[error("graceful shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// The configured shutdown timeout.
        timeout: Duration,
    },

    /// Graceful shutdown was abandoned because a forced stop was requested.
    #[error("graceful shutdown aborted by a forced stop")]
    ShutdownAborted,

    /// The server cannot serve on this kind of listener.
    #[error("unsupported listener: {network}")]
    UnsupportedListener {
        /// Network of the rejected listener.
        network: &'static str,
    },

    /// I/O failure while serving.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// # Configuration defects of a server runner.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// No server was provided.
    #[error("server is not configured")]
    MissingServer,

    /// No listener was provided.
    #[error("listener is not configured")]
    MissingListener,

    /// `execute` was called a second time; the listener is already consumed.
    #[error("server {server} already started")]
    AlreadyStarted {
        /// Name of the server runner.
        server: String,
    },
}

/// # Errors produced while obtaining listeners or adopting inherited ones.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReloadError {
    /// The network name is not one of `tcp`, `tcp4`, `tcp6`, `unix`.
    #[error("unsupported network {network:?}")]
    UnsupportedNetwork {
        /// The rejected network name.
        network: String,
    },

    /// Binding a fresh socket failed.
    #[error("failed to listen on {network} {address}: {source}")]
    Bind {
        /// Network of the listener.
        network: &'static str,
        /// Requested address.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The handoff environment from the parent process is unusable.
    #[error("invalid handoff from parent process: {reason}")]
    Handoff {
        /// What went wrong.
        reason: String,
    },

    /// Other I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// # Errors produced by [`Reloader::upgrade`](crate::Reloader::upgrade).
///
/// None of these stop the current process: a failed upgrade leaves it serving.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UpgradeError {
    /// Process replacement is not available on this platform.
    #[error("graceful upgrade is not supported on this platform")]
    Unsupported,

    /// The reloader was stopped.
    #[error("reloader stopped")]
    Stopped,

    /// This process was started by an upgrade and has not signalled readiness yet.
    #[error("process is not ready yet")]
    NotReady,

    /// Another upgrade is in flight.
    #[error("upgrade already in progress")]
    InProgress,

    /// A previous upgrade already handed off to a successor.
    #[error("process already upgraded")]
    AlreadyUpgraded,

    /// The upgrade state machine rejected a transition.
    #[error("invalid upgrade transition {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: UpgradeState,
        /// Requested state.
        to: UpgradeState,
    },

    /// The successor process could not be spawned.
    #[error("failed to spawn successor: {0}")]
    Spawn(#[source] std::io::Error),

    /// The successor exited before signalling readiness.
    #[error("successor exited before becoming ready: {status}")]
    ChildExited {
        /// Exit status as reported by the OS.
        status: String,
    },

    /// The successor did not signal readiness in time.
    #[error("successor not ready after {timeout:?}")]
    Timeout {
        /// The configured upgrade timeout.
        timeout: Duration,
    },

    /// Other I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl UpgradeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            UpgradeError::Unsupported => "upgrade_unsupported",
            UpgradeError::Stopped => "upgrade_stopped",
            UpgradeError::NotReady => "upgrade_not_ready",
            UpgradeError::InProgress => "upgrade_in_progress",
            UpgradeError::AlreadyUpgraded => "upgrade_already_done",
            UpgradeError::InvalidTransition { .. } => "upgrade_invalid_transition",
            UpgradeError::Spawn(_) => "upgrade_spawn_failed",
            UpgradeError::ChildExited { .. } => "upgrade_child_exited",
            UpgradeError::Timeout { .. } => "upgrade_timeout",
            UpgradeError::Io(_) => "upgrade_io",
        }
    }
}

/// # Errors raised while assembling the supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The reloader could not adopt the parent's handoff.
    #[error(transparent)]
    Reload(#[from] ReloadError),

    /// Termination or reload signals could not be registered.
    #[error("failed to register signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_errors_become_config_errors() {
        let err: ActorError = RunnerError::MissingListener.into();
        assert_eq!(
            err,
            ActorError::Config {
                error: "listener is not configured".into()
            }
        );
        assert_eq!(err.as_label(), "actor_misconfigured");
    }

    #[test]
    fn upgrade_labels_are_stable() {
        let err = UpgradeError::Timeout {
            timeout: Duration::from_secs(1),
        };
        assert_eq!(err.as_label(), "upgrade_timeout");
        assert_eq!(err.to_string(), "successor not ready after 1s");
    }
}
