//! Upgrade state machine.
//!
//! ```text
//! Idle ──► UpgradeRequested ──► ChildStarting ──► ChildReady ──► Completed
//!  ▲              │                   │                │
//!  │              └───────────────────┴────────────────┴──► Failed
//!  └───────────────── (Failed ──► UpgradeRequested: retry) ─────┘
//! ```

use std::fmt;

use crate::error::UpgradeError;

/// Progress of the current (or last) upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpgradeState {
    /// No upgrade attempted yet.
    #[default]
    Idle,
    /// An upgrade was requested; descriptors are being collected.
    UpgradeRequested,
    /// The successor was spawned and has not signalled readiness.
    ChildStarting,
    /// The successor signalled readiness.
    ChildReady,
    /// Handoff done; this process should exit.
    Completed,
    /// The last upgrade failed; this process keeps serving.
    Failed,
}

impl UpgradeState {
    /// Validates `self -> to`.
    pub fn advance(self, to: UpgradeState) -> Result<UpgradeState, UpgradeError> {
        use UpgradeState::*;

        let legal = matches!(
            (self, to),
            (Idle | Failed, UpgradeRequested)
                | (UpgradeRequested, ChildStarting)
                | (ChildStarting, ChildReady)
                | (ChildReady, Completed)
                | (UpgradeRequested | ChildStarting | ChildReady, Failed)
        );
        if legal {
            Ok(to)
        } else {
            Err(UpgradeError::InvalidTransition { from: self, to })
        }
    }

    /// True when a new upgrade may start from this state.
    pub fn can_upgrade(self) -> bool {
        matches!(self, UpgradeState::Idle | UpgradeState::Failed)
    }

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            UpgradeState::Idle => "idle",
            UpgradeState::UpgradeRequested => "upgrade_requested",
            UpgradeState::ChildStarting => "child_starting",
            UpgradeState::ChildReady => "child_ready",
            UpgradeState::Completed => "completed",
            UpgradeState::Failed => "failed",
        }
    }
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::UpgradeState::*;
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        let mut state = Idle;
        for next in [UpgradeRequested, ChildStarting, ChildReady, Completed] {
            state = state.advance(next).unwrap();
        }
        assert_eq!(state, Completed);
        assert!(!state.can_upgrade());
    }

    #[test]
    fn failures_allow_a_retry() {
        let state = ChildStarting.advance(Failed).unwrap();
        assert!(state.can_upgrade());
        assert_eq!(state.advance(UpgradeRequested).unwrap(), UpgradeRequested);
    }

    #[test]
    fn terminal_and_skipping_moves_are_rejected() {
        for (from, to) in [
            (Completed, UpgradeRequested),
            (Idle, ChildReady),
            (Idle, Failed),
            (Completed, Failed),
            (UpgradeRequested, Completed),
        ] {
            let err = from.advance(to).unwrap_err();
            assert!(matches!(err, UpgradeError::InvalidTransition { .. }), "{from} -> {to}");
        }
        assert_eq!(
            Idle.advance(Completed).unwrap_err().to_string(),
            "invalid upgrade transition idle -> completed"
        );
    }
}
