//! Parent → successor handoff document.
//!
//! The parent serializes a [`Handoff`] as JSON into `GRACEVISOR_HANDOFF`.
//! Listener descriptors occupy fds `3..3+n` in the successor, in document
//! order; the readiness socket is fd `3+n`.
//!
//! ```json
//! {"generation":2,"parent_pid":4242,"ready_fd":4,
//!  "listeners":[{"fd":3,"network":"tcp","address":"127.0.0.1:0","generation":1}]}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ReloadError;
use crate::reloader::listener::Network;

/// Environment variable carrying the handoff document.
pub const HANDOFF_ENV: &str = "GRACEVISOR_HANDOFF";

/// First descriptor number used for inherited sockets.
pub(crate) const FIRST_FD: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Handoff {
    /// Generation of the successor.
    pub(crate) generation: u64,
    pub(crate) parent_pid: u32,
    pub(crate) ready_fd: i32,
    pub(crate) listeners: Vec<HandoffListener>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct HandoffListener {
    pub(crate) fd: i32,
    pub(crate) network: Network,
    pub(crate) address: String,
    /// Generation that first bound the socket.
    pub(crate) generation: u64,
}

impl Handoff {
    pub(crate) fn encode(&self) -> Result<String, ReloadError> {
        serde_json::to_string(self).map_err(|e| ReloadError::Handoff {
            reason: e.to_string(),
        })
    }

    pub(crate) fn decode(raw: &str) -> Result<Self, ReloadError> {
        let handoff: Handoff = serde_json::from_str(raw).map_err(|e| ReloadError::Handoff {
            reason: e.to_string(),
        })?;
        handoff.validate()?;
        Ok(handoff)
    }

    /// Reads the document left by a parent, if any.
    pub(crate) fn from_env() -> Result<Option<Self>, ReloadError> {
        match std::env::var(HANDOFF_ENV) {
            Ok(raw) if !raw.is_empty() => Self::decode(&raw).map(Some),
            Ok(_) | Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(ReloadError::Handoff {
                reason: format!("{HANDOFF_ENV} is not valid unicode"),
            }),
        }
    }

    fn validate(&self) -> Result<(), ReloadError> {
        if self.generation < 2 {
            return Err(ReloadError::Handoff {
                reason: format!("successor generation {} is below 2", self.generation),
            });
        }
        let n = self.listeners.len() as i32;
        let expected: Vec<i32> = (FIRST_FD..FIRST_FD + n).collect();
        let actual: Vec<i32> = self.listeners.iter().map(|l| l.fd).collect();
        if actual != expected || self.ready_fd != FIRST_FD + n {
            return Err(ReloadError::Handoff {
                reason: format!(
                    "unexpected descriptor layout: listeners {actual:?}, ready {}",
                    self.ready_fd
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Handoff {
        Handoff {
            generation: 2,
            parent_pid: 4242,
            ready_fd: 5,
            listeners: vec![
                HandoffListener {
                    fd: 3,
                    network: Network::Tcp,
                    address: ":8080".into(),
                    generation: 1,
                },
                HandoffListener {
                    fd: 4,
                    network: Network::Unix,
                    address: "/run/app.sock".into(),
                    generation: 1,
                },
            ],
        }
    }

    #[test]
    fn document_survives_the_environment() {
        let raw = sample().encode().unwrap();
        assert!(raw.contains(r#""network":"unix""#));
        assert_eq!(Handoff::decode(&raw).unwrap(), sample());
    }

    #[test]
    fn inconsistent_layouts_are_rejected() {
        let mut handoff = sample();
        handoff.ready_fd = 9;
        let raw = handoff.encode().unwrap();
        assert!(matches!(
            Handoff::decode(&raw),
            Err(ReloadError::Handoff { .. })
        ));

        assert!(Handoff::decode("{not json").is_err());
    }
}
