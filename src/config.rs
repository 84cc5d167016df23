//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for the supervisor runtime.
//!
//! Config is used in three places:
//! 1. **Supervisor creation**: `Supervisor::builder(config)`
//! 2. **Server runners**: the shutdown timeout applied to every registered server
//! 3. **Reloader**: the upgrade timeout and whether SIGHUP triggers an upgrade
//!
//! ## Sentinel values
//! - `shutdown_timeout = 0s` → wait indefinitely for graceful shutdown
//! - `upgrade_timeout = 0s` → wait indefinitely for the successor's readiness

use std::time::Duration;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `shutdown_timeout`: Maximum wait for a graceful server shutdown (`0s` = unbounded)
/// - `upgrade_timeout`: Maximum wait for a successor process to become ready (`0s` = unbounded)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `reload_on_hangup`: Whether SIGHUP triggers a zero-downtime upgrade
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Deadline for graceful server shutdown.
    ///
    /// When the group stops:
    /// - Graceful servers are asked to drain in-flight requests
    /// - Runner waits up to `shutdown_timeout`, then force-closes
    pub shutdown_timeout: Duration,

    /// Deadline for a successor process to signal readiness.
    ///
    /// An upgrade that exceeds it is marked failed, the successor is killed
    /// and the current process keeps serving.
    pub upgrade_timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Whether the supervisor spawns the SIGHUP reload listener.
    pub reload_on_hangup: bool,
}

impl Config {
    /// Returns the graceful shutdown deadline as an `Option`.
    ///
    /// - `None` → no deadline
    /// - `Some(d)` → shutdown attempt bounded by `d`
    #[inline]
    pub fn shutdown_deadline(&self) -> Option<Duration> {
        non_zero(self.shutdown_timeout)
    }

    /// Returns the successor readiness deadline as an `Option`.
    #[inline]
    pub fn upgrade_deadline(&self) -> Option<Duration> {
        non_zero(self.upgrade_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `shutdown_timeout = 15s`
    /// - `upgrade_timeout = 60s`
    /// - `bus_capacity = 1024`
    /// - `reload_on_hangup = true`
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(15),
            upgrade_timeout: Duration::from_secs(60),
            bus_capacity: 1024,
            reload_on_hangup: true,
        }
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    if d == Duration::ZERO {
        None
    } else {
        Some(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_durations_mean_unbounded() {
        let cfg = Config {
            shutdown_timeout: Duration::ZERO,
            upgrade_timeout: Duration::ZERO,
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.shutdown_deadline(), None);
        assert_eq!(cfg.upgrade_deadline(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn defaults_are_bounded() {
        let cfg = Config::default();
        assert_eq!(cfg.shutdown_deadline(), Some(Duration::from_secs(15)));
        assert_eq!(cfg.upgrade_deadline(), Some(Duration::from_secs(60)));
    }
}
