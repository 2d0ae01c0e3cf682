//! Coordinator timing configuration (§4.4, §5).
//!
//! A constructor parameter rather than a recomputed constant, per the
//! re-architecture guidance in §9 ("module-level globals ... become a
//! configuration value"); tests shrink every duration to run fast.

use ledger_core::SIMULATED_CRASH_DURATION;
use std::time::Duration;

/// Timeouts and retry cadence governing the coordinator's 2PC driver.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorTiming {
    /// Per-node timeout when probing for a cluster's current leader
    /// (§4.4: "short timeout, e.g. 2s").
    pub probe_timeout: Duration,
    /// Interval between retry attempts of a single RPC (§4.4: "poll
    /// every 100ms").
    pub retry_poll_interval: Duration,
    /// Total window a single `2pc_prepare`/`2pc_commit` RPC is retried
    /// before being treated as a failure (§4.4: "up to 2s").
    pub retry_window: Duration,
    /// How long the coordinator sleeps when simulating its own crash
    /// (§4.4's recovery/crash tags).
    pub crash_duration: Duration,
}

impl Default for CoordinatorTiming {
    /// §4.4's concrete defaults.
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(2),
            retry_poll_interval: Duration::from_millis(100),
            retry_window: Duration::from_secs(2),
            crash_duration: SIMULATED_CRASH_DURATION,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_matches_spec_bounds() {
        let timing = CoordinatorTiming::default();
        assert_eq!(timing.probe_timeout, Duration::from_secs(2));
        assert_eq!(timing.retry_poll_interval, Duration::from_millis(100));
        assert_eq!(timing.retry_window, Duration::from_secs(2));
        assert_eq!(timing.crash_duration, Duration::from_secs(10));
    }
}
