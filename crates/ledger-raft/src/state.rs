//! Volatile Raft role and timing configuration (§4.1, §5).

use std::time::Duration;

/// The three Raft roles a node can hold. Every node starts as
/// [`RaftRole::Follower`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaftRole {
    /// Waiting for AppendEntries from a leader or an election timeout.
    Follower,
    /// Running for election in the current term.
    Candidate,
    /// Replicating entries to followers and serving writes.
    Leader,
}

impl std::fmt::Display for RaftRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Follower => write!(f, "follower"),
            Self::Candidate => write!(f, "candidate"),
            Self::Leader => write!(f, "leader"),
        }
    }
}

/// Election/heartbeat timing, per §4.1: election timeout randomized in
/// `[election_timeout_min, election_timeout_max]`, heartbeat interval a
/// fixed period well under the minimum election timeout.
///
/// These are constructor parameters, not recomputed constants, per the
/// re-architecture guidance in §9 ("module-level globals ... become a
/// configuration value").
#[derive(Debug, Clone, Copy)]
pub struct RaftTiming {
    /// Lower bound of the randomized election timeout.
    pub election_timeout_min: Duration,
    /// Upper bound of the randomized election timeout.
    pub election_timeout_max: Duration,
    /// Fixed interval between leader heartbeats.
    pub heartbeat_interval: Duration,
}

impl Default for RaftTiming {
    /// §4.1's concrete defaults: `[1.0s, 2.0s]` election timeout, `0.5s`
    /// heartbeat interval.
    fn default() -> Self {
        Self {
            election_timeout_min: Duration::from_millis(1000),
            election_timeout_max: Duration::from_millis(2000),
            heartbeat_interval: Duration::from_millis(500),
        }
    }
}

/// Duration a node detaches from the network when [`crate::node::RaftNode::simulate_crash`]
/// is invoked (§4.1: "causes the node to detach from the network for 10s").
pub const SIMULATE_CRASH_DURATION: Duration = ledger_core::SIMULATED_CRASH_DURATION;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_matches_spec_bounds() {
        let timing = RaftTiming::default();
        assert_eq!(timing.election_timeout_min, Duration::from_millis(1000));
        assert_eq!(timing.election_timeout_max, Duration::from_millis(2000));
        assert_eq!(timing.heartbeat_interval, Duration::from_millis(500));
    }

    #[test]
    fn role_display() {
        assert_eq!(RaftRole::Leader.to_string(), "leader");
        assert_eq!(RaftRole::Follower.to_string(), "follower");
    }
}
