//! The callback a Raft node uses to hand committed entries to its
//! cluster state machine (§4.2). Raft itself knows nothing about
//! balances or 2PC records; it only knows it must deliver committed
//! [`LogEntry`] values, in index order, exactly once each.

use ledger_core::LogEntry;

/// Implemented by the cluster-local state machine that sits atop a
/// [`crate::node::RaftNode`]. `apply` is called with the lock released,
/// in increasing index order, once per committed entry.
pub trait StateMachine: Send + Sync {
    /// Apply one committed log entry to local state.
    fn apply(&self, entry: &LogEntry);
}

/// A state machine that discards every entry; useful for tests that
/// only exercise the consensus layer.
#[derive(Debug, Default)]
pub struct NullStateMachine;

impl StateMachine for NullStateMachine {
    fn apply(&self, _entry: &LogEntry) {}
}
