//! Errors raised by the Raft consensus core.

use thiserror::Error;

/// Errors specific to the Raft layer; converted into
/// [`ledger_core::LedgerError`] at crate boundaries.
#[derive(Debug, Error)]
pub enum RaftError {
    /// A write was proposed to a node that is not currently leader.
    #[error("not leader")]
    NotLeader,

    /// A proposed entry did not reach the commit index within the
    /// caller's deadline; the leader may or may not eventually commit it.
    #[error("replication timed out waiting for commit")]
    ReplicationTimeout,

    /// The node is currently detached from the network
    /// ([`crate::node::RaftNode::simulate_crash`]).
    #[error("node is simulating a crash")]
    Crashed,

    /// A lower-level transport or persistence failure.
    #[error(transparent)]
    Ledger(#[from] ledger_core::LedgerError),
}

/// Convenience alias used throughout this crate.
pub type RaftResult<T> = Result<T, RaftError>;
