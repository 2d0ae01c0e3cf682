//! Errors specific to the cluster state machine and 2PC participant.

use thiserror::Error;

/// Errors raised by [`crate::state_machine::ClusterStateMachine`] and
/// [`crate::participant::ClusterNode`]; converted into
/// [`ledger_core::LedgerError`] at the RPC dispatch boundary.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The local node is not currently the Raft leader for its cluster.
    #[error("not leader")]
    NotLeader,

    /// Applying the requested delta would make the balance negative
    /// (§4.3's prepare-phase domain error).
    #[error("insufficient funds: balance {balance} + delta {delta} < 0")]
    InsufficientFunds {
        /// Balance prior to applying the delta.
        balance: i64,
        /// Delta that was rejected.
        delta: i64,
    },

    /// `2pc_commit` arrived with no matching prepare on record.
    #[error("no prepare recorded for this transaction")]
    NoMatchingPrepare,

    /// A fault-injection tag told this participant to abort at this
    /// phase rather than run its normal logic (§6 `simulation_num`,
    /// glossary "Simulation tag").
    #[error("simulated fault injected for this phase")]
    SimulatedFault,

    /// The underlying Raft layer failed to replicate or timed out.
    #[error(transparent)]
    Raft(#[from] ledger_raft::RaftError),

    /// A lower-level transport or persistence failure.
    #[error(transparent)]
    Ledger(#[from] ledger_core::LedgerError),
}

/// Convenience alias used throughout this crate.
pub type ClusterResult<T> = Result<T, ClusterError>;
