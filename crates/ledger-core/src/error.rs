//! Shared error type for the ledger system.

use thiserror::Error;

/// Errors that can occur anywhere in the ledger stack.
///
/// Every crate in the workspace converts its own error type into this one
/// at its public boundary, following the teacher's pattern of a single
/// flat error enum per layer with `#[from]` conversions for the
/// lower-level errors it wraps.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The node table or process configuration was invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A node id referenced in a request or config does not exist.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// An RPC was sent to a node that is not currently the Raft leader.
    #[error("not leader")]
    NotLeader,

    /// No leader could be discovered for a cluster within the probe window.
    #[error("no leader found for cluster {0}")]
    NoLeaderFound(String),

    /// A 2PC prepare was rejected because applying the delta would make
    /// the balance negative.
    #[error("insufficient funds: balance {balance} + delta {delta} < 0")]
    InsufficientFunds {
        /// Balance prior to applying the delta.
        balance: i64,
        /// Delta that was rejected.
        delta: i64,
    },

    /// A network operation failed or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// A connection or RPC round-trip exceeded its timeout.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Serializing or deserializing a wire message or persisted record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted-state file operation failed.
    #[error("persistence error: {0}")]
    Io(#[from] std::io::Error),

    /// The wire message had an unrecognized `rpc_type` or malformed `data`.
    #[error("malformed rpc: {0}")]
    MalformedRpc(String),

    /// An internal invariant was violated; this should never happen in a
    /// correct implementation and is logged as a bug if observed.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the workspace.
pub type LedgerResult<T> = Result<T, LedgerError>;
