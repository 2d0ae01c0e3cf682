//! Errors specific to the 2PC coordinator driver.

use thiserror::Error;

/// Errors raised by [`crate::driver::Coordinator`].
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No node in the named cluster answered `GetLeaderStatus` with
    /// `is_leader: true` within the probe window (§4.4 phase setup).
    #[error("no leader found for cluster {0}")]
    NoLeaderFound(String),

    /// A lower-level transport or persistence failure.
    #[error(transparent)]
    Ledger(#[from] ledger_core::LedgerError),
}

/// Convenience alias used throughout this crate.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
