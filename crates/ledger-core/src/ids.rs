//! Node identity and cluster tagging.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque name identifying a single process in the system.
///
/// Matches the static node names used throughout the wire protocol
/// (e.g. `"A1"`, `"B2"`, `"Coordinator"`); never reused across clusters.
pub type NodeId = String;

/// Monotonically increasing per-cluster transaction identifier.
///
/// Assigned by a cluster's Raft leader at prepare time as
/// `last_prepare_id + 1`; cluster A and cluster B maintain independent
/// sequences.
pub type TransactionId = u64;

/// Raft term number. Never decreases at a given node.
pub type RaftTerm = u64;

/// Index into a Raft log. The first real entry is index 1; index 0 is
/// the sentinel "no entry" position used when a log is empty.
pub type LogIndex = u64;

/// Which of the three process roles a [`NodeId`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterTag {
    /// Account cluster A.
    A,
    /// Account cluster B.
    B,
    /// The singleton 2PC coordinator; owns no account state.
    Coordinator,
}

impl fmt::Display for ClusterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::Coordinator => write!(f, "Coordinator"),
        }
    }
}

/// Name of the account a transaction delta applies to; distinct from
/// [`ClusterTag`] only in spelling (`"AccountA"` / `"AccountB"` in the
/// wire protocol's `transactions` map, vs. the bare cluster tag used for
/// addressing and persistence filenames).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountTag {
    /// `AccountA` in the wire protocol's transaction map.
    AccountA,
    /// `AccountB` in the wire protocol's transaction map.
    AccountB,
}

impl AccountTag {
    /// The cluster that owns this account.
    #[must_use]
    pub fn cluster(self) -> ClusterTag {
        match self {
            Self::AccountA => ClusterTag::A,
            Self::AccountB => ClusterTag::B,
        }
    }
}

impl fmt::Display for AccountTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccountA => write!(f, "AccountA"),
            Self::AccountB => write!(f, "AccountB"),
        }
    }
}
