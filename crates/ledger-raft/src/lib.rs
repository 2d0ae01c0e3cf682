//! # ledger-raft
//!
//! The per-cluster Raft consensus core described in §4.1: leader
//! election, log replication, heartbeats, the majority-plus-current-term
//! commit rule, and the `SimulateCrash`/`TriggerLeaderChange` operator
//! hooks. Contains no 2PC or balance semantics; those are layered on top
//! by `ledger-cluster` via the [`StateMachine`] callback.

pub mod apply;
pub mod error;
pub mod node;
pub mod state;

pub use apply::{NullStateMachine, StateMachine};
pub use error::{RaftError, RaftResult};
pub use node::RaftNode;
pub use state::{RaftRole, RaftTiming, SIMULATE_CRASH_DURATION};
