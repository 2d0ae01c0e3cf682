//! # ledger-cluster
//!
//! The per-cluster 2PC participant (§4.3) and the balance/log state
//! machine it drives (§4.2), both layered on top of [`ledger_raft`].

pub mod error;
pub mod participant;
pub mod state_machine;

pub use error::{ClusterError, ClusterResult};
pub use participant::{ClusterNode, REPLICATION_WAIT};
pub use state_machine::ClusterStateMachine;
