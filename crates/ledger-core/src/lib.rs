//! # ledger-core
//!
//! Shared types, static process topology, fault-injection tags, and the
//! single-document RPC wire protocol used by every other crate in this
//! workspace. Contains no networking or persistence logic of its own.

pub mod config;
pub mod error;
pub mod ids;
pub mod simulation;
pub mod wire;

pub use config::{Endpoint, NodeEntry, NodeTable};
pub use error::{LedgerError, LedgerResult};
pub use ids::{AccountTag, ClusterTag, LogIndex, NodeId, RaftTerm, TransactionId};
pub use simulation::{SimulationScenario, SIMULATED_CRASH_DURATION};
pub use wire::{AllLogs, Command, LogEntry, RpcRequest, RpcResponse, TransactionDeltas, TwoPcRecord};
