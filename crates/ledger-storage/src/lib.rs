//! # ledger-storage
//!
//! Persistence primitives for the per-node state named in §6: the
//! balance file, the prepare/commit append-only logs, and the Raft
//! term/vote/log-prefix store. Every write that a caller waits on for a
//! `prepared`/`committed`/vote/append reply is fsynced before the
//! function returns, per the durability requirement in §5.

pub mod account;
pub mod raft_store;
pub mod record_log;

pub use account::AccountStore;
pub use raft_store::RaftStore;
pub use record_log::RecordLog;
