//! # ledger-cli
//!
//! Process bootstrap for cluster nodes and the coordinator, plus the
//! client-facing RPC helpers behind the `ledger-client` binary's
//! command surface (§6).

pub mod client;
pub mod logging;
