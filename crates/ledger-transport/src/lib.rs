//! # ledger-transport
//!
//! The single-document TCP/JSON RPC transport described in §4.5: one
//! connection carries exactly one request and one reply, then closes.
//! No multiplexing, no persistent connections, no framing beyond "the
//! whole connection is the message."

pub mod client;
pub mod server;

pub use client::{call, call_with_timeouts};
pub use server::{serve, RpcHandler};
