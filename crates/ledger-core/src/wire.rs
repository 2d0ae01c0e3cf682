//! The single-document wire protocol shared by every process.
//!
//! Every inter-process message is one TCP connection carrying exactly one
//! JSON request of shape `{rpc_type, data}` and replying with exactly one
//! JSON response before closing (§4.5). The source dispatches on
//! `rpc_type` with an if/elif ladder; here it is a tagged union matched
//! exhaustively, per the re-architecture guidance in §9.

use crate::ids::{LogIndex, NodeId, RaftTerm, TransactionId};
use serde::{Deserialize, Serialize};

/// The two account deltas carried by a 2PC transaction request, keyed by
/// the wire protocol's literal field names `AccountA` / `AccountB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDeltas {
    /// Delta to apply to cluster A's balance.
    #[serde(rename = "AccountA")]
    pub account_a: i64,
    /// Delta to apply to cluster B's balance.
    #[serde(rename = "AccountB")]
    pub account_b: i64,
}

impl TransactionDeltas {
    /// The delta relevant to a single cluster.
    #[must_use]
    pub fn for_cluster(self, cluster: crate::ids::ClusterTag) -> i64 {
        match cluster {
            crate::ids::ClusterTag::A => self.account_a,
            crate::ids::ClusterTag::B => self.account_b,
            crate::ids::ClusterTag::Coordinator => 0,
        }
    }
}

/// An append-only 2PC record: a prepare or a commit, identical in shape
/// (per §3, `CommitRecord` has the same shape as `PrepareRecord`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoPcRecord {
    /// Per-cluster transaction id, assigned at prepare time.
    pub transaction_id: TransactionId,
    /// Fault-injection tag carried through for observability/debugging.
    pub simulation_num: u32,
    /// The two account deltas this record covers.
    pub transactions: TransactionDeltas,
}

/// A command applied to a cluster's state machine once committed by
/// Raft (§4.2). `APPEND_COMMIT` also mutates the balance; the leader is
/// responsible for constructing it so that the mutation is exactly the
/// cluster's delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Command {
    /// Directly overwrite the balance (used by the `SetBalance` RPC and
    /// by test fixtures).
    SetBalance {
        /// New balance.
        value: i64,
    },
    /// Append a prepare record; does not mutate the balance.
    AppendPrepare {
        /// The record to append to the prepare-log.
        record: TwoPcRecord,
    },
    /// Append a commit record and apply its delta to the balance.
    AppendCommit {
        /// The record to append to the commit-log.
        record: TwoPcRecord,
        /// The delta this cluster applies to its own balance.
        delta_for_this_cluster: i64,
    },
    /// A no-op entry; Raft leaders append one on election per the common
    /// "commit a current-term entry immediately" optimization.
    Noop,
}

/// One entry in a Raft log: an index, the term it was created in, and
/// the command it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log; the first real entry is index 1.
    pub index: LogIndex,
    /// Term the leader held when this entry was appended.
    pub term: RaftTerm,
    /// The state machine command this entry carries.
    pub command: Command,
}

/// The snapshot of a cluster's append-only logs returned by `GetLogs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllLogs {
    /// Every prepare record ever appended on this node, in log order.
    pub prepare_log: Vec<TwoPcRecord>,
    /// Every commit record ever appended on this node, in log order.
    pub commit_log: Vec<TwoPcRecord>,
    /// The raw Raft log entries, in index order.
    pub raft_log: Vec<LogEntry>,
}

/// Outcome of a `SubmitValue` RPC: either the local node accepted it
/// (it was leader) or it redirects the caller to the node it believes is
/// leader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmitOutcome {
    /// The value was accepted and proposed through Raft.
    Accepted {
        /// Always `true`.
        success: bool,
    },
    /// The local node is not leader; retry against `leader_name`.
    Redirect {
        /// Node id of the believed leader, if any is known.
        redirect: bool,
        /// Name of the node to retry against.
        leader_name: Option<NodeId>,
    },
}

/// A single RPC request, tagged on the wire as `{"rpc_type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rpc_type", content = "data")]
pub enum RpcRequest {
    /// Raft leader election vote request.
    RequestVote {
        /// Candidate's term.
        term: RaftTerm,
        /// Candidate requesting the vote.
        candidate_id: NodeId,
        /// Index of the candidate's last log entry.
        last_log_index: LogIndex,
        /// Term of the candidate's last log entry.
        last_log_term: RaftTerm,
    },
    /// Raft log replication / heartbeat.
    AppendEntries {
        /// Leader's term.
        term: RaftTerm,
        /// Leader id, so followers can redirect clients.
        leader_id: NodeId,
        /// Index of the log entry immediately preceding `entries`.
        prev_log_index: LogIndex,
        /// Term of the entry at `prev_log_index`.
        prev_log_term: RaftTerm,
        /// Entries to append; empty for a heartbeat.
        entries: Vec<LogEntry>,
        /// Leader's commit index.
        leader_commit: LogIndex,
    },
    /// Submit an arbitrary value directly to a single cluster's Raft log,
    /// bypassing 2PC. Used for exercising a cluster in isolation.
    SubmitValue {
        /// Value to propose.
        value: i64,
    },
    /// Ask a node whether it currently believes itself to be leader.
    GetLeaderStatus,
    /// Read the current balance.
    GetBalance,
    /// Force the balance to a specific value (test/setup convenience).
    SetBalance {
        /// New balance.
        balance: i64,
    },
    /// Read the prepare-log, commit-log, and Raft log.
    GetLogs,
    /// Ask a node to print its logs to its own output (operator tool).
    PrintLog,
    /// Ask a leader to step down immediately.
    TriggerLeaderChange,
    /// Ask a node to detach from the network for the simulated crash
    /// duration.
    SimulateCrash,
    /// Client-facing transaction request handled by the coordinator.
    #[serde(rename = "2pc_request")]
    TwoPcRequest {
        /// The two account deltas.
        transactions: TransactionDeltas,
        /// Fault-injection tag.
        simulation_num: u32,
    },
    /// Coordinator-to-participant prepare phase request.
    #[serde(rename = "2pc_prepare")]
    TwoPcPrepare {
        /// The two account deltas (only this cluster's delta is used).
        transactions: TransactionDeltas,
        /// Fault-injection tag.
        simulation_num: u32,
    },
    /// Coordinator-to-participant commit phase request.
    #[serde(rename = "2pc_commit")]
    TwoPcCommit {
        /// The two account deltas (only this cluster's delta is used).
        transactions: TransactionDeltas,
        /// Fault-injection tag.
        simulation_num: u32,
    },
}

/// A single RPC response, tagged the same way as [`RpcRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rpc_type", content = "data")]
pub enum RpcResponse {
    /// Reply to `RequestVote`.
    VoteResult {
        /// Responder's current term.
        term: RaftTerm,
        /// Whether the vote was granted.
        vote_granted: bool,
    },
    /// Reply to `AppendEntries`.
    AppendResult {
        /// Responder's current term.
        term: RaftTerm,
        /// Whether the append succeeded.
        success: bool,
        /// Hint for the next index to try on failure.
        match_index: Option<LogIndex>,
    },
    /// Reply to `SubmitValue`.
    Submitted(SubmitOutcome),
    /// Reply to `GetLeaderStatus`.
    LeaderStatus {
        /// Whether the responder currently believes itself to be leader.
        is_leader: bool,
    },
    /// Reply to `GetBalance`.
    BalanceInfo {
        /// `"ok"` on success.
        status: String,
        /// Responding node's id.
        node_name: NodeId,
        /// Current balance.
        balance: i64,
    },
    /// Reply to `GetLogs`.
    Logs {
        /// Snapshot of all three logs.
        all_logs: AllLogs,
    },
    /// Generic status acknowledgement, used by `SetBalance`, `PrintLog`,
    /// `TriggerLeaderChange`, and `SimulateCrash`.
    Status {
        /// Human-readable status string, e.g. `"Leader stepping down"`.
        status: String,
    },
    /// `TriggerLeaderChange` on a non-leader node has no effect and
    /// returns an empty object.
    Empty,
    /// Reply to `2pc_request`: the client-visible outcome.
    TwoPcResult {
        /// `"committed"` or `"aborted"`.
        status: String,
    },
    /// Reply to `2pc_prepare`: `"prepared"`, `"abort"`, or an error.
    PrepareResult {
        /// `"prepared"` or `"abort"`.
        status: String,
    },
    /// Reply to `2pc_commit`: `"committed"`, `"abort"`, or an error.
    CommitResult {
        /// `"committed"` or `"abort"`.
        status: String,
    },
    /// A malformed request or an unexpected internal failure. Never
    /// crashes the node; always a reply.
    Error {
        /// Description of what went wrong.
        error: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_as_rpc_type_data_envelope() {
        let req = RpcRequest::GetLeaderStatus;
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["rpc_type"], "GetLeaderStatus");

        let req = RpcRequest::TwoPcPrepare {
            transactions: TransactionDeltas {
                account_a: -100,
                account_b: 100,
            },
            simulation_num: 0,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["rpc_type"], "2pc_prepare");
        assert_eq!(json["data"]["transactions"]["AccountA"], -100);

        let back: RpcRequest = serde_json::from_value(json).unwrap();
        match back {
            RpcRequest::TwoPcPrepare { transactions, .. } => {
                assert_eq!(transactions.account_a, -100);
                assert_eq!(transactions.account_b, 100);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn response_round_trips() {
        let resp = RpcResponse::BalanceInfo {
            status: "ok".to_string(),
            node_name: "A1".to_string(),
            balance: 900,
        };
        let json = serde_json::to_string(&resp).unwrap();
        let back: RpcResponse = serde_json::from_str(&json).unwrap();
        match back {
            RpcResponse::BalanceInfo { balance, .. } => assert_eq!(balance, 900),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
