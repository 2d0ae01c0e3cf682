//! The 2PC participant (§4.3) and the full per-node RPC dispatch table
//! (§6). A [`ClusterNode`] *composes* a [`RaftNode`] rather than
//! inheriting from it — per the re-architecture guidance in §9, the
//! source's "2PC node extends Raft node" becomes embedding plus
//! delegation.

use async_trait::async_trait;
use ledger_core::{
    AllLogs, Command, LedgerError, RpcRequest, RpcResponse, SimulationScenario, SubmitOutcome,
    TransactionDeltas, TwoPcRecord,
};
use ledger_raft::{RaftError, RaftNode};
use ledger_transport::RpcHandler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ClusterError, ClusterResult};
use crate::state_machine::ClusterStateMachine;

/// How long a participant waits for its own proposal to reach the
/// cluster's commit index before giving up and reporting the 2PC RPC as
/// failed (§4.3: "If Raft replication fails or times out -> reply
/// abort"). Matches the coordinator's own per-RPC timeout window (§4.4).
pub const REPLICATION_WAIT: Duration = Duration::from_secs(2);

/// One cluster node: a Raft participant plus the 2PC handlers and
/// balance/log state machine layered on top of it.
pub struct ClusterNode {
    node_id: String,
    raft: Arc<RaftNode>,
    state_machine: Arc<ClusterStateMachine>,
}

impl std::fmt::Debug for ClusterNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterNode")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

impl ClusterNode {
    /// Compose a cluster node from an already-constructed Raft node and
    /// state machine.
    #[must_use]
    pub fn new(node_id: String, raft: Arc<RaftNode>, state_machine: Arc<ClusterStateMachine>) -> Self {
        Self {
            node_id,
            raft,
            state_machine,
        }
    }

    /// The underlying Raft node, for background task startup.
    #[must_use]
    pub fn raft(&self) -> &Arc<RaftNode> {
        &self.raft
    }

    /// `2pc_prepare` (§4.3). Rejects non-leaders and insufficient
    /// funds; otherwise appends and replicates a `PrepareRecord`.
    ///
    /// `simulation_num` of `CrashBeforePrepare` (SPEC_FULL.md §B, from
    /// `original_source/node_2pc.py`'s `SimulationScenario.CRASH_BEFORE_PREPARE`)
    /// makes this participant abort immediately, before touching the
    /// prepare-log, regardless of funds.
    async fn two_pc_prepare(
        &self,
        transactions: TransactionDeltas,
        simulation_num: u32,
    ) -> ClusterResult<()> {
        if !self.raft.is_leader().await {
            return Err(ClusterError::NotLeader);
        }

        let scenario = SimulationScenario::from_wire_tag(simulation_num).unwrap_or_default();
        if scenario == SimulationScenario::CrashBeforePrepare {
            info!(node_id = %self.node_id, "simulated crash before prepare, aborting");
            return Err(ClusterError::SimulatedFault);
        }

        let delta = transactions.for_cluster(cluster_of(&self.state_machine));
        let balance = self.state_machine.balance();
        if balance + delta < 0 {
            return Err(ClusterError::InsufficientFunds { balance, delta });
        }

        let transaction_id = self.state_machine.next_transaction_id();
        let record = TwoPcRecord {
            transaction_id,
            simulation_num,
            transactions,
        };

        let index = self
            .raft
            .propose(Command::AppendPrepare { record })
            .await?;
        self.raft.wait_for_commit(index, REPLICATION_WAIT).await?;
        info!(node_id = %self.node_id, transaction_id, "prepared");
        Ok(())
    }

    /// `2pc_commit` (§4.3). Matches against the most recent prepare
    /// record (§9 open question 3) and is idempotent by transaction id.
    ///
    /// `simulation_num` of `CrashBeforeCommit` (from
    /// `original_source/node_2pc.py`'s `SimulationScenario.CRASH_BEFORE_COMMIT`)
    /// detaches this node from the network before the delta is applied,
    /// so the Raft proposal below fails and the balance is left
    /// untouched; the original source logs the commit record and then
    /// aborts without applying the delta, which would let a cluster's
    /// commit-log diverge from its balance — this repo instead models
    /// the fault as a genuine crash, which preserves invariant 1 (§8).
    async fn two_pc_commit(
        &self,
        transactions: TransactionDeltas,
        simulation_num: u32,
    ) -> ClusterResult<()> {
        if !self.raft.is_leader().await {
            return Err(ClusterError::NotLeader);
        }

        let prepare = self
            .state_machine
            .last_prepare()
            .ok_or(ClusterError::NoMatchingPrepare)?;

        if self.state_machine.has_commit(prepare.transaction_id) {
            info!(node_id = %self.node_id, transaction_id = prepare.transaction_id, "commit already applied, replying idempotently");
            return Ok(());
        }

        let scenario = SimulationScenario::from_wire_tag(simulation_num).unwrap_or_default();
        if scenario == SimulationScenario::CrashBeforeCommit {
            info!(node_id = %self.node_id, transaction_id = prepare.transaction_id, "simulated crash before commit, aborting");
            self.raft.simulate_crash();
            return Err(ClusterError::SimulatedFault);
        }

        let delta = transactions.for_cluster(cluster_of(&self.state_machine));
        let record = TwoPcRecord {
            transaction_id: prepare.transaction_id,
            simulation_num,
            transactions,
        };

        let index = self
            .raft
            .propose(Command::AppendCommit {
                record,
                delta_for_this_cluster: delta,
            })
            .await?;
        self.raft.wait_for_commit(index, REPLICATION_WAIT).await?;
        info!(node_id = %self.node_id, transaction_id = prepare.transaction_id, "committed");
        Ok(())
    }

    async fn submit_value(&self, value: i64) -> RpcResponse {
        if !self.raft.is_leader().await {
            return RpcResponse::Submitted(SubmitOutcome::Redirect {
                redirect: true,
                leader_name: self.raft.current_leader_hint().await,
            });
        }
        match self.raft.propose(Command::SetBalance { value }).await {
            Ok(index) => match self.raft.wait_for_commit(index, REPLICATION_WAIT).await {
                Ok(()) => RpcResponse::Submitted(SubmitOutcome::Accepted { success: true }),
                Err(err) => RpcResponse::Error {
                    error: err.to_string(),
                },
            },
            Err(err) => RpcResponse::Error {
                error: err.to_string(),
            },
        }
    }

    async fn set_balance(&self, balance: i64) -> RpcResponse {
        if !self.raft.is_leader().await {
            return RpcResponse::Error {
                error: "not leader".to_string(),
            };
        }
        match self.raft.propose(Command::SetBalance { value: balance }).await {
            Ok(index) => match self.raft.wait_for_commit(index, REPLICATION_WAIT).await {
                Ok(()) => RpcResponse::Status {
                    status: "ok".to_string(),
                },
                Err(err) => RpcResponse::Error {
                    error: err.to_string(),
                },
            },
            Err(err) => RpcResponse::Error {
                error: err.to_string(),
            },
        }
    }

    async fn get_logs(&self) -> RpcResponse {
        RpcResponse::Logs {
            all_logs: AllLogs {
                prepare_log: self.state_machine.prepare_records(),
                commit_log: self.state_machine.commit_records(),
                raft_log: self.raft.log_entries().await,
            },
        }
    }

    /// `PrintLog` (§6): an operator debugging aid that dumps the three
    /// logs to this process's own tracing output. Never fails.
    async fn print_log(&self) -> RpcResponse {
        info!(
            node_id = %self.node_id,
            balance = self.state_machine.balance(),
            prepare_records = self.state_machine.prepare_records().len(),
            commit_records = self.state_machine.commit_records().len(),
            raft_log_len = self.raft.log_entries().await.len(),
            "PrintLog"
        );
        RpcResponse::Status {
            status: "ok".to_string(),
        }
    }
}

fn cluster_of(state_machine: &ClusterStateMachine) -> ledger_core::ClusterTag {
    state_machine.account_tag().cluster()
}

impl From<ClusterError> for RpcResponse {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::NotLeader => RpcResponse::Error {
                error: "not leader".to_string(),
            },
            ClusterError::InsufficientFunds { .. } | ClusterError::SimulatedFault => {
                RpcResponse::PrepareResult {
                    status: "abort".to_string(),
                }
            }
            ClusterError::NoMatchingPrepare | ClusterError::Ledger(_) => RpcResponse::Error {
                error: err.to_string(),
            },
            ClusterError::Raft(RaftError::NotLeader) => RpcResponse::Error {
                error: "not leader".to_string(),
            },
            ClusterError::Raft(RaftError::Crashed | RaftError::ReplicationTimeout) => {
                RpcResponse::PrepareResult {
                    status: "abort".to_string(),
                }
            }
            ClusterError::Raft(RaftError::Ledger(inner)) => RpcResponse::Error {
                error: inner.to_string(),
            },
        }
    }
}

#[async_trait]
impl RpcHandler for ClusterNode {
    async fn handle(&self, request: RpcRequest) -> RpcResponse {
        match request {
            RpcRequest::RequestVote {
                term,
                candidate_id,
                last_log_index,
                last_log_term,
            } => match self
                .raft
                .handle_request_vote(term, candidate_id, last_log_index, last_log_term)
                .await
            {
                Ok((term, vote_granted)) => RpcResponse::VoteResult { term, vote_granted },
                Err(err) => RpcResponse::Error {
                    error: err.to_string(),
                },
            },
            RpcRequest::AppendEntries {
                term,
                leader_id,
                prev_log_index,
                prev_log_term,
                entries,
                leader_commit,
            } => match self
                .raft
                .handle_append_entries(
                    term,
                    leader_id,
                    prev_log_index,
                    prev_log_term,
                    entries,
                    leader_commit,
                )
                .await
            {
                Ok((term, success, match_index)) => RpcResponse::AppendResult {
                    term,
                    success,
                    match_index,
                },
                Err(err) => RpcResponse::Error {
                    error: err.to_string(),
                },
            },
            RpcRequest::SubmitValue { value } => self.submit_value(value).await,
            RpcRequest::GetLeaderStatus => RpcResponse::LeaderStatus {
                is_leader: self.raft.is_leader().await,
            },
            RpcRequest::GetBalance => RpcResponse::BalanceInfo {
                status: "ok".to_string(),
                node_name: self.node_id.clone(),
                balance: self.state_machine.balance(),
            },
            RpcRequest::SetBalance { balance } => self.set_balance(balance).await,
            RpcRequest::GetLogs => self.get_logs().await,
            RpcRequest::PrintLog => self.print_log().await,
            RpcRequest::TriggerLeaderChange => {
                if self.raft.trigger_leader_change().await {
                    RpcResponse::Status {
                        status: "Leader stepping down".to_string(),
                    }
                } else {
                    RpcResponse::Empty
                }
            }
            RpcRequest::SimulateCrash => {
                self.raft.simulate_crash();
                RpcResponse::Status {
                    status: "Node crashed".to_string(),
                }
            }
            RpcRequest::TwoPcPrepare {
                transactions,
                simulation_num,
            } => match self.two_pc_prepare(transactions, simulation_num).await {
                Ok(()) => RpcResponse::PrepareResult {
                    status: "prepared".to_string(),
                },
                Err(err) => {
                    warn!(node_id = %self.node_id, %err, "2pc_prepare failed");
                    err.into()
                }
            },
            RpcRequest::TwoPcCommit {
                transactions,
                simulation_num,
            } => match self.two_pc_commit(transactions, simulation_num).await {
                Ok(()) => RpcResponse::CommitResult {
                    status: "committed".to_string(),
                },
                Err(err) => {
                    warn!(node_id = %self.node_id, %err, "2pc_commit failed");
                    match err {
                        ClusterError::NotLeader | ClusterError::Raft(RaftError::NotLeader) => {
                            RpcResponse::Error {
                                error: "not leader".to_string(),
                            }
                        }
                        ClusterError::SimulatedFault
                        | ClusterError::Raft(RaftError::Crashed | RaftError::ReplicationTimeout) => {
                            RpcResponse::CommitResult {
                                status: "abort".to_string(),
                            }
                        }
                        other => RpcResponse::Error {
                            error: other.to_string(),
                        },
                    }
                }
            },
            RpcRequest::TwoPcRequest { .. } => RpcResponse::Error {
                error: "2pc_request is only served by the coordinator".to_string(),
            },
        }
    }

    fn is_available(&self) -> bool {
        !self.raft.is_crashed()
    }
}

impl From<RaftError> for ClusterError {
    fn from(err: RaftError) -> Self {
        Self::Raft(err)
    }
}

impl From<LedgerError> for ClusterError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}
