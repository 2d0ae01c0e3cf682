//! The 2PC coordinator driver (§4.4): leader discovery, the prepare and
//! commit phases with bounded retry, and the crash/recovery handling
//! described by the simulation scenarios.

use ledger_core::{
    ClusterTag, Endpoint, LedgerError, NodeId, NodeTable, RpcRequest, RpcResponse,
    SimulationScenario, TransactionDeltas,
};
use std::sync::Mutex as StdMutex;
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::config::CoordinatorTiming;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::transaction_log::{PendingEntry, TransactionLog, TransactionPhase};

/// The client-visible terminal outcome of a driven transaction (§4.4
/// "Client reply").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoPcOutcome {
    /// Both participants acknowledged commit.
    Committed,
    /// The prepare phase did not achieve unanimous `prepared`.
    Aborted,
}

impl TwoPcOutcome {
    /// The `status` string this outcome is reported as on the wire.
    #[must_use]
    pub fn wire_status(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }
}

/// The singleton 2PC coordinator (§2, §4.4).
///
/// One transaction is driven at a time: [`Coordinator::run_transaction`]
/// takes an internal lock for its whole duration, matching §5's "a
/// coordinator processes one transaction at a time; there is no
/// concurrent 2PC." This is also what makes the recovery log comparison
/// in [`Coordinator::recover`] well-defined (§9 open question 3).
pub struct Coordinator {
    table: NodeTable,
    timing: CoordinatorTiming,
    serialize: AsyncMutex<()>,
    log: StdMutex<TransactionLog>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Build a coordinator addressing peers through `table`, persisting
    /// its transaction log under `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction log cannot be opened; a
    /// fatal-only startup condition per §7.
    pub fn new(
        table: NodeTable,
        base_dir: &std::path::Path,
        timing: CoordinatorTiming,
    ) -> ledger_core::LedgerResult<Self> {
        Ok(Self {
            table,
            timing,
            serialize: AsyncMutex::new(()),
            log: StdMutex::new(TransactionLog::open(base_dir)?),
        })
    }

    /// Discover the current leader of `cluster` by probing each member
    /// node with `GetLeaderStatus` (§4.4 phase setup, step 1).
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NoLeaderFound`] if no member answers
    /// `is_leader: true` within the probe window.
    pub async fn discover_leader(&self, cluster: ClusterTag) -> CoordinatorResult<NodeId> {
        let members = self.table.members_of(cluster);
        let mut handles = Vec::new();
        for member in members {
            let table = self.table.clone();
            let probe_timeout = self.timing.probe_timeout;
            handles.push(tokio::spawn(async move {
                let endpoint = table.endpoint(&member).ok()?;
                let response = ledger_transport::client::call_with_timeouts(
                    endpoint,
                    &RpcRequest::GetLeaderStatus,
                    probe_timeout,
                    probe_timeout,
                )
                .await
                .ok()?;
                matches!(response, RpcResponse::LeaderStatus { is_leader: true }).then_some(member)
            }));
        }

        for handle in handles {
            if let Ok(Some(node_id)) = handle.await {
                return Ok(node_id);
            }
        }
        Err(CoordinatorError::NoLeaderFound(cluster.to_string()))
    }

    /// Query a single node's balance (used for the `bonus` transaction
    /// convenience of SPEC_FULL.md §B.2 and the `get_balances` client
    /// command).
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] if the node cannot be reached.
    pub async fn get_balance(&self, node_id: &str) -> ledger_core::LedgerResult<i64> {
        let endpoint = self.table.endpoint(node_id)?;
        let response = ledger_transport::client::call(endpoint, &RpcRequest::GetBalance).await?;
        match response {
            RpcResponse::BalanceInfo { balance, .. } => Ok(balance),
            other => Err(LedgerError::Internal(format!(
                "unexpected GetBalance reply: {other:?}"
            ))),
        }
    }

    /// Compute the `bonus` transaction's deltas (SPEC_FULL.md §B.2):
    /// discover cluster A's leader, read its balance, and apply
    /// `floor(0.2 * balance)` to both accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if cluster A's leader cannot be discovered or
    /// queried.
    pub async fn bonus_transaction_deltas(&self) -> CoordinatorResult<TransactionDeltas> {
        let leader_a = self.discover_leader(ClusterTag::A).await?;
        let balance = self.get_balance(&leader_a).await?;
        #[allow(clippy::arithmetic_side_effects)]
        let delta = (balance * 2) / 10;
        Ok(TransactionDeltas {
            account_a: delta,
            account_b: delta,
        })
    }

    /// Drive one transaction end to end: leader discovery, prepare,
    /// commit, and (on any partial failure) recovery (§4.4). Serializes
    /// against any other in-flight call to this method.
    pub async fn run_transaction(
        &self,
        transactions: TransactionDeltas,
        scenario: SimulationScenario,
    ) -> TwoPcOutcome {
        let _guard = self.serialize.lock().await;

        let Ok(mut leader_a) = self.discover_leader(ClusterTag::A).await else {
            warn!("no leader found for cluster A, aborting transaction");
            return self.finish(transactions, scenario, TwoPcOutcome::Aborted);
        };
        let Ok(mut leader_b) = self.discover_leader(ClusterTag::B).await else {
            warn!("no leader found for cluster B, aborting transaction");
            return self.finish(transactions, scenario, TwoPcOutcome::Aborted);
        };

        if scenario == SimulationScenario::CoordinatorCrashAfterSendingPrepare {
            self.fire_and_forget_prepare(&leader_a, &leader_b, transactions, scenario);
            self.simulate_crash_sleep().await;
        }

        if !self
            .prepare_phase(&leader_a, &leader_b, transactions, scenario)
            .await
        {
            return self.finish(transactions, scenario, TwoPcOutcome::Aborted);
        }
        self.record(transactions, scenario, TransactionPhase::Prepared);

        if scenario == SimulationScenario::CoordinatorCrashBeforeCommit {
            self.simulate_crash_sleep().await;
            // On resume: prepare is idempotent and Raft-durable, so
            // re-issuing it is always safe (§4.4 "Recovery" / §4.3).
            if !self
                .prepare_phase(&leader_a, &leader_b, transactions, scenario)
                .await
            {
                return self.finish(transactions, scenario, TwoPcOutcome::Aborted);
            }
            // The affected cluster may have elected a new leader while
            // the coordinator was detached; re-discover before committing.
            leader_a = self
                .discover_leader(ClusterTag::A)
                .await
                .unwrap_or(leader_a);
            leader_b = self
                .discover_leader(ClusterTag::B)
                .await
                .unwrap_or(leader_b);
        }

        self.record(transactions, scenario, TransactionPhase::CommitSent);

        if scenario == SimulationScenario::CoordinatorDifferentPrepareCommitLog {
            // Deliberately commit only cluster A, leaving cluster B
            // in-doubt, exercising the recovery comparison's diverging
            // path (§4.4 scenario S6, §9 open question 3).
            self.send_commit_retrying(&leader_a, transactions, scenario)
                .await;
            return self.recover(transactions, scenario, &leader_a, &leader_b).await;
        }

        let committed_a = self
            .send_commit_retrying(&leader_a, transactions, scenario)
            .await;
        let committed_b = self
            .send_commit_retrying(&leader_b, transactions, scenario)
            .await;

        if committed_a && committed_b {
            self.finish(transactions, scenario, TwoPcOutcome::Committed)
        } else {
            warn!("commit not acknowledged by every participant, reconciling via recovery");
            self.recover(transactions, scenario, &leader_a, &leader_b)
                .await
        }
    }

    /// Recovery path (§4.4 "Recovery / crash tags", §9 open question
    /// 3): re-query both participants' logs and compare each cluster's
    /// last prepare/commit transaction ids.
    async fn recover(
        &self,
        transactions: TransactionDeltas,
        scenario: SimulationScenario,
        leader_a: &str,
        leader_b: &str,
    ) -> TwoPcOutcome {
        let matched_a = self.last_prepare_matches_commit(leader_a).await;
        let matched_b = self.last_prepare_matches_commit(leader_b).await;

        if matched_a && matched_b {
            self.finish(transactions, scenario, TwoPcOutcome::Committed)
        } else {
            self.finish(transactions, scenario, TwoPcOutcome::Aborted)
        }
    }

    async fn last_prepare_matches_commit(&self, node_id: &str) -> bool {
        let Ok(endpoint) = self.table.endpoint(node_id) else {
            return false;
        };
        let Ok(RpcResponse::Logs { all_logs }) =
            ledger_transport::client::call(endpoint, &RpcRequest::GetLogs).await
        else {
            return false;
        };
        match (all_logs.prepare_log.last(), all_logs.commit_log.last()) {
            (Some(prepare), Some(commit)) => prepare.transaction_id == commit.transaction_id,
            _ => false,
        }
    }

    /// Phase 1 (§4.4): send `2pc_prepare` to both leaders concurrently;
    /// both must reply `prepared`.
    async fn prepare_phase(
        &self,
        leader_a: &str,
        leader_b: &str,
        transactions: TransactionDeltas,
        scenario: SimulationScenario,
    ) -> bool {
        let request = RpcRequest::TwoPcPrepare {
            transactions,
            simulation_num: scenario.wire_tag(),
        };
        let (result_a, result_b) = tokio::join!(
            self.call_endpoint_with_retry(leader_a, &request),
            self.call_endpoint_with_retry(leader_b, &request)
        );
        is_prepared(&result_a) && is_prepared(&result_b)
    }

    /// Phase 2 for a single participant (§4.4): send `2pc_commit`, with
    /// the same bounded retry policy as prepare. A participant that
    /// already replied `prepared` is expected to eventually apply the
    /// commit; a timeout here is treated as transient, not an abort.
    async fn send_commit_retrying(
        &self,
        leader: &str,
        transactions: TransactionDeltas,
        scenario: SimulationScenario,
    ) -> bool {
        let request = RpcRequest::TwoPcCommit {
            transactions,
            simulation_num: scenario.wire_tag(),
        };
        is_committed(&self.call_endpoint_with_retry(leader, &request).await)
    }

    /// Send `2pc_prepare` to both leaders without waiting for a reply,
    /// simulating the coordinator crashing immediately after sending
    /// (§4.4 scenario S5).
    fn fire_and_forget_prepare(
        &self,
        leader_a: &str,
        leader_b: &str,
        transactions: TransactionDeltas,
        scenario: SimulationScenario,
    ) {
        let request = RpcRequest::TwoPcPrepare {
            transactions,
            simulation_num: scenario.wire_tag(),
        };
        for leader in [leader_a, leader_b] {
            if let Ok(endpoint) = self.table.endpoint(leader) {
                let request = request.clone();
                tokio::spawn(async move {
                    let _ = ledger_transport::client::call(endpoint, &request).await;
                });
            }
        }
    }

    async fn simulate_crash_sleep(&self) {
        info!(duration = ?self.timing.crash_duration, "coordinator simulating crash");
        tokio::time::sleep(self.timing.crash_duration).await;
    }

    /// Send one RPC to `node_id`, retrying every `retry_poll_interval`
    /// until `retry_window` elapses (§4.4: "poll every 100ms up to 2s").
    async fn call_endpoint_with_retry(
        &self,
        node_id: &str,
        request: &RpcRequest,
    ) -> ledger_core::LedgerResult<RpcResponse> {
        let Ok(endpoint) = self.table.endpoint(node_id) else {
            return Err(LedgerError::UnknownNode(node_id.to_string()));
        };
        self.call_with_retry(endpoint, request).await
    }

    async fn call_with_retry(
        &self,
        endpoint: Endpoint,
        request: &RpcRequest,
    ) -> ledger_core::LedgerResult<RpcResponse> {
        let deadline = Instant::now() + self.timing.retry_window;
        loop {
            match ledger_transport::client::call(endpoint, request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if Instant::now() >= deadline {
                        return Err(err);
                    }
                    tokio::time::sleep(self.timing.retry_poll_interval).await;
                }
            }
        }
    }

    fn record(
        &self,
        transactions: TransactionDeltas,
        scenario: SimulationScenario,
        phase: TransactionPhase,
    ) {
        #[allow(clippy::unwrap_used)]
        let mut log = self.log.lock().unwrap();
        if let Err(err) = log.append(PendingEntry {
            transactions,
            simulation_num: scenario.wire_tag(),
            phase,
        }) {
            warn!(%err, "failed to persist coordinator transaction log entry");
        }
    }

    fn finish(
        &self,
        transactions: TransactionDeltas,
        scenario: SimulationScenario,
        outcome: TwoPcOutcome,
    ) -> TwoPcOutcome {
        let phase = match outcome {
            TwoPcOutcome::Committed => TransactionPhase::Committed,
            TwoPcOutcome::Aborted => TransactionPhase::Aborted,
        };
        self.record(transactions, scenario, phase);
        info!(status = outcome.wire_status(), "transaction finished");
        outcome
    }
}

fn is_prepared(result: &ledger_core::LedgerResult<RpcResponse>) -> bool {
    matches!(
        result,
        Ok(RpcResponse::PrepareResult { status }) if status == "prepared"
    )
}

fn is_committed(result: &ledger_core::LedgerResult<RpcResponse>) -> bool {
    matches!(
        result,
        Ok(RpcResponse::CommitResult { status }) if status == "committed"
    )
}
