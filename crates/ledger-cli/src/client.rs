//! RPC helpers behind the `ledger-client` command surface (§6).
//!
//! Each function here is a thin, retry-free wrapper around a single RPC
//! conversation; the `ledger-client` binary owns argument parsing and
//! output formatting. Node-iteration semantics are grounded in the
//! source client's `BaseClient`/`Client2PC` behavior: `submit` and
//! `print_logs` sweep every cluster node, `leader_change` walks cluster
//! A then cluster B until one steps down, and `get_balances` skips the
//! coordinator.

use anyhow::{anyhow, Result};
use ledger_core::{AccountTag, ClusterTag, NodeTable, RpcRequest, RpcResponse, SubmitOutcome};
use tracing::{info, warn};

/// `submit <value>` (§6): try every cluster node in turn, following a
/// non-leader's redirect hint, until one accepts the value.
pub async fn submit(table: &NodeTable, value: i64) -> Result<()> {
    let mut candidates = table.members_of(ClusterTag::A);
    candidates.extend(table.members_of(ClusterTag::B));

    let mut tried = std::collections::HashSet::new();
    let mut next = candidates.first().cloned();

    while let Some(node_id) = next.take() {
        if !tried.insert(node_id.clone()) {
            break;
        }
        let endpoint = table.endpoint(&node_id)?;
        match ledger_transport::client::call(endpoint, &RpcRequest::SubmitValue { value }).await {
            Ok(RpcResponse::Submitted(SubmitOutcome::Accepted { success: true })) => {
                info!(node_id, value, "submit accepted");
                return Ok(());
            }
            Ok(RpcResponse::Submitted(SubmitOutcome::Redirect { leader_name: Some(leader), .. })) => {
                info!(node_id, redirect_to = %leader, "not leader, following redirect");
                next = Some(leader);
            }
            Ok(other) => {
                warn!(node_id, ?other, "unexpected submit reply, trying next node");
                next = candidates.iter().find(|c| !tried.contains(*c)).cloned();
            }
            Err(err) => {
                warn!(node_id, %err, "submit failed, trying next node");
                next = candidates.iter().find(|c| !tried.contains(*c)).cloned();
            }
        }
    }
    Err(anyhow!("no node accepted the submitted value"))
}

/// `leader_change` (§6): ask every cluster node to step down, one
/// cluster at a time, until one of them actually was the leader.
pub async fn trigger_leader_change(table: &NodeTable) -> Result<()> {
    let mut members = table.members_of(ClusterTag::A);
    members.extend(table.members_of(ClusterTag::B));

    for node_id in members {
        let endpoint = table.endpoint(&node_id)?;
        if let Ok(RpcResponse::Status { status }) =
            ledger_transport::client::call(endpoint, &RpcRequest::TriggerLeaderChange).await
        {
            if status == "Leader stepping down" {
                info!(node_id, "leader stepped down");
                return Ok(());
            }
        }
    }
    Err(anyhow!("no leader found to step down"))
}

/// `simulate_crash <node>` (§6): tell a named node to detach itself
/// from the network for the simulated crash duration.
pub async fn simulate_crash(table: &NodeTable, node_id: &str) -> Result<()> {
    let endpoint = table.endpoint(node_id)?;
    let response = ledger_transport::client::call(endpoint, &RpcRequest::SimulateCrash).await?;
    info!(node_id, ?response, "simulate_crash");
    Ok(())
}

/// `print_logs` (§6): ask every cluster node to dump its own logs to
/// its own tracing output.
pub async fn print_logs(table: &NodeTable) -> Result<()> {
    let mut members = table.members_of(ClusterTag::A);
    members.extend(table.members_of(ClusterTag::B));

    for node_id in members {
        let endpoint = table.endpoint(&node_id)?;
        match ledger_transport::client::call(endpoint, &RpcRequest::PrintLog).await {
            Ok(response) => info!(node_id, ?response, "print_logs"),
            Err(err) => warn!(node_id, %err, "print_logs failed"),
        }
    }
    Ok(())
}

/// `check_status` (§6, SPEC_FULL.md §B.3): probe `GetLeaderStatus` on
/// every cluster node and report each one's view of leadership.
pub async fn check_status(table: &NodeTable) -> Result<()> {
    let mut members = table.members_of(ClusterTag::A);
    members.extend(table.members_of(ClusterTag::B));

    for node_id in members {
        let endpoint = table.endpoint(&node_id)?;
        match ledger_transport::client::call(endpoint, &RpcRequest::GetLeaderStatus).await {
            Ok(RpcResponse::LeaderStatus { is_leader }) => {
                info!(node_id, is_leader, "check_status");
            }
            Ok(other) => warn!(node_id, ?other, "unexpected check_status reply"),
            Err(err) => warn!(node_id, %err, "check_status failed"),
        }
    }
    Ok(())
}

/// `get_balances` (§6): report every cluster node's balance, skipping
/// the coordinator (it carries no account).
pub async fn get_balances(table: &NodeTable) -> Result<()> {
    let mut members = table.members_of(ClusterTag::A);
    members.extend(table.members_of(ClusterTag::B));

    for node_id in members {
        let endpoint = table.endpoint(&node_id)?;
        match ledger_transport::client::call(endpoint, &RpcRequest::GetBalance).await {
            Ok(RpcResponse::BalanceInfo { balance, .. }) => {
                info!(node_id, balance, "get_balances");
            }
            Ok(other) => warn!(node_id, ?other, "unexpected get_balances reply"),
            Err(err) => warn!(node_id, %err, "get_balances failed"),
        }
    }
    Ok(())
}

/// `set_balance <account> <value>` (SPEC_FULL.md §B.4): discover the
/// named account's cluster leader and set its balance directly,
/// bypassing 2PC.
pub async fn set_balance(table: &NodeTable, account: AccountTag, balance: i64) -> Result<()> {
    let leader = discover_leader(table, account.cluster()).await?;
    let endpoint = table.endpoint(&leader)?;
    let response =
        ledger_transport::client::call(endpoint, &RpcRequest::SetBalance { balance }).await?;
    info!(leader, ?response, "set_balance");
    Ok(())
}

/// `transaction <delta_a> <delta_b> [bonus] [sim#]` (§6): submit a 2PC
/// transaction to the coordinator. When `bonus` is set, the supplied
/// deltas are discarded entirely and replaced by `floor(0.2 * balance)`
/// applied to both accounts, matching the source's `calculate_bonus`
/// override (client_2pc.py).
pub async fn perform_transaction(
    table: &NodeTable,
    delta_a: i64,
    delta_b: i64,
    bonus: bool,
    simulation_num: u32,
) -> Result<String> {
    let transactions = if bonus {
        let leader_a = discover_leader(table, ClusterTag::A).await?;
        let endpoint = table.endpoint(&leader_a)?;
        let response = ledger_transport::client::call(endpoint, &RpcRequest::GetBalance).await?;
        let balance = match response {
            RpcResponse::BalanceInfo { balance, .. } => balance,
            other => return Err(anyhow!("unexpected GetBalance reply: {other:?}")),
        };
        #[allow(clippy::arithmetic_side_effects)]
        let delta = (balance * 2) / 10;
        ledger_core::TransactionDeltas {
            account_a: delta,
            account_b: delta,
        }
    } else {
        ledger_core::TransactionDeltas {
            account_a: delta_a,
            account_b: delta_b,
        }
    };

    let coordinator = table.endpoint("Coordinator")?;
    let request = RpcRequest::TwoPcRequest {
        transactions,
        simulation_num,
    };
    match ledger_transport::client::call(coordinator, &request).await? {
        RpcResponse::TwoPcResult { status } => Ok(status),
        other => Err(anyhow!("unexpected 2pc_request reply: {other:?}")),
    }
}

async fn discover_leader(table: &NodeTable, cluster: ClusterTag) -> Result<String> {
    for node_id in table.members_of(cluster) {
        let endpoint = table.endpoint(&node_id)?;
        if let Ok(RpcResponse::LeaderStatus { is_leader: true }) =
            ledger_transport::client::call(endpoint, &RpcRequest::GetLeaderStatus).await
        {
            return Ok(node_id);
        }
    }
    Err(anyhow!("no leader found for cluster {cluster}"))
}
