//! Crash-and-recovery scenarios: a cluster leader crashing mid-flow,
//! and the coordinator simulating its own crash at two different
//! points in the 2PC protocol.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{balance_of, discover_leader, fast_coordinator_timing, fast_raft_timing, spawn_system};
use ledger_core::{AccountTag, ClusterTag};
use std::time::Duration;

#[tokio::test]
async fn s3_transaction_commits_after_cluster_a_leader_crashes() {
    let system = spawn_system(fast_raft_timing(), fast_coordinator_timing()).await;

    ledger_cli::client::set_balance(&system.table, AccountTag::AccountA, 1000)
        .await
        .unwrap();
    ledger_cli::client::set_balance(&system.table, AccountTag::AccountB, 500)
        .await
        .unwrap();

    let crashed_leader = discover_leader(&system.table, ClusterTag::A).await.unwrap();
    ledger_cli::client::simulate_crash(&system.table, &crashed_leader)
        .await
        .unwrap();

    let mut new_leader = None;
    for _ in 0..100 {
        if let Some(leader) = discover_leader(&system.table, ClusterTag::A).await {
            if leader != crashed_leader {
                new_leader = Some(leader);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    assert!(new_leader.is_some(), "cluster A should elect a new leader");

    let status = ledger_cli::client::perform_transaction(&system.table, -100, 100, false, 0)
        .await
        .unwrap();

    assert_eq!(status, "committed");
    assert_eq!(balance_of(&system.table, ClusterTag::A).await, 900);
    assert_eq!(balance_of(&system.table, ClusterTag::B).await, 600);
}

#[tokio::test]
async fn s5_coordinator_crash_after_sending_prepare_still_commits() {
    let system = spawn_system(fast_raft_timing(), fast_coordinator_timing()).await;

    ledger_cli::client::set_balance(&system.table, AccountTag::AccountA, 1000)
        .await
        .unwrap();
    ledger_cli::client::set_balance(&system.table, AccountTag::AccountB, 500)
        .await
        .unwrap();

    // simulation_num 5: CoordinatorCrashAfterSendingPrepare (§3 Design
    // Notes / scenario S5). The coordinator fires prepare, "crashes" for
    // `crash_duration`, then re-issues prepare idempotently and commits.
    let status = ledger_cli::client::perform_transaction(&system.table, -100, 100, false, 5)
        .await
        .unwrap();

    assert_eq!(status, "committed");
    assert_eq!(balance_of(&system.table, ClusterTag::A).await, 900);
    assert_eq!(balance_of(&system.table, ClusterTag::B).await, 600);
}

#[tokio::test]
async fn s6_diverging_prepare_commit_log_is_reconciled_by_recovery() {
    let system = spawn_system(fast_raft_timing(), fast_coordinator_timing()).await;

    ledger_cli::client::set_balance(&system.table, AccountTag::AccountA, 1000)
        .await
        .unwrap();
    ledger_cli::client::set_balance(&system.table, AccountTag::AccountB, 500)
        .await
        .unwrap();

    // simulation_num 4: CoordinatorDifferentPrepareCommitLog (scenario
    // S6). The coordinator commits only cluster A, then recovers by
    // comparing each cluster's last prepare/commit transaction ids;
    // since cluster B never committed, the divergence is detected and
    // the coordinator reports `aborted`.
    let status = ledger_cli::client::perform_transaction(&system.table, -100, 100, false, 4)
        .await
        .unwrap();

    assert_eq!(status, "aborted");
}

#[tokio::test]
async fn crash_before_prepare_aborts_transaction_without_touching_balances() {
    let system = spawn_system(fast_raft_timing(), fast_coordinator_timing()).await;

    ledger_cli::client::set_balance(&system.table, AccountTag::AccountA, 1000)
        .await
        .unwrap();
    ledger_cli::client::set_balance(&system.table, AccountTag::AccountB, 500)
        .await
        .unwrap();

    // simulation_num 1: CrashBeforePrepare (original_source/node_2pc.py's
    // SimulationScenario.CRASH_BEFORE_PREPARE). Both participants see
    // the same tag, so both abort at the prepare phase.
    let status = ledger_cli::client::perform_transaction(&system.table, -100, 100, false, 1)
        .await
        .unwrap();

    assert_eq!(status, "aborted");
    assert_eq!(balance_of(&system.table, ClusterTag::A).await, 1000);
    assert_eq!(balance_of(&system.table, ClusterTag::B).await, 500);
}

#[tokio::test]
async fn crash_before_commit_leaves_balances_unchanged_after_recovery() {
    let system = spawn_system(fast_raft_timing(), fast_coordinator_timing()).await;

    ledger_cli::client::set_balance(&system.table, AccountTag::AccountA, 1000)
        .await
        .unwrap();
    ledger_cli::client::set_balance(&system.table, AccountTag::AccountB, 500)
        .await
        .unwrap();

    // simulation_num 2: CrashBeforeCommit. Both leaders prepare
    // normally, then detach from the network right before applying the
    // commit delta; the coordinator's recovery path observes the
    // divergence (prepared but never committed) and reports `aborted`,
    // and neither balance is mutated.
    let status = ledger_cli::client::perform_transaction(&system.table, -100, 100, false, 2)
        .await
        .unwrap();

    assert_eq!(status, "aborted");
    assert_eq!(balance_of(&system.table, ClusterTag::A).await, 1000);
    assert_eq!(balance_of(&system.table, ClusterTag::B).await, 500);
}
