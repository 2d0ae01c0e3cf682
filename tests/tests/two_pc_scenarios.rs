//! Concrete scenarios from the system's testable-properties section:
//! a normal commit, an abort on insufficient funds, and the bonus
//! transaction's computed deltas.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{balance_of, fast_coordinator_timing, fast_raft_timing, spawn_system};
use ledger_core::{AccountTag, ClusterTag};

#[tokio::test]
async fn s1_normal_transaction_commits_and_updates_both_balances() {
    let system = spawn_system(fast_raft_timing(), fast_coordinator_timing()).await;

    ledger_cli::client::set_balance(&system.table, AccountTag::AccountA, 1000)
        .await
        .unwrap();
    ledger_cli::client::set_balance(&system.table, AccountTag::AccountB, 500)
        .await
        .unwrap();

    let status = ledger_cli::client::perform_transaction(&system.table, -100, 100, false, 0)
        .await
        .unwrap();

    assert_eq!(status, "committed");
    assert_eq!(balance_of(&system.table, ClusterTag::A).await, 900);
    assert_eq!(balance_of(&system.table, ClusterTag::B).await, 600);
}

#[tokio::test]
async fn s2_insufficient_funds_aborts_and_leaves_balances_unchanged() {
    let system = spawn_system(fast_raft_timing(), fast_coordinator_timing()).await;

    ledger_cli::client::set_balance(&system.table, AccountTag::AccountA, 50)
        .await
        .unwrap();
    ledger_cli::client::set_balance(&system.table, AccountTag::AccountB, 500)
        .await
        .unwrap();

    let status = ledger_cli::client::perform_transaction(&system.table, -100, 100, false, 0)
        .await
        .unwrap();

    assert_eq!(status, "aborted");
    assert_eq!(balance_of(&system.table, ClusterTag::A).await, 50);
    assert_eq!(balance_of(&system.table, ClusterTag::B).await, 500);
}

#[tokio::test]
async fn s4_bonus_transaction_applies_one_fifth_of_balance_to_both_accounts() {
    let system = spawn_system(fast_raft_timing(), fast_coordinator_timing()).await;

    ledger_cli::client::set_balance(&system.table, AccountTag::AccountA, 1000)
        .await
        .unwrap();
    ledger_cli::client::set_balance(&system.table, AccountTag::AccountB, 500)
        .await
        .unwrap();

    let status = ledger_cli::client::perform_transaction(&system.table, 0, 0, true, 0)
        .await
        .unwrap();

    assert_eq!(status, "committed");
    assert_eq!(balance_of(&system.table, ClusterTag::A).await, 1200);
    assert_eq!(balance_of(&system.table, ClusterTag::B).await, 700);
}
