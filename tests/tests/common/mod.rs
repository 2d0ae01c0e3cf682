//! Shared harness: boot a full two-cluster system (three Raft nodes per
//! cluster plus the coordinator) on ephemeral ports and tempdirs, the
//! way [`ledger_raft::node`]'s own test module boots a bare cluster.

use ledger_cluster::ClusterNode;
use ledger_core::{ClusterTag, Endpoint, NodeEntry, NodeTable};
use ledger_coordinator::{Coordinator, CoordinatorTiming};
use ledger_raft::{RaftNode, RaftTiming};
use std::sync::Arc;
use std::time::Duration;

const CLUSTER_A: [&str; 3] = ["A1", "A2", "A3"];
const CLUSTER_B: [&str; 3] = ["B1", "B2", "B3"];

/// Election/heartbeat timing tightened so tests don't spend real
/// wall-clock time waiting on the production defaults.
pub fn fast_raft_timing() -> RaftTiming {
    RaftTiming {
        election_timeout_min: Duration::from_millis(100),
        election_timeout_max: Duration::from_millis(200),
        heartbeat_interval: Duration::from_millis(30),
    }
}

pub fn fast_coordinator_timing() -> CoordinatorTiming {
    CoordinatorTiming {
        probe_timeout: Duration::from_millis(300),
        retry_poll_interval: Duration::from_millis(20),
        retry_window: Duration::from_millis(500),
        crash_duration: Duration::from_millis(300),
    }
}

async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    listener.local_addr().unwrap().port()
}

/// A running two-cluster system. Keeps every node's tempdir alive for
/// the harness's lifetime; dropped at the end of the test.
#[derive(Debug)]
pub struct System {
    pub table: NodeTable,
    _dirs: Vec<tempfile::TempDir>,
}

/// Boot three nodes per cluster plus a coordinator, all serving on
/// ephemeral localhost ports, and wait briefly for both clusters to
/// elect a leader.
pub async fn spawn_system(raft_timing: RaftTiming, coordinator_timing: CoordinatorTiming) -> System {
    let mut entries = Vec::new();
    for id in CLUSTER_A {
        entries.push(NodeEntry {
            node_id: id.to_string(),
            cluster: ClusterTag::A,
            endpoint: Endpoint::localhost(free_port().await),
        });
    }
    for id in CLUSTER_B {
        entries.push(NodeEntry {
            node_id: id.to_string(),
            cluster: ClusterTag::B,
            endpoint: Endpoint::localhost(free_port().await),
        });
    }
    entries.push(NodeEntry {
        node_id: "Coordinator".to_string(),
        cluster: ClusterTag::Coordinator,
        endpoint: Endpoint::localhost(free_port().await),
    });
    let table = NodeTable::from_entries(entries);

    let mut dirs = Vec::new();

    for id in CLUSTER_A.into_iter().chain(CLUSTER_B) {
        let dir = tempfile::tempdir().unwrap();
        let entry = table.entry(id).unwrap().clone();
        let store = ledger_storage::RaftStore::open(dir.path(), id).unwrap();
        let peers = table.peers_of(id).unwrap();
        let state_machine = Arc::new(
            ledger_cluster::ClusterStateMachine::open(dir.path(), id, entry.cluster).unwrap(),
        );

        let raft = RaftNode::new(
            id.to_string(),
            peers,
            table.clone(),
            store,
            raft_timing,
            Arc::clone(&state_machine) as Arc<dyn ledger_raft::StateMachine>,
        );
        raft.spawn_background_tasks();

        let cluster_node = Arc::new(ClusterNode::new(id.to_string(), raft, state_machine));
        tokio::spawn(ledger_transport::serve(entry.endpoint, cluster_node));

        dirs.push(dir);
    }

    let coordinator_dir = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(
        Coordinator::new(table.clone(), coordinator_dir.path(), coordinator_timing).unwrap(),
    );
    let coordinator_endpoint = table.endpoint("Coordinator").unwrap();
    tokio::spawn(ledger_transport::serve(coordinator_endpoint, coordinator));
    dirs.push(coordinator_dir);

    tokio::time::sleep(Duration::from_millis(50)).await;
    wait_for_leaders(&table).await;

    System {
        table,
        _dirs: dirs,
    }
}

async fn wait_for_leaders(table: &NodeTable) {
    for _ in 0..100 {
        if cluster_has_leader(table, ClusterTag::A).await && cluster_has_leader(table, ClusterTag::B).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
}

async fn cluster_has_leader(table: &NodeTable, cluster: ClusterTag) -> bool {
    discover_leader(table, cluster).await.is_some()
}

/// Find any node in `cluster` currently answering `GetLeaderStatus`
/// with `true`.
pub async fn discover_leader(table: &NodeTable, cluster: ClusterTag) -> Option<String> {
    for node_id in table.members_of(cluster) {
        let endpoint = table.endpoint(&node_id).unwrap();
        if let Ok(ledger_core::RpcResponse::LeaderStatus { is_leader: true }) =
            ledger_transport::client::call(endpoint, &ledger_core::RpcRequest::GetLeaderStatus).await
        {
            return Some(node_id);
        }
    }
    None
}

/// Read a cluster's balance off its current leader, polling briefly in
/// case replication of a just-committed entry hasn't landed yet.
pub async fn balance_of(table: &NodeTable, cluster: ClusterTag) -> i64 {
    for _ in 0..50 {
        if let Some(leader) = discover_leader(table, cluster).await {
            let endpoint = table.endpoint(&leader).unwrap();
            if let Ok(ledger_core::RpcResponse::BalanceInfo { balance, .. }) =
                ledger_transport::client::call(endpoint, &ledger_core::RpcRequest::GetBalance).await
            {
                return balance;
            }
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    panic!("could not read balance for cluster {cluster}");
}
