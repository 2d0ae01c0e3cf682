//! Process bootstrap for a single cluster node (§6, §7): wires up its
//! persisted Raft store, balance and 2PC logs, the Raft engine, the
//! [`ClusterNode`](ledger_cluster::ClusterNode) participant, and serves
//! it over the wire protocol until `SIGTERM`/Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use ledger_cluster::{ClusterNode, ClusterStateMachine};
use ledger_core::NodeTable;
use ledger_raft::{RaftNode, RaftTiming};
use ledger_storage::RaftStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ledger-node", about = "Run one cluster participant node")]
struct Args {
    /// Node id from the static topology, e.g. `A1`.
    #[arg(long)]
    node_id: String,

    /// Directory holding this node's persisted state.
    #[arg(long, default_value = "./data")]
    base_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    ledger_cli::logging::init()?;
    let args = Args::parse();

    std::fs::create_dir_all(&args.base_dir)
        .with_context(|| format!("creating base dir {}", args.base_dir.display()))?;

    let table = NodeTable::default_topology();
    let entry = table.entry(&args.node_id)?.clone();
    let peers = table.peers_of(&args.node_id)?;

    let store = RaftStore::open(&args.base_dir, &args.node_id)?;
    let state_machine = Arc::new(ClusterStateMachine::open(
        &args.base_dir,
        &args.node_id,
        entry.cluster,
    )?);

    let raft = RaftNode::new(
        args.node_id.clone(),
        peers,
        table,
        store,
        RaftTiming::default(),
        Arc::clone(&state_machine) as Arc<dyn ledger_raft::StateMachine>,
    );
    raft.spawn_background_tasks();

    let cluster_node = Arc::new(ClusterNode::new(args.node_id.clone(), raft, state_machine));

    info!(node_id = %args.node_id, endpoint = %entry.endpoint, "starting cluster node");
    ledger_transport::serve(entry.endpoint, cluster_node).await?;
    Ok(())
}
