//! Process bootstrap for the 2PC coordinator (§6, §7): opens its own
//! transaction log and serves `2pc_request` until `SIGTERM`/Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use ledger_core::NodeTable;
use ledger_coordinator::{Coordinator, CoordinatorTiming};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ledger-coordinator-bin", about = "Run the 2PC coordinator process")]
struct Args {
    /// Directory holding the coordinator's own transaction log.
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
    let endpoint = table.endpoint("Coordinator")?;
    let coordinator = Arc::new(Coordinator::new(table, &args.base_dir, CoordinatorTiming::default())?);

    info!(%endpoint, "starting coordinator");
    ledger_transport::serve(endpoint, coordinator).await?;
    Ok(())
}
