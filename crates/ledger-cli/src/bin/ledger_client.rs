//! The operator-facing client CLI (§6): one subcommand per client RPC,
//! addressing the system entirely over the wire protocol against the
//! static topology.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use ledger_cli::client;
use ledger_core::{AccountTag, NodeTable};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ledger-client", about = "Drive the ledger system's client commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a raw balance value to whichever cluster node accepts it.
    Submit {
        value: i64,
    },
    /// Force whichever cluster node is currently leader to step down.
    LeaderChange,
    /// Detach a node from the network for the simulated crash duration.
    SimulateCrash {
        node_id: String,
    },
    /// Ask every cluster node to dump its logs to its own output.
    PrintLogs,
    /// Run a two-phase commit transaction across both clusters.
    Transaction {
        delta_a: i64,
        delta_b: i64,
        /// Replace the given deltas with the computed bonus amount.
        #[arg(long)]
        bonus: bool,
        /// Crash simulation scenario tag (0-5), defaults to none.
        #[arg(long, default_value_t = 0)]
        sim: u32,
    },
    /// Report each cluster node's view of current leadership.
    CheckStatus,
    /// Report each cluster node's balance.
    GetBalances,
    /// Set an account's balance directly, bypassing 2PC.
    SetBalance {
        /// `a` or `b`.
        account: String,
        value: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    ledger_cli::logging::init()?;
    let cli = Cli::parse();
    let table = NodeTable::default_topology();

    match cli.command {
        Command::Submit { value } => client::submit(&table, value).await?,
        Command::LeaderChange => client::trigger_leader_change(&table).await?,
        Command::SimulateCrash { node_id } => client::simulate_crash(&table, &node_id).await?,
        Command::PrintLogs => client::print_logs(&table).await?,
        Command::Transaction {
            delta_a,
            delta_b,
            bonus,
            sim,
        } => {
            let status = client::perform_transaction(&table, delta_a, delta_b, bonus, sim).await?;
            info!(status, "transaction result");
        }
        Command::CheckStatus => client::check_status(&table).await?,
        Command::GetBalances => client::get_balances(&table).await?,
        Command::SetBalance { account, value } => {
            let account = parse_account(&account)?;
            client::set_balance(&table, account, value).await?;
        }
    }
    Ok(())
}

fn parse_account(raw: &str) -> Result<AccountTag> {
    match raw.to_ascii_lowercase().as_str() {
        "a" => Ok(AccountTag::AccountA),
        "b" => Ok(AccountTag::AccountB),
        other => Err(anyhow!("unknown account '{other}', expected 'a' or 'b'")),
    }
}
