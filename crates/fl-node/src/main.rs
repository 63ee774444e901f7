//! # FarmLink Ledger Node
//!
//! Runs a single ledger command against the ledger in `FL_DATA_DIR` and
//! prints the JSON response.
//!
//! ## Startup Sequence
//!
//! 1. Parse the command
//! 2. Load configuration (from env)
//! 3. Lock the data directory and open the ledger
//! 4. Run the command, exiting non-zero on an error response

use anyhow::{Context, Result};
use clap::Parser;
use fl_node::{Cli, Command, LedgerNode, NodeConfig};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let command = Cli::parse().command;
    let config = NodeConfig::from_env().context("loading configuration")?;

    // RUST_LOG wins over FL_LOG when both are set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let node = LedgerNode::open(&config)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    if command == Command::VerifyFull {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("[ledger] Ctrl+C received, cancelling verification");
                let _ = cancel_tx.send(true);
            }
        });
    }

    let response = node.run(command, cancel_rx).await;
    println!("{}", serde_json::to_string_pretty(&response.body)?);

    if !response.is_success() {
        info!(status = response.status, "[ledger] Command failed");
        drop(node);
        std::process::exit(1);
    }
    Ok(())
}
