//! # Node Command Tests
//!
//! Runs parsed commands against a node opened on a temporary data directory.

use clap::Parser;
use fl_node::{Cli, Command, LedgerNode, NodeConfig};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

fn config_for(dir: &TempDir) -> NodeConfig {
    NodeConfig {
        data_dir: dir.path().to_path_buf(),
        lock_timeout: Duration::from_millis(100),
        ..NodeConfig::default()
    }
}

fn command(line: &str) -> Command {
    let args = std::iter::once("fl-node").chain(line.split_whitespace());
    Cli::try_parse_from(args).unwrap().command
}

async fn run(node: &LedgerNode, line: &str) -> fl_01_ledger_chain::adapters::ApiResponse {
    let (_tx, rx) = watch::channel(false);
    node.run(command(line), rx).await
}

#[tokio::test]
async fn test_commands_round_trip_through_node() {
    let dir = TempDir::new().unwrap();
    let node = LedgerNode::open(&config_for(&dir)).unwrap();

    assert_eq!(run(&node, "tip").await.body["tip"], serde_json::Value::Null);

    assert_eq!(run(&node, "record credit-1 0 1 500 seed-loan").await.status, 201);
    assert_eq!(run(&node, "record credit-1 0 1 500 seed-loan").await.status, 200);
    assert_eq!(run(&node, "record sale-1 1 2 120 maize").await.status, 201);

    assert_eq!(run(&node, "balance 1").await.body["balance"], 380);
    assert_eq!(run(&node, "history 2").await.body["entries"][0]["transactionId"], "sale-1");

    let reversed = run(&node, "reverse sale-1 sale-1-rev spoiled").await;
    assert_eq!(reversed.status, 201);
    assert_eq!(run(&node, "balance 2").await.body["balance"], 0);

    assert_eq!(run(&node, "reference credit-1 bank:001").await.status, 200);

    let verified = run(&node, "verify").await;
    assert_eq!(verified.body["ok"], true);

    let full = run(&node, "verify-full").await;
    assert_eq!(full.body["report"]["entries_checked"], 3);
    assert_eq!(run(&node, "tip").await.body["sequenceNumber"], 2);
}

#[tokio::test]
async fn test_error_responses_are_not_success() {
    let dir = TempDir::new().unwrap();
    let node = LedgerNode::open(&config_for(&dir)).unwrap();

    let self_transfer = run(&node, "record tx 3 3 10").await;
    assert_eq!(self_transfer.status, 400);
    assert!(!self_transfer.is_success());

    assert_eq!(run(&node, "reverse missing missing-rev").await.status, 404);
    assert_eq!(run(&node, "verify 5 1").await.status, 400);
}

#[tokio::test]
async fn test_second_node_on_same_directory_is_refused() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir);
    let node = LedgerNode::open(&config).unwrap();
    run(&node, "record credit-1 0 1 500").await;

    assert!(LedgerNode::open(&config).is_err());

    drop(node);
    let reopened = LedgerNode::open(&config).unwrap();
    assert_eq!(run(&reopened, "balance 1").await.body["balance"], 500);
}
