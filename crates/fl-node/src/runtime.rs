//! # Ledger Node Runtime
//!
//! Wires the file-backed ledger together and runs commands against it.
//!
//! ## Startup Sequence
//!
//! 1. Lock the data directory (one process per ledger)
//! 2. Open the ledger file
//! 3. Build the ledger service and its API handler

use crate::command::Command;
use crate::config::NodeConfig;
use anyhow::{Context, Result};
use fl_01_ledger_chain::adapters::{
    ApiGatewayHandler, ApiResponse, BincodeEntrySerializer, DatabaseLock, FileBackedKVStore,
    SystemTimeSource,
};
use fl_01_ledger_chain::{LedgerApi, LedgerDependencies, LedgerService, TransferRequest};
use serde_json::json;
use tokio::sync::watch;
use tracing::info;

pub type NodeLedger = LedgerService<FileBackedKVStore, SystemTimeSource, BincodeEntrySerializer>;

/// A running ledger node.
///
/// Field order matters: the handler (and the store inside it) is dropped
/// before the directory lock is released.
pub struct LedgerNode {
    handler: ApiGatewayHandler<NodeLedger>,
    _lock: DatabaseLock,
}

impl LedgerNode {
    /// Lock the data directory and open the ledger.
    pub fn open(config: &NodeConfig) -> Result<Self> {
        let lock = DatabaseLock::acquire(&config.data_dir, config.lock_timeout)
            .with_context(|| format!("locking {}", config.data_dir.display()))?;

        let path = config.ledger_path();
        let kv_store = FileBackedKVStore::open(&path)
            .with_context(|| format!("opening ledger at {}", path.display()))?;

        let service = LedgerService::new(
            LedgerDependencies {
                kv_store,
                time_source: SystemTimeSource,
                serializer: BincodeEntrySerializer,
            },
            config.ledger.clone(),
        );

        let tip = service.tip().context("reading chain tip")?;
        info!(
            tip = ?tip.as_ref().map(|e| e.sequence_number),
            "[ledger] 🚀 Ledger opened at {}",
            path.display()
        );

        Ok(Self {
            handler: ApiGatewayHandler::new(service),
            _lock: lock,
        })
    }

    pub fn handler(&self) -> &ApiGatewayHandler<NodeLedger> {
        &self.handler
    }

    /// Run one command. `cancel` is only consulted by `verify-full`.
    pub async fn run(&self, command: Command, cancel: watch::Receiver<bool>) -> ApiResponse {
        match command {
            Command::Record {
                transaction_id,
                from,
                to,
                amount,
                description,
                metadata,
            } => {
                let request = TransferRequest {
                    transaction_id,
                    from,
                    to,
                    amount,
                    description,
                    metadata,
                };
                match serde_json::to_value(request) {
                    Ok(body) => self.handler.handle_record(&body).await,
                    Err(e) => ApiResponse::error(400, "invalidParams", e),
                }
            }
            Command::Reverse {
                original_transaction_id,
                reversal_transaction_id,
                reason,
            } => {
                let body = json!({
                    "originalTransactionId": original_transaction_id,
                    "reversalTransactionId": reversal_transaction_id,
                    "reason": reason,
                });
                self.handler.handle_reverse(&body).await
            }
            Command::Reference {
                transaction_id,
                reference,
            } => {
                let body = json!({
                    "transactionId": transaction_id,
                    "reference": reference,
                });
                self.handler.handle_attach_reference(&body)
            }
            Command::Balance { account } => self.handler.handle_balance(account),
            Command::History { account } => self.handler.handle_history(account),
            Command::Verify { from, to } => self.handler.handle_verify(from, to),
            Command::VerifyFull => self.handler.handle_verify_full(cancel).await,
            Command::Tip => self.handler.handle_tip(),
        }
    }
}
