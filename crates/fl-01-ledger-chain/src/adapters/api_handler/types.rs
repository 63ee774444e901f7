//! # API Handler Types
//!
//! Data types for API requests and responses.

use crate::domain::entry::LedgerEntry;
use serde::{Deserialize, Serialize};

/// Status code and JSON body returned to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(200, body)
    }

    pub fn error(status: u16, kind: &str, message: impl std::fmt::Display) -> Self {
        Self::new(
            status,
            serde_json::json!({
                "error": {
                    "kind": kind,
                    "message": message.to_string(),
                }
            }),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// JSON view of a ledger entry with hex-encoded digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub sequence_number: u64,
    pub transaction_id: String,
    pub from_account: u64,
    pub to_account: u64,
    /// Integer minor units
    pub amount: i64,
    pub status: String,
    pub description: String,
    pub metadata: String,
    /// Hex encoded
    pub prev_hash: String,
    /// Hex encoded
    pub hash: String,
    pub external_reference: Option<String>,
    pub recorded_at: u64,
}

impl From<&LedgerEntry> for EntryView {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            sequence_number: entry.sequence_number,
            transaction_id: entry.transaction_id.clone(),
            from_account: entry.from_account.0,
            to_account: entry.to_account.0,
            amount: entry.amount,
            status: entry.status.to_string(),
            description: entry.description.clone(),
            metadata: entry.metadata.clone(),
            prev_hash: entry.prev_hash.to_hex(),
            hash: entry.hash.to_hex(),
            external_reference: entry.external_reference.clone(),
            recorded_at: entry.recorded_at,
        }
    }
}

/// Body of a reversal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversalRequest {
    pub original_transaction_id: String,
    pub reversal_transaction_id: String,
    #[serde(default)]
    pub reason: String,
}

/// Body of an external reference request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRequest {
    pub transaction_id: String,
    pub reference: String,
}
