//! # Inbound Ports (Driving Ports)
//!
//! The API the ledger exposes to the rest of the application.

use crate::domain::entry::{AccountId, LedgerEntry, SequenceNumber};
use crate::domain::errors::{LedgerError, VerifyError};
use crate::domain::validator::VerificationReport;
use crate::service::AccountHistory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A request to move funds between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub transaction_id: String,
    pub from: AccountId,
    pub to: AccountId,
    /// Integer minor units.
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: String,
}

/// Entry returned by a recording call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub entry: LedgerEntry,
    /// `false` when the transaction id was already on the chain.
    pub created: bool,
}

/// Primary ledger API.
///
/// Implementations must enforce every chain invariant.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Record a transfer and report whether a new entry was appended.
    ///
    /// ## Errors
    ///
    /// - `InvalidAmount`: `amount <= 0`
    /// - `SelfTransfer`: `from == to`
    /// - `TransactionConflict`: id already used for a different movement
    /// - `RetriesExhausted`: the append kept losing races to other writers
    async fn record(&self, request: TransferRequest) -> Result<Recorded, LedgerError>;

    /// Record a movement of `amount` minor units from `from` to `to`.
    ///
    /// Idempotent on `transaction_id`: recording the same transaction again
    /// returns the entry already on the chain.
    async fn record_transaction(
        &self,
        transaction_id: &str,
        from: AccountId,
        to: AccountId,
        amount: i64,
        description: &str,
        metadata: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let request = TransferRequest {
            transaction_id: transaction_id.to_string(),
            from,
            to,
            amount,
            description: description.to_string(),
            metadata: metadata.to_string(),
        };
        self.record(request).await.map(|recorded| recorded.entry)
    }

    /// Append a compensating entry that undoes `original_transaction_id`.
    ///
    /// Retrying with the same `reversal_transaction_id` returns the existing
    /// compensating entry with `created == false`.
    async fn reverse_transaction(
        &self,
        original_transaction_id: &str,
        reversal_transaction_id: &str,
        reason: &str,
    ) -> Result<Recorded, LedgerError>;

    /// Attach an external settlement identifier to a committed entry.
    ///
    /// Set-once. Repeating the same reference is a no-op.
    fn attach_external_reference(
        &self,
        transaction_id: &str,
        reference: &str,
    ) -> Result<LedgerEntry, LedgerError>;

    /// Entries touching `account`, in ascending sequence order.
    ///
    /// Each call starts a fresh query.
    fn get_account_history(&self, account: AccountId) -> AccountHistory;

    /// Received minus sent over settled entries.
    fn get_balance(&self, account: AccountId) -> Result<i128, LedgerError>;

    /// Look up an entry by its transaction id.
    fn find_transaction(&self, transaction_id: &str) -> Result<Option<LedgerEntry>, LedgerError>;

    /// The most recently committed entry.
    fn tip(&self) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Verify linkage and digests over `[from, to]`.
    ///
    /// Omitted bounds default to genesis and the current tip.
    fn verify_integrity(
        &self,
        from: Option<SequenceNumber>,
        to: Option<SequenceNumber>,
    ) -> Result<(), VerifyError>;

    /// Verify the whole chain page by page.
    ///
    /// Stops early with `VerifyError::Cancelled` once `cancel` turns `true`.
    async fn verify_full(&self, cancel: watch::Receiver<bool>) -> Result<VerificationReport, VerifyError>;
}
