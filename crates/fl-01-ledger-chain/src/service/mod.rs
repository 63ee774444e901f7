//! # Ledger Service
//!
//! The main service implementing the ledger API.
//!
//! ## Architecture
//!
//! This service:
//! 1. Implements `LedgerApi` for recording, reversal and queries
//! 2. Retries appends that lose the race for the chain tip
//! 3. Delegates integrity checks to the `ChainValidator`
//! 4. Uses dependency injection for all external dependencies

mod chain_store;
mod helpers;
mod history;

pub use chain_store::{ChainStore, MAX_TRANSACTION_ID_LEN};
pub use history::AccountHistory;

use crate::adapters::{BincodeEntrySerializer, InMemoryKVStore, SystemTimeSource};
use crate::domain::codec::HashCodec;
use crate::domain::entry::{AccountId, EntryCandidate, EntryStatus, LedgerEntry, SequenceNumber};
use crate::domain::errors::{ChainStoreError, LedgerError, VerifyError};
use crate::domain::validator::{ChainCursor, ChainValidator, VerificationReport};
use crate::domain::value_objects::{LedgerConfig, ValidationMode};
use crate::ports::inbound::{LedgerApi, Recorded, TransferRequest};
use crate::ports::outbound::{EntrySerializer, KeyValueStore, TimeSource};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// The Ledger Service.
pub struct LedgerService<KV, TS, SER>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource + 'static,
    SER: EntrySerializer + 'static,
{
    /// Append-only chain persistence.
    pub(crate) store: Arc<ChainStore<KV, TS, SER>>,
    pub(crate) validator: ChainValidator,
    pub(crate) config: LedgerConfig,
}

/// Dependencies for LedgerService
pub struct LedgerDependencies<KV, TS, SER> {
    pub kv_store: KV,
    pub time_source: TS,
    pub serializer: SER,
}

impl<KV, TS, SER> LedgerService<KV, TS, SER>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource + 'static,
    SER: EntrySerializer + 'static,
{
    /// Create a new Ledger Service with the given dependencies.
    pub fn new(deps: LedgerDependencies<KV, TS, SER>, config: LedgerConfig) -> Self {
        let codec = HashCodec::new(config.max_text_len);
        Self {
            store: Arc::new(ChainStore::new(
                deps.kv_store,
                deps.time_source,
                deps.serializer,
                codec,
            )),
            validator: ChainValidator::new(codec),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Direct access to the underlying chain store.
    pub fn store(&self) -> &ChainStore<KV, TS, SER> {
        &self.store
    }
}

impl LedgerService<InMemoryKVStore, SystemTimeSource, BincodeEntrySerializer> {
    /// A service over a fresh in-memory store.
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(
            LedgerDependencies {
                kv_store: InMemoryKVStore::new(),
                time_source: SystemTimeSource,
                serializer: BincodeEntrySerializer,
            },
            config,
        )
    }
}

#[async_trait]
impl<KV, TS, SER> LedgerApi for LedgerService<KV, TS, SER>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource + 'static,
    SER: EntrySerializer + 'static,
{
    async fn record(&self, request: TransferRequest) -> Result<Recorded, LedgerError> {
        if request.amount <= 0 {
            return Err(LedgerError::InvalidAmount {
                amount: request.amount,
            });
        }
        if request.from == request.to {
            return Err(LedgerError::SelfTransfer {
                account: request.from.0,
            });
        }

        let candidate = EntryCandidate::transfer(
            request.transaction_id,
            request.from,
            request.to,
            request.amount,
        )
        .with_description(request.description)
        .with_metadata(request.metadata);

        self.append_with_retry(candidate, None).await
    }

    async fn reverse_transaction(
        &self,
        original_transaction_id: &str,
        reversal_transaction_id: &str,
        reason: &str,
    ) -> Result<Recorded, LedgerError> {
        let original = self
            .store
            .find_by_transaction_id(original_transaction_id)?
            .ok_or_else(|| LedgerError::TransactionNotFound {
                transaction_id: original_transaction_id.to_string(),
            })?;

        if original.status == EntryStatus::Reversed {
            return Err(LedgerError::CannotReverseReversal {
                transaction_id: original_transaction_id.to_string(),
            });
        }

        let candidate = EntryCandidate::transfer(
            reversal_transaction_id,
            original.to_account,
            original.from_account,
            original.amount,
        )
        .with_description(reason)
        .with_metadata(helpers::reversal_metadata(&original))
        .as_reversal();

        if let Some(existing) = self.store.find_reversal(original.sequence_number)? {
            if candidate.matches(&existing) {
                return Ok(Recorded {
                    entry: existing,
                    created: false,
                });
            }
            return Err(LedgerError::AlreadyReversed {
                transaction_id: original_transaction_id.to_string(),
                reversal_id: existing.transaction_id,
            });
        }

        let recorded = self
            .append_with_retry(candidate, Some(original.sequence_number))
            .await?;
        if recorded.created {
            tracing::info!(
                original = original.sequence_number,
                sequence = recorded.entry.sequence_number,
                tx_id = %reversal_transaction_id,
                "[ledger] ↩️ Reversed transaction {}",
                original_transaction_id
            );
        }
        Ok(recorded)
    }

    fn attach_external_reference(
        &self,
        transaction_id: &str,
        reference: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let entry = self
            .store
            .find_by_transaction_id(transaction_id)?
            .ok_or_else(|| LedgerError::TransactionNotFound {
                transaction_id: transaction_id.to_string(),
            })?;

        match self.store.set_external_reference(entry.sequence_number, reference) {
            Ok(updated) => {
                tracing::info!(
                    sequence = updated.sequence_number,
                    tx_id = %transaction_id,
                    reference = %reference,
                    "[ledger] 🔗 External reference attached"
                );
                Ok(updated)
            }
            Err(ChainStoreError::ExternalReferenceConflict { .. }) => {
                Err(LedgerError::ExternalReferenceConflict {
                    transaction_id: transaction_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_account_history(&self, account: AccountId) -> AccountHistory {
        let source: Arc<dyn history::HistorySource> = self.store.clone();
        AccountHistory::new(source, account, self.config.history_page_size)
    }

    fn get_balance(&self, account: AccountId) -> Result<i128, LedgerError> {
        self.get_account_history(account)
            .try_fold(0i128, |balance, entry| Ok(balance + entry?.balance_delta(account)))
    }

    fn find_transaction(&self, transaction_id: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self.store.find_by_transaction_id(transaction_id)?)
    }

    fn tip(&self) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self.store.get_tip()?)
    }

    fn verify_integrity(
        &self,
        from: Option<SequenceNumber>,
        to: Option<SequenceNumber>,
    ) -> Result<(), VerifyError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ChainStoreError::Range {
                    from,
                    to,
                    reason: "start is after end".to_string(),
                }
                .into());
            }
        }
        let Some(tip) = self.store.tip_sequence()? else {
            return Ok(());
        };
        let from = from.unwrap_or(0);
        let to = to.unwrap_or(tip).min(tip);
        if from > to {
            return Err(ChainStoreError::Range {
                from,
                to,
                reason: format!("start is past the chain tip {}", tip),
            }
            .into());
        }

        let cursor = self.anchor_cursor(from)?;
        let mut walk = self.paged_walk(from, to, cursor, ValidationMode::default());
        while walk.step()? {}

        match walk.finish().into_result() {
            Ok(()) => {
                tracing::debug!(from, to, "[ledger] ✅ Range verified");
                Ok(())
            }
            Err(violation) => {
                tracing::error!(
                    sequence = violation.sequence_number,
                    kind = %violation.kind,
                    "[ledger] ❌ Chain integrity violation: {}",
                    violation.details
                );
                Err(violation.into())
            }
        }
    }

    async fn verify_full(&self, cancel: watch::Receiver<bool>) -> Result<VerificationReport, VerifyError> {
        let Some(tip) = self.store.tip_sequence()? else {
            return Ok(VerificationReport::default());
        };

        let mut walk = self.paged_walk(0, tip, ChainCursor::from_genesis(), ValidationMode::report_all());
        loop {
            if *cancel.borrow() {
                let entries_checked = walk.report().entries_checked;
                tracing::warn!(entries_checked, "[ledger] Full verification cancelled");
                return Err(VerifyError::Cancelled { entries_checked });
            }
            if !walk.step()? {
                break;
            }
            tokio::task::yield_now().await;
        }
        let report = walk.finish();

        for violation in &report.violations {
            tracing::error!(
                sequence = violation.sequence_number,
                kind = %violation.kind,
                "[ledger] ❌ Chain integrity violation: {}",
                violation.details
            );
        }
        tracing::info!(
            entries_checked = report.entries_checked,
            violations = report.violations.len(),
            "[ledger] Full verification finished"
        );
        Ok(report)
    }
}
