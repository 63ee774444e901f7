//! # Ledger Service - Helper Methods
//!
//! Private helper methods for the LedgerService.

use super::*;
use crate::domain::errors::{ChainIntegrityViolation, ViolationKind};

impl<KV, TS, SER> LedgerService<KV, TS, SER>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource + 'static,
    SER: EntrySerializer + 'static,
{
    /// Append `candidate`, retrying while other writers keep moving the tip.
    ///
    /// A duplicate transaction id resolves to the stored entry when it records
    /// the same movement.
    pub(crate) async fn append_with_retry(
        &self,
        candidate: EntryCandidate,
        reverses: Option<SequenceNumber>,
    ) -> Result<Recorded, LedgerError> {
        let mut attempt = 0u32;

        loop {
            let result = match reverses {
                Some(original) => self.store.append_reversal(candidate.clone(), original),
                None => self.store.append(candidate.clone()),
            };

            match result {
                Ok(entry) => {
                    tracing::info!(
                        sequence = entry.sequence_number,
                        tx_id = %entry.transaction_id,
                        amount = entry.amount,
                        status = %entry.status,
                        "[ledger] 📒 Recorded {} -> {}",
                        entry.from_account,
                        entry.to_account
                    );
                    return Ok(Recorded {
                        entry,
                        created: true,
                    });
                }
                Err(ChainStoreError::DuplicateTransaction {
                    transaction_id,
                    existing,
                }) => {
                    let entry = self.store.get_entry(existing)?;
                    if candidate.matches(&entry) {
                        tracing::debug!(
                            sequence = existing,
                            tx_id = %transaction_id,
                            "[ledger] Duplicate transaction, returning stored entry"
                        );
                        return Ok(Recorded {
                            entry,
                            created: false,
                        });
                    }
                    tracing::warn!(
                        sequence = existing,
                        tx_id = %transaction_id,
                        "[ledger] ⚠️ Transaction id reused with different contents"
                    );
                    return Err(LedgerError::TransactionConflict { transaction_id });
                }
                Err(ChainStoreError::ReversalExists {
                    sequence_number,
                    reversal,
                }) => {
                    let existing = self.store.get_entry(reversal)?;
                    if candidate.matches(&existing) {
                        return Ok(Recorded {
                            entry: existing,
                            created: false,
                        });
                    }
                    let original = self.store.get_entry(sequence_number)?;
                    return Err(LedgerError::AlreadyReversed {
                        transaction_id: original.transaction_id,
                        reversal_id: existing.transaction_id,
                    });
                }
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt > self.config.append_max_retries {
                        tracing::warn!(
                            tx_id = %candidate.transaction_id,
                            attempts = attempt,
                            "[ledger] Giving up on append: {}",
                            e
                        );
                        return Err(LedgerError::RetriesExhausted { attempts: attempt, last: e });
                    }

                    let delay = self.config.backoff_for(attempt);
                    tracing::warn!(
                        tx_id = %candidate.transaction_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "[ledger] 🔁 Chain tip moved, retrying append"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Cursor positioned just before `from`.
    ///
    /// Anchors on the stored predecessor when there is one, so the first
    /// entry of the range is link-checked too.
    pub(crate) fn anchor_cursor(&self, from: SequenceNumber) -> Result<ChainCursor, ChainStoreError> {
        if from == 0 {
            return Ok(ChainCursor::from_genesis());
        }
        Ok(match self.store.read_entry(from - 1)? {
            Some(predecessor) => ChainCursor::anchored(from, predecessor.hash),
            None => ChainCursor::expecting(from),
        })
    }

    /// Paged walk over the stored entries in `[from, to]`.
    pub(crate) fn paged_walk(
        &self,
        from: SequenceNumber,
        to: SequenceNumber,
        cursor: ChainCursor,
        mode: ValidationMode,
    ) -> PagedWalk<'_, KV, TS, SER> {
        PagedWalk {
            store: &self.store,
            validator: &self.validator,
            mode,
            page_size: self.config.verify_page_size.max(1),
            next: Some(from),
            to,
            cursor,
            report: VerificationReport::default(),
        }
    }
}

/// A validation walk that reads one page of entries per step.
///
/// Pages advance by storage key, so the walk always ends whatever the
/// entries themselves claim.
pub(crate) struct PagedWalk<'a, KV, TS, SER> {
    store: &'a ChainStore<KV, TS, SER>,
    validator: &'a ChainValidator,
    mode: ValidationMode,
    page_size: usize,
    /// First sequence number of the next page; `None` once finished.
    next: Option<SequenceNumber>,
    to: SequenceNumber,
    cursor: ChainCursor,
    report: VerificationReport,
}

impl<KV, TS, SER> PagedWalk<'_, KV, TS, SER>
where
    KV: KeyValueStore,
    TS: TimeSource,
    SER: EntrySerializer,
{
    /// Check the next page. Returns `false` once there is nothing left to do.
    pub(crate) fn step(&mut self) -> Result<bool, ChainStoreError> {
        let Some(from) = self.next else {
            return Ok(false);
        };

        let page = self.store.scan_stored(from, self.to, self.page_size)?;
        let Some(&(last, _)) = page.last() else {
            self.next = None;
            return Ok(false);
        };

        let keep_going = self
            .validator
            .continue_walk_stored(&mut self.cursor, &page, self.mode, &mut self.report);
        self.next = match keep_going && last < self.to {
            true => Some(last + 1),
            false => None,
        };
        Ok(self.next.is_some())
    }

    pub(crate) fn report(&self) -> &VerificationReport {
        &self.report
    }

    /// Close the walk, reporting entries missing at the end of the range.
    pub(crate) fn finish(mut self) -> VerificationReport {
        if !(self.mode.stop_on_first_error && !self.report.is_clean()) {
            check_trailing_gap(&self.cursor, self.to, &mut self.report);
        }
        self.report
    }
}

/// Metadata carried by a compensating entry.
pub(crate) fn reversal_metadata(original: &LedgerEntry) -> String {
    serde_json::json!({
        "reverses": original.transaction_id,
        "reverses_sequence": original.sequence_number,
    })
    .to_string()
}

/// Report entries missing between the end of a walk and `last`.
pub(crate) fn check_trailing_gap(
    cursor: &ChainCursor,
    last: SequenceNumber,
    report: &mut VerificationReport,
) {
    let Some(expected) = cursor.expected() else {
        return;
    };
    if expected > last {
        return;
    }
    report.violations.push(ChainIntegrityViolation::new(
        expected,
        ViolationKind::SequenceGap,
        format!("entries {} through {} are missing", expected, last),
    ));
}
