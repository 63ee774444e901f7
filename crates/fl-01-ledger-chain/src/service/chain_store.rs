//! # Chain Store
//!
//! Append-only persistence of ledger entries over a `KeyValueStore`.
//!
//! Appends are compare-and-append operations: the batch that writes an entry
//! also moves the tip pointer, and it only commits if the tip pointer still
//! holds the value read when the entry was built.

use crate::domain::codec::HashCodec;
use crate::domain::entry::{
    AccountId, EntryCandidate, EntryHash, LedgerEntry, SequenceNumber, GENESIS_SEQUENCE,
};
use crate::domain::errors::{ChainStoreError, EncodingError, KVStoreError};
use crate::domain::value_objects::{decode_seq, encode_seq, KeyPrefix};
use crate::ports::outbound::{
    prefix_upper_bound, BatchOperation, EntrySerializer, KeyValueStore, Precondition, TimeSource,
};

/// Maximum length of a transaction id in bytes.
pub const MAX_TRANSACTION_ID_LEN: usize = 128;

// Precondition slots of an append batch.
const TIP_PRECONDITION: usize = 0;
const TRANSACTION_PRECONDITION: usize = 1;
const REVERSAL_PRECONDITION: usize = 2;

/// Append-only store of hash-linked entries.
pub struct ChainStore<KV, TS, SER> {
    kv_store: KV,
    time_source: TS,
    serializer: SER,
    codec: HashCodec,
}

impl<KV, TS, SER> ChainStore<KV, TS, SER>
where
    KV: KeyValueStore,
    TS: TimeSource,
    SER: EntrySerializer,
{
    pub fn new(kv_store: KV, time_source: TS, serializer: SER, codec: HashCodec) -> Self {
        Self {
            kv_store,
            time_source,
            serializer,
            codec,
        }
    }

    pub fn codec(&self) -> &HashCodec {
        &self.codec
    }

    /// Append `candidate` at the current tip.
    ///
    /// ## Errors
    ///
    /// - `DuplicateTransaction`: the transaction id is already on the chain
    /// - `ConcurrentModification`: another append moved the tip first
    /// - `Encoding`: the candidate cannot be canonically encoded
    pub fn append(&self, candidate: EntryCandidate) -> Result<LedgerEntry, ChainStoreError> {
        self.append_inner(candidate, None)
    }

    /// Append a compensating entry for the entry at `original`.
    ///
    /// Fails with `ReversalExists` if `original` already has one.
    pub fn append_reversal(
        &self,
        candidate: EntryCandidate,
        original: SequenceNumber,
    ) -> Result<LedgerEntry, ChainStoreError> {
        self.append_inner(candidate, Some(original))
    }

    fn append_inner(
        &self,
        candidate: EntryCandidate,
        reverses: Option<SequenceNumber>,
    ) -> Result<LedgerEntry, ChainStoreError> {
        check_transaction_id(&candidate.transaction_id)?;

        let tx_key = KeyPrefix::transaction_key(&candidate.transaction_id);
        if let Some(raw) = self.kv_store.get(&tx_key)? {
            return Err(ChainStoreError::DuplicateTransaction {
                transaction_id: candidate.transaction_id,
                existing: decode_index(&raw, "transaction index")?,
            });
        }
        if let Some(original) = reverses {
            if let Some(reversal) = self.reversal_sequence(original)? {
                return Err(ChainStoreError::ReversalExists {
                    sequence_number: original,
                    reversal,
                });
            }
        }

        let tip_key = KeyPrefix::tip_key();
        let tip_raw = self.kv_store.get(&tip_key)?;
        let (tip_seq, sequence_number, prev_hash) = match tip_raw.as_deref() {
            None => (None, GENESIS_SEQUENCE, EntryHash::GENESIS),
            Some(raw) => {
                let tip_seq = decode_index(raw, "tip pointer")?;
                let tip = self.get_entry(tip_seq)?;
                (Some(tip_seq), tip_seq + 1, tip.hash)
            }
        };

        let from = candidate.from_account;
        let to = candidate.to_account;
        let transaction_id = candidate.transaction_id.clone();

        let mut entry = LedgerEntry::from_candidate(
            candidate,
            sequence_number,
            prev_hash,
            self.time_source.now(),
        );
        entry.hash = self.codec.hash_entry(&entry)?;
        let bytes = self.serializer.serialize(&entry)?;

        let mut preconditions = vec![
            match tip_raw {
                Some(raw) => Precondition::equals(tip_key.clone(), raw),
                None => Precondition::absent(tip_key.clone()),
            },
            Precondition::absent(tx_key.clone()),
        ];
        let mut operations = vec![
            BatchOperation::put(KeyPrefix::entry_key(sequence_number), bytes),
            BatchOperation::put(tx_key.clone(), encode_seq(sequence_number)),
            BatchOperation::put(KeyPrefix::account_key(from, sequence_number), Vec::new()),
            BatchOperation::put(tip_key, encode_seq(sequence_number)),
        ];
        if to != from {
            operations.push(BatchOperation::put(
                KeyPrefix::account_key(to, sequence_number),
                Vec::new(),
            ));
        }
        if let Some(original) = reverses {
            let key = KeyPrefix::reversal_key(original);
            preconditions.push(Precondition::absent(key.clone()));
            operations.push(BatchOperation::put(key, encode_seq(sequence_number)));
        }

        match self.kv_store.conditional_batch_write(preconditions, operations) {
            Ok(()) => {
                tracing::debug!(
                    sequence = sequence_number,
                    tx_id = %transaction_id,
                    hash = %entry.hash,
                    "[ledger] appended entry"
                );
                Ok(entry)
            }
            Err(KVStoreError::PreconditionFailed { index }) => match index {
                TIP_PRECONDITION => Err(ChainStoreError::ConcurrentModification {
                    expected: tip_seq,
                    found: self.tip_sequence()?,
                }),
                TRANSACTION_PRECONDITION => {
                    let existing = match self.kv_store.get(&tx_key)? {
                        Some(raw) => decode_index(&raw, "transaction index")?,
                        None => sequence_number,
                    };
                    Err(ChainStoreError::DuplicateTransaction {
                        transaction_id,
                        existing,
                    })
                }
                REVERSAL_PRECONDITION => {
                    let original = reverses.unwrap_or_default();
                    Err(ChainStoreError::ReversalExists {
                        sequence_number: original,
                        reversal: self.reversal_sequence(original)?.unwrap_or(sequence_number),
                    })
                }
                _ => Err(ChainStoreError::Storage(KVStoreError::PreconditionFailed { index })),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Sequence number of the chain tip, if any entry exists.
    pub fn tip_sequence(&self) -> Result<Option<SequenceNumber>, ChainStoreError> {
        match self.kv_store.get(&KeyPrefix::tip_key())? {
            Some(raw) => Ok(Some(decode_index(&raw, "tip pointer")?)),
            None => Ok(None),
        }
    }

    /// The most recently committed entry.
    pub fn get_tip(&self) -> Result<Option<LedgerEntry>, ChainStoreError> {
        match self.tip_sequence()? {
            Some(seq) => self.get_entry(seq).map(Some),
            None => Ok(None),
        }
    }

    /// The entry at `sequence_number`, if stored.
    pub fn read_entry(&self, sequence_number: SequenceNumber) -> Result<Option<LedgerEntry>, ChainStoreError> {
        match self.kv_store.get(&KeyPrefix::entry_key(sequence_number))? {
            Some(bytes) => Ok(Some(self.serializer.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The entry at `sequence_number`.
    pub fn get_entry(&self, sequence_number: SequenceNumber) -> Result<LedgerEntry, ChainStoreError> {
        self.read_entry(sequence_number)?
            .ok_or(ChainStoreError::EntryNotFound { sequence_number })
    }

    /// Entries in `[from, to]`, ascending, with `to` clamped to the tip.
    ///
    /// Fails with `Range` if `from > to` or an entry inside the range is
    /// missing.
    pub fn get_range(
        &self,
        from: SequenceNumber,
        to: SequenceNumber,
    ) -> Result<Vec<LedgerEntry>, ChainStoreError> {
        if from > to {
            return Err(ChainStoreError::Range {
                from,
                to,
                reason: "start is after end".to_string(),
            });
        }
        let Some(tip) = self.tip_sequence()? else {
            return Ok(Vec::new());
        };
        let end = to.min(tip);
        if from > end {
            return Ok(Vec::new());
        }

        let stored = self.scan_stored(from, end, usize::MAX)?;
        let mut expected = from;
        for (position, _) in &stored {
            if *position != expected {
                return Err(ChainStoreError::Range {
                    from,
                    to,
                    reason: format!("entry {} is missing", expected),
                });
            }
            expected += 1;
        }
        if expected <= end {
            return Err(ChainStoreError::Range {
                from,
                to,
                reason: format!("entry {} is missing", expected),
            });
        }
        Ok(stored.into_iter().map(|(_, entry)| entry).collect())
    }

    /// Up to `limit` stored entries in `[from, to]`, ascending.
    ///
    /// Missing entries are skipped rather than reported.
    pub fn scan_range(
        &self,
        from: SequenceNumber,
        to: SequenceNumber,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, ChainStoreError> {
        Ok(self
            .scan_stored(from, to, limit)?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect())
    }

    /// Like [`scan_range`](Self::scan_range), pairing each entry with the
    /// sequence number of the key it is stored under.
    pub fn scan_stored(
        &self,
        from: SequenceNumber,
        to: SequenceNumber,
        limit: usize,
    ) -> Result<Vec<(SequenceNumber, LedgerEntry)>, ChainStoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let start = KeyPrefix::entry_key(from);
        let end = match to.checked_add(1) {
            Some(next) => KeyPrefix::entry_key(next),
            None => prefix_upper_bound(KeyPrefix::Entry.as_bytes()).unwrap_or_default(),
        };

        let page = self.kv_store.range_scan(&start, &end, limit)?;
        tracing::debug!(from, to, found = page.len(), "[ledger] scanned entry page");

        let prefix_len = KeyPrefix::Entry.as_bytes().len();
        page.into_iter()
            .map(|(key, bytes)| {
                let position = decode_index(&key[prefix_len..], "entry key")?;
                Ok((position, self.serializer.deserialize(&bytes)?))
            })
            .collect()
    }

    pub fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<LedgerEntry>, ChainStoreError> {
        match self.kv_store.get(&KeyPrefix::transaction_key(transaction_id))? {
            Some(raw) => {
                let seq = decode_index(&raw, "transaction index")?;
                self.get_entry(seq).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Up to `limit` entries touching `account` with sequence numbers after
    /// `after`, ascending.
    pub fn account_entries(
        &self,
        account: AccountId,
        after: Option<SequenceNumber>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, ChainStoreError> {
        let prefix = KeyPrefix::account_prefix(account);
        let start = match after {
            Some(seq) => match seq.checked_add(1) {
                Some(next) => KeyPrefix::account_key(account, next),
                None => return Ok(Vec::new()),
            },
            None => prefix.clone(),
        };
        let end = prefix_upper_bound(&prefix).unwrap_or_default();

        self.kv_store
            .range_scan(&start, &end, limit)?
            .into_iter()
            .map(|(key, _)| {
                let seq = decode_index(&key[prefix.len()..], "account index")?;
                self.get_entry(seq)
            })
            .collect()
    }

    /// Set the external reference of the entry at `sequence_number`.
    ///
    /// Set-once: the same value again is a no-op, a different value fails
    /// with `ExternalReferenceConflict`.
    pub fn set_external_reference(
        &self,
        sequence_number: SequenceNumber,
        reference: &str,
    ) -> Result<LedgerEntry, ChainStoreError> {
        let key = KeyPrefix::entry_key(sequence_number);
        loop {
            let raw = self
                .kv_store
                .get(&key)?
                .ok_or(ChainStoreError::EntryNotFound { sequence_number })?;
            let mut entry = self.serializer.deserialize(&raw)?;

            match entry.external_reference.as_deref() {
                Some(existing) if existing == reference => return Ok(entry),
                Some(_) => return Err(ChainStoreError::ExternalReferenceConflict { sequence_number }),
                None => {}
            }

            entry.external_reference = Some(reference.to_string());
            let bytes = self.serializer.serialize(&entry)?;
            match self.kv_store.conditional_batch_write(
                vec![Precondition::equals(key.clone(), raw)],
                vec![BatchOperation::put(key.clone(), bytes)],
            ) {
                Ok(()) => return Ok(entry),
                // Entry changed underneath us; re-read and decide again.
                Err(KVStoreError::PreconditionFailed { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The compensating entry appended for `sequence_number`, if any.
    pub fn find_reversal(&self, sequence_number: SequenceNumber) -> Result<Option<LedgerEntry>, ChainStoreError> {
        match self.reversal_sequence(sequence_number)? {
            Some(seq) => self.get_entry(seq).map(Some),
            None => Ok(None),
        }
    }

    fn reversal_sequence(&self, original: SequenceNumber) -> Result<Option<SequenceNumber>, ChainStoreError> {
        match self.kv_store.get(&KeyPrefix::reversal_key(original))? {
            Some(raw) => Ok(Some(decode_index(&raw, "reversal index")?)),
            None => Ok(None),
        }
    }
}

fn check_transaction_id(transaction_id: &str) -> Result<(), EncodingError> {
    if transaction_id.is_empty() {
        return Err(EncodingError::EmptyTransactionId);
    }
    if transaction_id.len() > MAX_TRANSACTION_ID_LEN {
        return Err(EncodingError::FieldTooLong {
            field: "transaction_id",
            len: transaction_id.len(),
            max: MAX_TRANSACTION_ID_LEN,
        });
    }
    Ok(())
}

fn decode_index(raw: &[u8], what: &str) -> Result<SequenceNumber, ChainStoreError> {
    decode_seq(raw).ok_or_else(|| {
        ChainStoreError::Storage(KVStoreError::CorruptionError {
            message: format!("malformed {} value ({} bytes)", what, raw.len()),
        })
    })
}
