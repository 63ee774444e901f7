use crate::adapters::{BincodeEntrySerializer, InMemoryKVStore};
use crate::domain::codec::HashCodec;
use crate::domain::entry::{AccountId, EntryCandidate, EntryHash, LedgerEntry};
use crate::domain::errors::KVStoreError;
use crate::domain::value_objects::KeyPrefix;
use crate::ports::outbound::{BatchOperation, EntrySerializer, KeyValueStore, Precondition, ScanResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const ALICE: AccountId = AccountId(1);
pub const BOB: AccountId = AccountId(2);
pub const CAROL: AccountId = AccountId(3);

pub fn make_candidate(n: u64) -> EntryCandidate {
    EntryCandidate::transfer(
        format!("tx-{}", n),
        AccountId::SYSTEM,
        AccountId(1 + n % 3),
        100 + n as i64,
    )
    .with_description(format!("harvest payout {}", n))
    .with_metadata(r#"{"farm":"green-acres"}"#)
}

/// Build a correctly linked chain of `len` entries starting at genesis.
pub fn make_chain(len: u64) -> Vec<LedgerEntry> {
    let codec = HashCodec::default();
    let mut prev_hash = EntryHash::GENESIS;
    let mut chain = Vec::with_capacity(len as usize);

    for seq in 0..len {
        let mut entry = LedgerEntry::from_candidate(make_candidate(seq), seq, prev_hash, 1000 + seq);
        entry.hash = codec.hash_entry(&entry).unwrap();
        prev_hash = entry.hash;
        chain.push(entry);
    }
    chain
}

/// Store wrapper that injects faults into an in-memory store.
#[derive(Default)]
pub struct FaultyKVStore {
    pub inner: InMemoryKVStore,
    /// Remaining conditional writes to reject as if the tip had moved.
    pub lost_races: AtomicUsize,
    /// Fail every read with an I/O error.
    pub fail_reads: AtomicBool,
}

impl FaultyKVStore {
    pub fn losing_races(count: usize) -> Self {
        Self {
            lost_races: AtomicUsize::new(count),
            ..Self::default()
        }
    }

    fn check_reads(&self) -> Result<(), KVStoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(KVStoreError::IOError {
                message: "injected read failure".to_string(),
            });
        }
        Ok(())
    }
}

impl KeyValueStore for FaultyKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.check_reads()?;
        self.inner.get(key)
    }

    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        let lost = self
            .lost_races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost && !preconditions.is_empty() {
            return Err(KVStoreError::PreconditionFailed { index: 0 });
        }
        self.inner.conditional_batch_write(preconditions, operations)
    }

    fn range_scan(&self, start: &[u8], end: &[u8], limit: usize) -> Result<ScanResult, KVStoreError> {
        self.check_reads()?;
        self.inner.range_scan(start, end, limit)
    }
}

/// Overwrite the stored entry at `seq` with `mutate` applied, bypassing the chain store.
pub fn tamper_entry<KV: KeyValueStore>(kv: &KV, seq: u64, mutate: impl FnOnce(&mut LedgerEntry)) {
    let key = KeyPrefix::entry_key(seq);
    let bytes = kv.get(&key).unwrap().expect("entry stored");
    let mut entry = BincodeEntrySerializer.deserialize(&bytes).unwrap();
    mutate(&mut entry);
    let bytes = BincodeEntrySerializer.serialize(&entry).unwrap();
    kv.atomic_batch_write(vec![BatchOperation::put(key, bytes)]).unwrap();
}

/// Remove the stored entry at `seq`, bypassing the chain store.
pub fn delete_entry<KV: KeyValueStore>(kv: &KV, seq: u64) {
    kv.atomic_batch_write(vec![BatchOperation::delete(KeyPrefix::entry_key(seq))])
        .unwrap();
}
