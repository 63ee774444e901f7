//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the ledger chain.
//!
//! These are the interfaces the host application implements. In-process
//! implementations live in `crate::adapters`.

use crate::domain::entry::{LedgerEntry, Timestamp};
use crate::domain::errors::{KVStoreError, SerializationError};
use std::sync::Arc;

/// Result of a scan: ordered `(key, value)` pairs.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Abstract interface for ordered key-value storage.
///
/// Implementations are shared between tasks, so every method takes `&self`
/// and the store provides its own synchronization. A reader never observes
/// half of a batch.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.conditional_batch_write(Vec::new(), operations)
    }

    /// Execute an atomic batch write guarded by preconditions.
    ///
    /// All preconditions are evaluated under the same exclusive section that
    /// applies the batch. If any does not hold, nothing is written and
    /// `KVStoreError::PreconditionFailed` names the first failing one.
    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError>;

    /// Ordered scan of keys in `[start, end)`, at most `limit` pairs.
    ///
    /// An empty `end` scans through the last key.
    fn range_scan(&self, start: &[u8], end: &[u8], limit: usize) -> Result<ScanResult, KVStoreError>;

    /// Ordered scan of every key starting with `prefix`.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        match prefix_upper_bound(prefix) {
            Some(end) => self.range_scan(prefix, &end, usize::MAX),
            None => Ok(self
                .range_scan(prefix, &[], usize::MAX)?
                .into_iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .collect()),
        }
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        (**self).get(key)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        (**self).exists(key)
    }

    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        (**self).conditional_batch_write(preconditions, operations)
    }

    fn range_scan(&self, start: &[u8], end: &[u8], limit: usize) -> Result<ScanResult, KVStoreError> {
        (**self).range_scan(start, end, limit)
    }
}

/// Smallest key greater than every key starting with `prefix`.
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xFF {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Expected state of a key at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub key: Vec<u8>,
    /// `None` means the key must be absent.
    pub expected: Option<Vec<u8>>,
}

impl Precondition {
    pub fn absent(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            expected: None,
        }
    }

    pub fn equals(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            expected: Some(value.into()),
        }
    }

    /// Whether `current` satisfies this precondition.
    pub fn holds(&self, current: Option<&[u8]>) -> bool {
        self.expected.as_deref() == current
    }
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in seconds since epoch.
    fn now(&self) -> Timestamp;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Abstract interface for entry serialization.
pub trait EntrySerializer: Send + Sync {
    /// Serialize a LedgerEntry to bytes.
    fn serialize(&self, entry: &LedgerEntry) -> Result<Vec<u8>, SerializationError>;

    /// Deserialize bytes to a LedgerEntry.
    fn deserialize(&self, data: &[u8]) -> Result<LedgerEntry, SerializationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_upper_bound() {
        assert_eq!(prefix_upper_bound(b"a:"), Some(b"a;".to_vec()));
        assert_eq!(prefix_upper_bound(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_upper_bound(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn test_precondition_holds() {
        assert!(Precondition::absent(b"k".to_vec()).holds(None));
        assert!(!Precondition::absent(b"k".to_vec()).holds(Some(b"v")));
        assert!(Precondition::equals(b"k".to_vec(), b"v".to_vec()).holds(Some(b"v")));
        assert!(!Precondition::equals(b"k".to_vec(), b"v".to_vec()).holds(None));
    }
}
