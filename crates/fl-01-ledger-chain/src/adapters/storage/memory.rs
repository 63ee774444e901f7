use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore, Precondition, ScanResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// In-memory ordered key-value store.
///
/// Batches are applied under one write lock, so readers see either none or
/// all of a batch.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

/// Check preconditions and apply a batch to an already-locked map.
pub(crate) fn apply_conditional(
    data: &mut BTreeMap<Vec<u8>, Vec<u8>>,
    preconditions: &[Precondition],
    operations: Vec<BatchOperation>,
) -> Result<(), KVStoreError> {
    for (index, pre) in preconditions.iter().enumerate() {
        if !pre.holds(data.get(&pre.key).map(Vec::as_slice)) {
            return Err(KVStoreError::PreconditionFailed { index });
        }
    }
    for op in operations {
        match op {
            BatchOperation::Put { key, value } => {
                data.insert(key, value);
            }
            BatchOperation::Delete { key } => {
                data.remove(&key);
            }
        }
    }
    Ok(())
}

/// Ordered scan over an already-locked map.
pub(crate) fn scan(
    data: &BTreeMap<Vec<u8>, Vec<u8>>,
    start: &[u8],
    end: &[u8],
    limit: usize,
) -> ScanResult {
    let upper = if end.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Excluded(end.to_vec())
    };
    data.range((Bound::Included(start.to_vec()), upper))
        .take(limit)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        let mut data = self.data.write();
        apply_conditional(&mut data, &preconditions, operations)
    }

    fn range_scan(&self, start: &[u8], end: &[u8], limit: usize) -> Result<ScanResult, KVStoreError> {
        Ok(scan(&self.data.read(), start, end, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_kv_store() {
        let store = InMemoryKVStore::new();

        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"key1".to_vec(), b"value1".to_vec()),
                BatchOperation::put(b"key2".to_vec(), b"value2".to_vec()),
            ])
            .unwrap();

        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get(b"key2").unwrap(), Some(b"value2".to_vec()));
        assert_eq!(store.get(b"key3").unwrap(), None);

        assert!(store.exists(b"key1").unwrap());
        assert!(!store.exists(b"key3").unwrap());
    }

    #[test]
    fn test_failed_precondition_writes_nothing() {
        let store = InMemoryKVStore::new();
        store
            .atomic_batch_write(vec![BatchOperation::put(b"tip".to_vec(), b"1".to_vec())])
            .unwrap();

        let result = store.conditional_batch_write(
            vec![
                Precondition::absent(b"x:tx".to_vec()),
                Precondition::equals(b"tip".to_vec(), b"0".to_vec()),
            ],
            vec![
                BatchOperation::put(b"tip".to_vec(), b"2".to_vec()),
                BatchOperation::put(b"x:tx".to_vec(), b"2".to_vec()),
            ],
        );

        assert!(matches!(result, Err(KVStoreError::PreconditionFailed { index: 1 })));
        assert_eq!(store.get(b"tip").unwrap(), Some(b"1".to_vec()));
        assert!(!store.exists(b"x:tx").unwrap());
    }

    #[test]
    fn test_range_scan_is_ordered_and_limited() {
        let store = InMemoryKVStore::new();
        let ops = (0u8..10)
            .rev()
            .map(|i| BatchOperation::put(vec![b'e', i], vec![i]))
            .collect();
        store.atomic_batch_write(ops).unwrap();

        let page = store.range_scan(&[b'e', 2], &[b'e', 8], 3).unwrap();
        let keys: Vec<u8> = page.iter().map(|(k, _)| k[1]).collect();
        assert_eq!(keys, vec![2, 3, 4]);

        let tail = store.range_scan(&[b'e', 7], &[], usize::MAX).unwrap();
        assert_eq!(tail.len(), 3);
    }

    #[test]
    fn test_prefix_scan() {
        let store = InMemoryKVStore::new();
        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"a:1".to_vec(), b"data1".to_vec()),
                BatchOperation::put(b"a:2".to_vec(), b"data2".to_vec()),
                BatchOperation::put(b"e:1".to_vec(), b"hash1".to_vec()),
            ])
            .unwrap();

        assert_eq!(store.prefix_scan(b"a:").unwrap().len(), 2);
        assert_eq!(store.prefix_scan(b"e:").unwrap().len(), 1);
    }
}
