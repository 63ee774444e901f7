use super::memory::{apply_conditional, scan};
use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore, Precondition, ScanResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File-backed key-value store.
///
/// Keeps the full map in memory and rewrites a snapshot file on every batch.
/// A batch is only visible to readers once its snapshot has been renamed into
/// place, so a failed write leaves both memory and disk unchanged.
pub struct FileBackedKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    path: PathBuf,
}

fn io_err(e: std::io::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: e.to_string(),
    }
}

impl FileBackedKVStore {
    /// Open the store at `path`, loading any existing snapshot.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();

        let data = match std::fs::read(&path) {
            Ok(bytes) => {
                let data = Self::decode(&bytes)?;
                tracing::info!(
                    "[ledger] 💾 Loaded {} keys from {} ({} bytes)",
                    data.len(),
                    path.display(),
                    bytes.len()
                );
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("[ledger] 📁 No existing storage file at {}", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(io_err(e)),
        };

        Ok(Self {
            data: RwLock::new(data),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Format: [key_len:u32][key][value_len:u32][value]...
    fn decode(bytes: &[u8]) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, KVStoreError> {
        fn take<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], KVStoreError> {
            let end = cursor
                .checked_add(len)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| KVStoreError::CorruptionError {
                    message: format!("truncated record at offset {}", cursor),
                })?;
            let slice = &bytes[*cursor..end];
            *cursor = end;
            Ok(slice)
        }

        fn take_len(bytes: &[u8], cursor: &mut usize) -> Result<usize, KVStoreError> {
            let raw = take(bytes, cursor, 4)?;
            let mut arr = [0u8; 4];
            arr.copy_from_slice(raw);
            Ok(u32::from_le_bytes(arr) as usize)
        }

        let mut data = BTreeMap::new();
        let mut cursor = 0;
        while cursor < bytes.len() {
            let key_len = take_len(bytes, &mut cursor)?;
            let key = take(bytes, &mut cursor, key_len)?.to_vec();
            let value_len = take_len(bytes, &mut cursor)?;
            let value = take(bytes, &mut cursor, value_len)?.to_vec();
            data.insert(key, value);
        }
        Ok(data)
    }

    fn save_to_file(&self, data: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<(), KVStoreError> {
        use std::io::Write;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut bytes = Vec::new();
        for (key, value) in data {
            bytes.extend_from_slice(&(key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
            bytes.extend_from_slice(value);
        }

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_err)?;

        Ok(())
    }
}

impl KeyValueStore for FileBackedKVStore {
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
        let mut next = data.clone();
        apply_conditional(&mut next, &preconditions, operations)?;
        if let Err(e) = self.save_to_file(&next) {
            tracing::error!("[ledger] ❌ Failed to persist {}: {}", self.path.display(), e);
            return Err(e);
        }
        *data = next;
        Ok(())
    }

    fn range_scan(&self, start: &[u8], end: &[u8], limit: usize) -> Result<ScanResult, KVStoreError> {
        Ok(scan(&self.data.read(), start, end, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reopen_sees_committed_batches() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let store = FileBackedKVStore::open(&path).unwrap();
            store
                .atomic_batch_write(vec![
                    BatchOperation::put(b"e:1".to_vec(), b"one".to_vec()),
                    BatchOperation::put(b"e:2".to_vec(), b"two".to_vec()),
                ])
                .unwrap();
            store
                .atomic_batch_write(vec![BatchOperation::delete(b"e:1".to_vec())])
                .unwrap();
        }

        let store = FileBackedKVStore::open(&path).unwrap();
        assert_eq!(store.get(b"e:1").unwrap(), None);
        assert_eq!(store.get(b"e:2").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn test_failed_precondition_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        let store = FileBackedKVStore::open(&path).unwrap();

        store
            .atomic_batch_write(vec![BatchOperation::put(b"m:tip".to_vec(), b"a".to_vec())])
            .unwrap();
        let before = std::fs::read(&path).unwrap();

        let result = store.conditional_batch_write(
            vec![Precondition::absent(b"m:tip".to_vec())],
            vec![BatchOperation::put(b"m:tip".to_vec(), b"b".to_vec())],
        );
        assert!(matches!(result, Err(KVStoreError::PreconditionFailed { index: 0 })));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_truncated_file_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        std::fs::write(&path, [5u8, 0, 0, 0, b'a']).unwrap();

        let result = FileBackedKVStore::open(&path);
        assert!(matches!(result, Err(KVStoreError::CorruptionError { .. })));
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileBackedKVStore::open(dir.path().join("nested").join("ledger.db")).unwrap();
        assert!(store.prefix_scan(b"").unwrap().is_empty());

        store
            .atomic_batch_write(vec![BatchOperation::put(b"k".to_vec(), b"v".to_vec())])
            .unwrap();
        assert!(store.path().exists());
    }
}
