use crate::domain::entry::LedgerEntry;
use crate::domain::errors::SerializationError;
use crate::ports::outbound::EntrySerializer;

/// Default entry serializer using bincode.
///
/// This is the storage format only. Entry hashes are computed over the
/// canonical encoding, never over these bytes.
#[derive(Default)]
pub struct BincodeEntrySerializer;

impl EntrySerializer for BincodeEntrySerializer {
    fn serialize(&self, entry: &LedgerEntry) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(entry).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }

    fn deserialize(&self, data: &[u8]) -> Result<LedgerEntry, SerializationError> {
        bincode::deserialize(data).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_chain;

    #[test]
    fn test_stored_entry_keeps_unhashed_fields() {
        let mut entry = make_chain(1).remove(0);
        entry.external_reference = Some("mpesa:QK81".into());
        entry.recorded_at = 1_700_000_123;

        let serializer = BincodeEntrySerializer;
        let bytes = serializer.serialize(&entry).unwrap();
        assert_eq!(serializer.deserialize(&bytes).unwrap(), entry);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = BincodeEntrySerializer.deserialize(&[0xFF, 0x01]);
        assert!(result.is_err());
    }
}
