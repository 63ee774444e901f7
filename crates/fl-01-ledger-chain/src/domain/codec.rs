//! # Hash Codec
//!
//! Canonical byte encoding of ledger entries and their SHA-256 digest.
//!
//! ## Canonical Layout
//!
//! ```text
//! [tag_len:u32][tag]                 "farmlink/ledger-entry/v1"
//! [sequence_number:u64]
//! [from_account:u64]
//! [to_account:u64]
//! [amount:u64]                       minor units, checked non-negative
//! [status:u8]
//! [description_len:u32][description]
//! [metadata_len:u32][metadata]
//! [prev_hash:32]
//! ```
//!
//! All integers are big-endian. Variable-length fields are length-prefixed, so
//! no two distinct entries share an encoding.
//!
//! `transaction_id`, `external_reference` and `recorded_at` are not encoded.

use super::entry::{EntryHash, EntryStatus, LedgerEntry};
use super::errors::EncodingError;
use sha2::{Digest, Sha256};

/// Domain-separation tag prepended to every encoding.
pub const CANONICAL_TAG: &[u8] = b"farmlink/ledger-entry/v1";

/// Default upper bound on `description` and `metadata` lengths in bytes.
pub const MAX_TEXT_LEN: usize = 4096;

/// Stateless canonicalizer and hasher.
#[derive(Debug, Clone, Copy)]
pub struct HashCodec {
    max_text_len: usize,
}

impl Default for HashCodec {
    fn default() -> Self {
        Self::new(MAX_TEXT_LEN)
    }
}

impl HashCodec {
    pub fn new(max_text_len: usize) -> Self {
        Self { max_text_len }
    }

    /// Deterministic byte encoding of the hashed fields of `entry`.
    pub fn canonicalize(&self, entry: &LedgerEntry) -> Result<Vec<u8>, EncodingError> {
        if entry.amount < 0 {
            return Err(EncodingError::NegativeAmount {
                amount: entry.amount,
            });
        }
        if entry.status == EntryStatus::Pending {
            return Err(EncodingError::PendingStatus);
        }
        self.check_len("description", &entry.description)?;
        self.check_len("metadata", &entry.metadata)?;

        let mut out = Vec::with_capacity(
            4 + CANONICAL_TAG.len() + 8 * 4 + 1 + 8 + entry.description.len() + entry.metadata.len() + 32,
        );
        write_bytes(&mut out, CANONICAL_TAG);
        out.extend_from_slice(&entry.sequence_number.to_be_bytes());
        out.extend_from_slice(&entry.from_account.0.to_be_bytes());
        out.extend_from_slice(&entry.to_account.0.to_be_bytes());
        out.extend_from_slice(&(entry.amount as u64).to_be_bytes());
        out.push(entry.status.tag());
        write_bytes(&mut out, entry.description.as_bytes());
        write_bytes(&mut out, entry.metadata.as_bytes());
        out.extend_from_slice(entry.prev_hash.as_bytes());
        Ok(out)
    }

    /// SHA-256 of `bytes`.
    pub fn digest(&self, bytes: &[u8]) -> EntryHash {
        let result = Sha256::digest(bytes);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        EntryHash(hash)
    }

    /// Canonicalize and digest in one step.
    pub fn hash_entry(&self, entry: &LedgerEntry) -> Result<EntryHash, EncodingError> {
        let bytes = self.canonicalize(entry)?;
        Ok(self.digest(&bytes))
    }

    fn check_len(&self, field: &'static str, value: &str) -> Result<(), EncodingError> {
        if value.len() > self.max_text_len {
            return Err(EncodingError::FieldTooLong {
                field,
                len: value.len(),
                max: self.max_text_len,
            });
        }
        Ok(())
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    // check_len keeps every field well under u32::MAX
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}
