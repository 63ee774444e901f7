//! # Value Objects
//!
//! Configuration and key layout for the ledger chain.

use super::codec::MAX_TEXT_LEN;
use super::entry::{AccountId, SequenceNumber};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the ledger service.
///
/// All values have defaults suitable for a single-instance deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Attempts made after a `ConcurrentModification` before giving up.
    pub append_max_retries: u32,

    /// First backoff delay in milliseconds, doubled on each retry.
    pub append_backoff_base_ms: u64,

    /// Upper bound on a single backoff delay in milliseconds.
    pub append_backoff_max_ms: u64,

    /// Entries read per page by full-chain verification.
    pub verify_page_size: usize,

    /// Entries read per page by account history iteration.
    pub history_page_size: usize,

    /// Maximum length of `description` and `metadata` in bytes.
    pub max_text_len: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            append_max_retries: 5,
            append_backoff_base_ms: 5,
            append_backoff_max_ms: 200,
            verify_page_size: 256,
            history_page_size: 128,
            max_text_len: MAX_TEXT_LEN,
        }
    }
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_append_max_retries(mut self, retries: u32) -> Self {
        self.append_max_retries = retries;
        self
    }

    pub fn with_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.append_backoff_base_ms = base_ms;
        self.append_backoff_max_ms = max_ms;
        self
    }

    pub fn with_verify_page_size(mut self, size: usize) -> Self {
        self.verify_page_size = size.max(1);
        self
    }

    pub fn with_history_page_size(mut self, size: usize) -> Self {
        self.history_page_size = size.max(1);
        self
    }

    pub fn with_max_text_len(mut self, len: usize) -> Self {
        self.max_text_len = len;
        self
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self
            .append_backoff_base_ms
            .saturating_mul(factor)
            .min(self.append_backoff_max_ms);
        Duration::from_millis(ms)
    }
}

/// Key prefixes for the key-value store.
///
/// All keys are prefixed to namespace different data types. Integers are
/// big-endian so byte order equals numeric order.
#[derive(Debug, Clone, Copy)]
pub enum KeyPrefix {
    /// Entry data: `e:{seq}` -> LedgerEntry
    Entry,
    /// Transaction id index: `x:{transaction_id}` -> seq
    Transaction,
    /// Account index: `a:{account}{seq}` -> empty
    Account,
    /// Reversal index: `r:{original_seq}` -> reversal seq
    Reversal,
    /// Chain metadata: `m:tip` -> seq
    Meta,
}

impl KeyPrefix {
    /// Get the byte prefix for this key type.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Entry => b"e:",
            KeyPrefix::Transaction => b"x:",
            KeyPrefix::Account => b"a:",
            KeyPrefix::Reversal => b"r:",
            KeyPrefix::Meta => b"m:",
        }
    }

    /// Build a full key with the given suffix.
    pub fn key(&self, suffix: &[u8]) -> Vec<u8> {
        let mut key = self.as_bytes().to_vec();
        key.extend_from_slice(suffix);
        key
    }

    pub fn entry_key(seq: SequenceNumber) -> Vec<u8> {
        KeyPrefix::Entry.key(&seq.to_be_bytes())
    }

    pub fn transaction_key(transaction_id: &str) -> Vec<u8> {
        KeyPrefix::Transaction.key(transaction_id.as_bytes())
    }

    /// Prefix shared by every index key of `account`.
    pub fn account_prefix(account: AccountId) -> Vec<u8> {
        KeyPrefix::Account.key(&account.0.to_be_bytes())
    }

    pub fn account_key(account: AccountId, seq: SequenceNumber) -> Vec<u8> {
        let mut key = Self::account_prefix(account);
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    pub fn reversal_key(original: SequenceNumber) -> Vec<u8> {
        KeyPrefix::Reversal.key(&original.to_be_bytes())
    }

    pub fn tip_key() -> Vec<u8> {
        KeyPrefix::Meta.key(b"tip")
    }
}

/// Encode a sequence number as a stored value.
pub fn encode_seq(seq: SequenceNumber) -> Vec<u8> {
    seq.to_be_bytes().to_vec()
}

/// Decode a stored sequence number. Returns `None` for malformed values.
pub fn decode_seq(bytes: &[u8]) -> Option<SequenceNumber> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(SequenceNumber::from_be_bytes(arr))
}

/// Options for walking a range of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationMode {
    /// Stop at the first violation instead of collecting all of them.
    pub stop_on_first_error: bool,
}

impl Default for ValidationMode {
    fn default() -> Self {
        Self {
            stop_on_first_error: true,
        }
    }
}

impl ValidationMode {
    /// Collect every violation in the range.
    pub fn report_all() -> Self {
        Self {
            stop_on_first_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.append_max_retries, 5);
        assert_eq!(config.verify_page_size, 256);
        assert_eq!(config.max_text_len, MAX_TEXT_LEN);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = LedgerConfig::default().with_backoff(5, 30);
        assert_eq!(config.backoff_for(1), Duration::from_millis(5));
        assert_eq!(config.backoff_for(2), Duration::from_millis(10));
        assert_eq!(config.backoff_for(3), Duration::from_millis(20));
        assert_eq!(config.backoff_for(4), Duration::from_millis(30));
        assert_eq!(config.backoff_for(80), Duration::from_millis(30));
    }

    #[test]
    fn test_entry_keys_sort_by_sequence() {
        assert!(KeyPrefix::entry_key(2) < KeyPrefix::entry_key(10));
        assert!(KeyPrefix::entry_key(255) < KeyPrefix::entry_key(256));
    }

    #[test]
    fn test_account_keys_share_prefix() {
        let prefix = KeyPrefix::account_prefix(AccountId(9));
        assert!(KeyPrefix::account_key(AccountId(9), 3).starts_with(&prefix));
        assert!(!KeyPrefix::account_key(AccountId(10), 3).starts_with(&prefix));
    }

    #[test]
    fn test_seq_codec() {
        assert_eq!(decode_seq(&encode_seq(42)), Some(42));
        assert_eq!(decode_seq(b"short"), None);
    }

    #[test]
    fn test_config_deserializes_partial() {
        let config: LedgerConfig = serde_json::from_str(r#"{"verify_page_size": 10}"#).unwrap();
        assert_eq!(config.verify_page_size, 10);
        assert_eq!(config.append_max_retries, 5);
    }
}
