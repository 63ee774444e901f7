//! # Ledger Entities
//!
//! Core entities of the hash-chained ledger.
//!
//! ## Chain Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Linkage | `prev_hash(n) == hash(n - 1)` for every n > 0 |
//! | Determinism | `hash(n)` is recomputable from the stored hashed fields |
//! | Contiguity | Sequence numbers start at 0 and have no gaps |
//! | Genesis sentinel | Only sequence 0 carries the all-zero `prev_hash` |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number of the genesis entry.
pub const GENESIS_SEQUENCE: u64 = 0;

/// Position of an entry in the chain.
pub type SequenceNumber = u64;

/// Timestamp in seconds since the Unix epoch.
pub type Timestamp = u64;

/// A 256-bit entry digest.
///
/// Rendered as lowercase hex everywhere it leaves the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EntryHash(pub [u8; 32]);

impl EntryHash {
    /// All-zero sentinel carried by the genesis entry as its `prev_hash`.
    pub const GENESIS: EntryHash = EntryHash([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_genesis_sentinel(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex digest.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(EntryHash(arr))
    }
}

impl fmt::Display for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryHash({}..)", &self.to_hex()[..12])
    }
}

/// Opaque account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl AccountId {
    /// Sentinel sender for credits and mints.
    pub const SYSTEM: AccountId = AccountId(0);

    pub fn is_system(&self) -> bool {
        *self == Self::SYSTEM
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_system() {
            write!(f, "system")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Settlement status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Candidate not yet placed on the chain.
    Pending,
    /// Settled movement of funds.
    Committed,
    /// Settled compensating entry that undoes an earlier movement.
    Reversed,
}

impl EntryStatus {
    /// Whether entries in this status count towards balances.
    pub fn is_settled(&self) -> bool {
        matches!(self, EntryStatus::Committed | EntryStatus::Reversed)
    }

    /// Single-byte tag used by the canonical encoding.
    pub fn tag(&self) -> u8 {
        match self {
            EntryStatus::Pending => 0,
            EntryStatus::Committed => 1,
            EntryStatus::Reversed => 2,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Committed => "committed",
            EntryStatus::Reversed => "reversed",
        };
        f.write_str(s)
    }
}

/// An entry that has not been placed on the chain yet.
///
/// The store assigns `sequence_number`, `prev_hash` and `hash` at append time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCandidate {
    pub transaction_id: String,
    pub from_account: AccountId,
    pub to_account: AccountId,
    /// Integer minor units.
    pub amount: i64,
    pub status: EntryStatus,
    pub description: String,
    pub metadata: String,
    /// Status the entry settles into once appended.
    pub settle_as: EntryStatus,
}

impl EntryCandidate {
    /// Create a pending transfer candidate that settles as `committed`.
    pub fn transfer(
        transaction_id: impl Into<String>,
        from_account: AccountId,
        to_account: AccountId,
        amount: i64,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            from_account,
            to_account,
            amount,
            status: EntryStatus::Pending,
            description: String::new(),
            metadata: String::new(),
            settle_as: EntryStatus::Committed,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Mark this candidate as a compensating entry.
    pub fn as_reversal(mut self) -> Self {
        self.settle_as = EntryStatus::Reversed;
        self
    }

    /// Whether `entry` records the same movement as this candidate.
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.transaction_id == entry.transaction_id
            && self.from_account == entry.from_account
            && self.to_account == entry.to_account
            && self.amount == entry.amount
            && self.settle_as == entry.status
            && self.description == entry.description
            && self.metadata == entry.metadata
    }
}

/// A committed entry of the ledger chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence_number: SequenceNumber,
    pub transaction_id: String,
    pub from_account: AccountId,
    pub to_account: AccountId,
    /// Integer minor units.
    pub amount: i64,
    pub status: EntryStatus,
    pub description: String,
    pub metadata: String,
    pub prev_hash: EntryHash,
    pub hash: EntryHash,
    /// External settlement identifier; not covered by `hash`.
    pub external_reference: Option<String>,
    /// When the entry was appended; not covered by `hash`.
    pub recorded_at: Timestamp,
}

impl LedgerEntry {
    /// Build an unhashed entry from a candidate at the given chain position.
    ///
    /// The caller computes and sets `hash` afterwards.
    pub fn from_candidate(
        candidate: EntryCandidate,
        sequence_number: SequenceNumber,
        prev_hash: EntryHash,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            sequence_number,
            transaction_id: candidate.transaction_id,
            from_account: candidate.from_account,
            to_account: candidate.to_account,
            amount: candidate.amount,
            status: candidate.settle_as,
            description: candidate.description,
            metadata: candidate.metadata,
            prev_hash,
            hash: EntryHash::default(),
            external_reference: None,
            recorded_at,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.sequence_number == GENESIS_SEQUENCE
    }

    /// Whether this entry moves funds into or out of `account`.
    pub fn touches(&self, account: AccountId) -> bool {
        self.from_account == account || self.to_account == account
    }

    /// Signed effect of this entry on `account`'s balance.
    pub fn balance_delta(&self, account: AccountId) -> i128 {
        if !self.status.is_settled() {
            return 0;
        }
        let amount = i128::from(self.amount);
        let mut delta = 0;
        if self.to_account == account {
            delta += amount;
        }
        if self.from_account == account {
            delta -= amount;
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_roundtrip() {
        let hash = EntryHash([0xAB; 32]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex, hex.to_lowercase());
        assert_eq!(EntryHash::from_hex(&hex), Some(hash));
        assert_eq!(EntryHash::from_hex("abcd"), None);
    }

    #[test]
    fn test_genesis_sentinel() {
        assert!(EntryHash::GENESIS.is_genesis_sentinel());
        assert!(!EntryHash([1; 32]).is_genesis_sentinel());
    }

    #[test]
    fn test_balance_delta() {
        let candidate = EntryCandidate::transfer("tx-1", AccountId(1), AccountId(2), 40);
        let entry = LedgerEntry::from_candidate(candidate, 0, EntryHash::GENESIS, 0);

        assert_eq!(entry.balance_delta(AccountId(1)), -40);
        assert_eq!(entry.balance_delta(AccountId(2)), 40);
        assert_eq!(entry.balance_delta(AccountId(3)), 0);
    }

    #[test]
    fn test_candidate_settles_as_committed() {
        let candidate = EntryCandidate::transfer("tx-1", AccountId::SYSTEM, AccountId(7), 10);
        assert_eq!(candidate.status, EntryStatus::Pending);

        let entry = LedgerEntry::from_candidate(candidate.clone(), 3, EntryHash([9; 32]), 5);
        assert_eq!(entry.status, EntryStatus::Committed);
        assert!(candidate.matches(&entry));
        assert!(!candidate.as_reversal().matches(&entry));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(EntryStatus::Reversed.to_string(), "reversed");
        assert_eq!(AccountId::SYSTEM.to_string(), "system");
        assert_eq!(AccountId(42).to_string(), "42");
    }
}
