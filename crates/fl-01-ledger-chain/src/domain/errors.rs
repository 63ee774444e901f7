//! # Domain Errors
//!
//! Error types for the ledger chain.
//!
//! - `EncodingError` is local and never retried.
//! - `ChainStoreError::ConcurrentModification` is transient; callers retry.
//! - `ChainIntegrityViolation` is a fatal data-integrity event. It is reported,
//!   never repaired.
//! - Storage faults propagate unmodified.

use super::entry::SequenceNumber;
use std::fmt;
use thiserror::Error;

/// A field of an entry lies outside its declared domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("amount must be non-negative, got {amount}")]
    NegativeAmount { amount: i64 },

    #[error("pending entries cannot be encoded for the chain")]
    PendingStatus,

    #[error("{field} is {len} bytes, max {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("transaction id must not be empty")]
    EmptyTransactionId,
}

/// Kind of integrity violation found while walking the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    /// `prev_hash` does not match the predecessor's `hash`.
    BrokenLink,
    /// Recomputed hash differs from the stored one.
    TamperedHash,
    /// Sequence numbers skip or repeat.
    SequenceGap,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::BrokenLink => "brokenLink",
            ViolationKind::TamperedHash => "tamperedHash",
            ViolationKind::SequenceGap => "sequenceGap",
        };
        f.write_str(s)
    }
}

/// A broken chain invariant at a specific sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("chain integrity violation ({kind}) at sequence {sequence_number}: {details}")]
pub struct ChainIntegrityViolation {
    pub sequence_number: SequenceNumber,
    pub kind: ViolationKind,
    pub details: String,
}

impl ChainIntegrityViolation {
    pub fn new(sequence_number: SequenceNumber, kind: ViolationKind, details: impl Into<String>) -> Self {
        Self {
            sequence_number,
            kind,
            details: details.into(),
        }
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    /// A conditional batch precondition did not hold.
    ///
    /// `index` points into the precondition list passed to the store.
    #[error("KV store precondition {index} failed")]
    PreconditionFailed { index: usize },
}

/// Serialization errors.
#[derive(Debug, Clone, Error)]
#[error("Serialization error: {message}")]
pub struct SerializationError {
    pub message: String,
}

/// Errors raised by the chain store.
#[derive(Debug, Clone, Error)]
pub enum ChainStoreError {
    #[error("transaction {transaction_id} already recorded at sequence {existing}")]
    DuplicateTransaction {
        transaction_id: String,
        existing: SequenceNumber,
    },

    #[error("chain tip moved during append (expected {expected:?}, found {found:?})")]
    ConcurrentModification {
        expected: Option<SequenceNumber>,
        found: Option<SequenceNumber>,
    },

    #[error("invalid range {from}..={to}: {reason}")]
    Range {
        from: SequenceNumber,
        to: SequenceNumber,
        reason: String,
    },

    #[error("no entry at sequence {sequence_number}")]
    EntryNotFound { sequence_number: SequenceNumber },

    #[error("external reference already set on sequence {sequence_number}")]
    ExternalReferenceConflict { sequence_number: SequenceNumber },

    #[error("sequence {sequence_number} already reversed at sequence {reversal}")]
    ReversalExists {
        sequence_number: SequenceNumber,
        reversal: SequenceNumber,
    },

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("storage failure: {0}")]
    Storage(#[from] KVStoreError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl ChainStoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainStoreError::ConcurrentModification { .. })
    }
}

/// Errors surfaced by the ledger service.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {amount}")]
    InvalidAmount { amount: i64 },

    #[error("sender and receiver are both account {account}")]
    SelfTransfer { account: u64 },

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The transaction id is already recorded with different contents.
    #[error("transaction {transaction_id} already recorded with different contents")]
    TransactionConflict { transaction_id: String },

    /// Appends kept racing other writers; safe to retry later.
    #[error("append gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: ChainStoreError,
    },

    #[error("transaction {transaction_id} not found")]
    TransactionNotFound { transaction_id: String },

    #[error("transaction {transaction_id} already reversed by {reversal_id}")]
    AlreadyReversed {
        transaction_id: String,
        reversal_id: String,
    },

    #[error("transaction {transaction_id} is itself a reversal")]
    CannotReverseReversal { transaction_id: String },

    #[error("external reference already set on transaction {transaction_id}")]
    ExternalReferenceConflict { transaction_id: String },

    #[error(transparent)]
    Store(ChainStoreError),
}

impl LedgerError {
    /// Whether the caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::RetriesExhausted { .. })
    }
}

impl From<ChainStoreError> for LedgerError {
    fn from(err: ChainStoreError) -> Self {
        match err {
            ChainStoreError::Encoding(e) => LedgerError::Encoding(e),
            other => LedgerError::Store(other),
        }
    }
}

/// Errors surfaced by integrity verification.
#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Violation(#[from] ChainIntegrityViolation),

    #[error("verification cancelled after {entries_checked} entries")]
    Cancelled { entries_checked: u64 },

    #[error(transparent)]
    Store(#[from] ChainStoreError),
}
