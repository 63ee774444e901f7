//! # FarmLink Ledger Chain (fl-01)
//!
//! Tamper-evident, append-only ledger of money movements between farmer and
//! buyer accounts. Every entry is linked to its predecessor by a SHA-256
//! digest, so any edit, deletion or reordering of stored entries is
//! detectable by re-walking the chain.
//!
//! ## Chain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Linkage | `prev_hash(n) == hash(n - 1)` |
//! | 2 | Determinism | Hash recomputes from the stored hashed fields |
//! | 3 | Immutability | Only `external_reference` changes after commit (set-once) |
//! | 4 | Contiguity | Sequence numbers start at 0 with no gaps |
//! | 5 | Genesis Sentinel | Only sequence 0 carries the all-zero `prev_hash` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Entities, canonical codec, validator, errors
//! - `ports/` - Port traits (inbound API, outbound SPI)
//! - `adapters/` - Storage, serializer, time, locking and API gateway adapters
//! - `service/` - Chain store and the application service implementing the API
//!
//! ## Usage
//!
//! ```ignore
//! use fl_01_ledger_chain::{AccountId, LedgerApi, LedgerConfig, LedgerService};
//!
//! let service = LedgerService::in_memory(LedgerConfig::default());
//!
//! service
//!     .record_transaction("tx-1", AccountId::SYSTEM, AccountId(7), 100, "harvest payout", "{}")
//!     .await?;
//!
//! assert_eq!(service.get_balance(AccountId(7))?, 100);
//! service.verify_integrity(None, None)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(test)]
mod test_utils;

// Re-export key types for convenience
pub use domain::codec::{HashCodec, CANONICAL_TAG, MAX_TEXT_LEN};
pub use domain::entry::{
    AccountId, EntryCandidate, EntryHash, EntryStatus, LedgerEntry, SequenceNumber, Timestamp,
    GENESIS_SEQUENCE,
};
pub use domain::errors::{
    ChainIntegrityViolation, ChainStoreError, EncodingError, KVStoreError, LedgerError,
    SerializationError, VerifyError, ViolationKind,
};
pub use domain::validator::{ChainCursor, ChainValidator, VerificationReport};
pub use domain::value_objects::{KeyPrefix, LedgerConfig, ValidationMode};
pub use ports::inbound::{LedgerApi, Recorded, TransferRequest};
pub use ports::outbound::{
    BatchOperation, EntrySerializer, KeyValueStore, Precondition, TimeSource,
};
pub use service::{AccountHistory, ChainStore, LedgerDependencies, LedgerService};
