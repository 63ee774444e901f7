//! # Domain Layer
//!
//! Pure domain logic for the ledger chain. No I/O happens here.
//!
//! ## Modules
//!
//! - `entry` - Core entities (LedgerEntry, EntryCandidate, EntryHash)
//! - `codec` - Canonical encoding and SHA-256 digest
//! - `validator` - Linkage and digest verification
//! - `value_objects` - Configuration and key layout
//! - `errors` - Domain error types

pub mod codec;
pub mod entry;
pub mod errors;
pub mod validator;
pub mod value_objects;
