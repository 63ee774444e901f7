//! # Adapters Module
//!
//! Contains adapter implementations for the ledger chain.
//!
//! ## Modules
//!
//! - `storage`: In-memory and file-backed key-value stores
//! - `serializer`: bincode storage format for entries
//! - `infra`: Time sources
//! - `lock`: Data directory locking (singleton guard)
//! - `api_handler`: HTTP-style gateway responses

#[cfg(feature = "api")]
pub mod api_handler;
pub mod infra;
#[cfg(feature = "locking")]
pub mod lock;
pub mod serializer;
pub mod storage;

#[cfg(feature = "api")]
pub use api_handler::{handle_api_query, ApiGatewayHandler, ApiQueryError, ApiResponse, EntryView};
pub use infra::{ManualTimeSource, SystemTimeSource};
#[cfg(feature = "locking")]
pub use lock::{DatabaseLock, LockError};
pub use serializer::BincodeEntrySerializer;
pub use storage::{FileBackedKVStore, InMemoryKVStore};
