//! # Ports Layer
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving ports (API exposed to the application)
//! - `outbound.rs` - Driven ports (dependencies required by the service)

pub mod inbound;
pub mod outbound;

pub use inbound::{LedgerApi, Recorded, TransferRequest};
pub use outbound::{BatchOperation, EntrySerializer, KeyValueStore, Precondition, TimeSource};
