//! Serializer Adapters
//!
//! Implementations of the `EntrySerializer` trait.

mod bincode;

pub use self::bincode::BincodeEntrySerializer;
