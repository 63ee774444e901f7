//! Infrastructure Adapters
//!
//! Implementations of infrastructure traits.

mod time;

pub use time::{ManualTimeSource, SystemTimeSource};
