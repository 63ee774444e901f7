//! # Data Directory Locking
//!
//! Prevents two processes from appending to the same ledger file.

mod flock;

pub use flock::{DatabaseLock, LockError};
