//! # FarmLink Ledger Node
//!
//! Library half of the `fl-node` binary, exposed for integration tests.
//!
//! - `config` - `FL_*` environment configuration
//! - `command` - Command-line parsing
//! - `runtime` - Data directory lock, ledger file and command execution

pub mod command;
pub mod config;
pub mod runtime;

pub use command::{Cli, Command};
pub use config::{ConfigError, NodeConfig};
pub use runtime::{LedgerNode, NodeLedger};
