//! # Node Configuration
//!
//! Runtime configuration for the ledger node, overridable from `FL_*`
//! environment variables.

use fl_01_ledger_chain::LedgerConfig;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Directory holding the ledger file and its lock.
    pub data_dir: PathBuf,
    /// Ledger service configuration.
    pub ledger: LedgerConfig,
    /// `tracing` filter directive.
    pub log_filter: String,
    /// How long to wait for another process to release the data directory.
    pub lock_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            ledger: LedgerConfig::default(),
            log_filter: "info".to_string(),
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl NodeConfig {
    /// Path of the ledger file inside `data_dir`.
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.db")
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Unset variables keep their defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = NodeConfig::default();

        if let Some(dir) = lookup("FL_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup("FL_LOG") {
            config.log_filter = filter;
        }
        if let Some(v) = lookup("FL_APPEND_MAX_RETRIES") {
            config.ledger.append_max_retries = parse_var("FL_APPEND_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("FL_VERIFY_PAGE_SIZE") {
            let size: usize = parse_var("FL_VERIFY_PAGE_SIZE", &v)?;
            if size == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "FL_VERIFY_PAGE_SIZE",
                    value: v,
                });
            }
            config.ledger.verify_page_size = size;
        }
        if let Some(v) = lookup("FL_HISTORY_PAGE_SIZE") {
            let size: usize = parse_var("FL_HISTORY_PAGE_SIZE", &v)?;
            config.ledger = config.ledger.with_history_page_size(size);
        }
        if let Some(v) = lookup("FL_LOCK_TIMEOUT_MS") {
            config.lock_timeout = Duration::from_millis(parse_var("FL_LOCK_TIMEOUT_MS", &v)?);
        }

        Ok(config)
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = NodeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.ledger_path(), PathBuf::from("./data/ledger/ledger.db"));
    }

    #[test]
    fn test_overrides_from_env() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("FL_DATA_DIR", "/var/lib/farmlink"),
            ("FL_APPEND_MAX_RETRIES", "9"),
            ("FL_VERIFY_PAGE_SIZE", "64"),
            ("FL_LOG", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/farmlink"));
        assert_eq!(config.ledger.append_max_retries, 9);
        assert_eq!(config.ledger.verify_page_size, 64);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let err = NodeConfig::from_lookup(lookup(&[("FL_APPEND_MAX_RETRIES", "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "FL_APPEND_MAX_RETRIES",
                value: "many".to_string()
            }
        );

        assert!(NodeConfig::from_lookup(lookup(&[("FL_VERIFY_PAGE_SIZE", "0")])).is_err());
    }
}
