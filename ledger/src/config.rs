//! Top-level configuration for a ledger node.
//!
//! This module aggregates configuration for:
//!
//! - consensus parameters (`ConsensusConfig`),
//! - snapshot storage (file path and enable flag).
//!
//! The goal is to have a single `LedgerConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults or a JSON file.
//! Every field has a default, so a config file only lists what it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consensus::ConsensusConfig;

/// Configuration for chain snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON snapshot file.
    pub path: PathBuf,
    /// When `false` the node keeps its chain in memory only.
    pub enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/chain.json"),
            enabled: true,
        }
    }
}

/// Failure to read a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Top-level configuration for a ledger node.
///
/// - consensus tuning (`consensus`),
/// - snapshot storage (`storage`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub consensus: ConsensusConfig,
    pub storage: StorageConfig,
}

impl LedgerConfig {
    /// Reads a JSON config file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::config::PolicyConfig;
    use crate::types::Amount;
    use tempfile::TempDir;

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("ledger.json");
        std::fs::write(
            &path,
            r#"{ "consensus": { "policy": { "kind": "proof_of_stake" }, "minimum_fee": 5 } }"#,
        )
        .expect("write config");

        let cfg = LedgerConfig::load(&path).expect("load");
        assert_eq!(cfg.consensus.policy, PolicyConfig::ProofOfStake);
        assert_eq!(cfg.consensus.minimum_fee, Amount(5));
        assert_eq!(cfg.consensus.block_reward, Amount::coins(5));
        assert_eq!(cfg.storage, StorageConfig::default());
    }

    #[test]
    fn missing_and_malformed_files_are_reported() {
        let tmp = TempDir::new().expect("create temp dir");
        let missing = tmp.path().join("absent.json");
        assert!(matches!(
            LedgerConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "not json").expect("write config");
        assert!(matches!(
            LedgerConfig::load(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }
}
