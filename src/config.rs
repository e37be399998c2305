//! Signer configuration
//!
//! Read from `~/.starknet-ledger/config.json`, then overridden by
//! `STARKNET_LEDGER_PATH` / `STARKNET_LEDGER_CHAIN_ID`. A missing file means
//! defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::derivation_path::DerivationPath;
use crate::errors::{LedgerError, Result};
use crate::signer::ChainId;

pub const DEFAULT_DERIVATION_PATH: &str = "m/2645'/1195502025'/1470455285'/0'/0'/0";
pub const ENV_DERIVATION_PATH: &str = "STARKNET_LEDGER_PATH";
pub const ENV_CHAIN_ID: &str = "STARKNET_LEDGER_CHAIN_ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    pub derivation_path: String,
    pub chain_id: String,
    /// HID path of the device; the first Ledger found when unset
    pub device_path: Option<String>,
    /// Signing waits for a button press, so this is generous
    pub read_timeout_ms: u64,
    pub min_app_version: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            derivation_path: DEFAULT_DERIVATION_PATH.to_string(),
            chain_id: ChainId::SEPOLIA.to_string(),
            device_path: None,
            read_timeout_ms: 30_000,
            min_app_version: "1.1.0".to_string(),
        }
    }
}

impl SignerConfig {
    /// Load from `path`, or from the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => get_config_path(),
        };
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Apply environment-style overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DERIVATION_PATH) {
            self.derivation_path = path;
        }
        if let Some(chain_id) = lookup(ENV_CHAIN_ID) {
            self.chain_id = chain_id;
        }
    }

    /// Parse the path and chain id, failing on the first invalid one
    pub fn validate(&self) -> Result<(DerivationPath, ChainId)> {
        let path = DerivationPath::parse(&self.derivation_path)?;
        let chain_id = self.chain_id.parse()?;
        semver::Version::parse(&self.min_app_version)
            .map_err(|e| LedgerError::Config(format!("invalid min_app_version: {}", e)))?;
        Ok((path, chain_id))
    }
}

/// Get the default config path
pub fn get_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".starknet-ledger")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SignerConfig::from_file(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, SignerConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, r#"{"chain_id": "SN_MAIN", "read_timeout_ms": 5000}"#).unwrap();

        let config = SignerConfig::from_file(&file).unwrap();
        assert_eq!(config.chain_id, "SN_MAIN");
        assert_eq!(config.read_timeout_ms, 5000);
        assert_eq!(config.derivation_path, DEFAULT_DERIVATION_PATH);
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, "{not json").unwrap();
        assert!(matches!(SignerConfig::from_file(&file), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let mut config = SignerConfig::default();
        config.apply_overrides(|key| match key {
            ENV_CHAIN_ID => Some("mainnet".to_string()),
            _ => None,
        });
        assert_eq!(config.chain_id, "mainnet");
        assert_eq!(config.derivation_path, DEFAULT_DERIVATION_PATH);
    }

    #[test]
    fn test_validate() {
        let (path, chain_id) = SignerConfig::default().validate().unwrap();
        assert_eq!(path.to_string(), DEFAULT_DERIVATION_PATH);
        assert_eq!(chain_id, ChainId::sepolia());

        let config = SignerConfig {
            derivation_path: "m/44'/0'/0'/0/0/0".to_string(),
            ..SignerConfig::default()
        };
        assert!(matches!(config.validate(), Err(LedgerError::InvalidDerivationPath(_))));
    }
}
