//! Configuration for the wallet engine and its host

pub mod network;
pub mod rpc;

use crate::wallet::{KdfParams, DEFAULT_DERIVATION_PATH};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub use network::{NetworkModel, NetworkPreference, Networks, DEFAULT_NETWORK_KEY};
pub use rpc::RpcConfig;

/// Main configuration, loaded from a JSON file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deadline for each JSON-RPC request (milliseconds)
    pub rpc_timeout_ms: u64,
    /// BIP-32 path used for generated and mnemonic-imported accounts
    pub derivation_path: String,
    /// KDF used when exporting keystores
    pub keystore_kdf: KdfParams,
    /// RPC URL overrides by chain id, applied over the environment
    pub rpc_urls: HashMap<u64, String>,
    /// Where the selected network is persisted
    pub preference_path: String,
    /// Path to audit log file
    pub audit_log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 30_000,
            derivation_path: DEFAULT_DERIVATION_PATH.to_string(),
            keystore_kdf: KdfParams::default(),
            rpc_urls: HashMap::new(),
            preference_path: "network.json".to_string(),
            audit_log_path: None,
        }
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_timeout_ms == 0 {
            return Err(Error::Config("rpc_timeout_ms must be positive".to_string()));
        }
        if !self.derivation_path.starts_with("m/") {
            return Err(Error::Config(format!(
                "derivation_path '{}' must start with m/",
                self.derivation_path
            )));
        }
        match self.keystore_kdf {
            KdfParams::Scrypt { log_n, r, p } if log_n == 0 || log_n > 20 || r == 0 || p == 0 => {
                return Err(Error::Config("keystore scrypt parameters out of range".to_string()));
            }
            KdfParams::Pbkdf2 { c } if c == 0 => {
                return Err(Error::Config("keystore pbkdf2 rounds must be positive".to_string()));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Environment-derived RPC URLs with this file's overrides on top
    pub fn rpc_config(&self) -> RpcConfig {
        self.rpc_config_with(RpcConfig::from_env())
    }

    fn rpc_config_with(&self, base: RpcConfig) -> RpcConfig {
        let mut urls: HashMap<u64, String> = [rpc::chains::MAINNET, rpc::chains::SEPOLIA]
            .into_iter()
            .filter_map(|id| base.get(id).map(|url| (id, url.to_string())))
            .collect();
        urls.extend(self.rpc_urls.clone());
        RpcConfig::with_urls(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_gives_defaults() {
        let parsed: Config = serde_json::from_str("{}").expect("parse config");
        assert_eq!(parsed, Config::default());
        assert_eq!(parsed.rpc_timeout(), Duration::from_secs(30));
        assert_eq!(parsed.keystore_kdf, KdfParams::standard());
        assert_eq!(parsed.derivation_path, "m/44'/60'/0'/0/0");
    }

    #[test]
    fn loads_explicit_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "rpc_timeout_ms": 5000,
                "keystore_kdf": {{ "kdf": "pbkdf2", "c": 262144 }},
                "rpc_urls": {{ "11155111": "http://127.0.0.1:8545" }},
                "audit_log_path": "audit.jsonl"
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.rpc_timeout(), Duration::from_secs(5));
        assert_eq!(config.keystore_kdf, KdfParams::Pbkdf2 { c: 262144 });
        assert_eq!(config.audit_log_path.as_deref(), Some("audit.jsonl"));

        let base = RpcConfig::with_urls(HashMap::from([
            (1, "https://mainnet.example".to_string()),
            (11155111, "https://sepolia.example".to_string()),
        ]));
        let rpc = config.rpc_config_with(base);
        assert_eq!(rpc.get(11155111), Some("http://127.0.0.1:8545"));
        assert_eq!(rpc.get(1), Some("https://mainnet.example"));
    }

    #[test]
    fn rejects_invalid_values() {
        let config = Config {
            rpc_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config {
            derivation_path: "44'/60'/0'/0/0".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            keystore_kdf: KdfParams::Scrypt {
                log_n: 30,
                r: 8,
                p: 1,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_or_malformed_file_is_a_config_error() {
        assert!(matches!(
            Config::load("/nonexistent/ether-bridge.json"),
            Err(Error::Config(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));
    }
}
