//! Network presets and the persisted network selection
//!
//! The selection is host-side state. The engine never reads it; callers
//! resolve a preset into an explicit `rpcUrl` and `chainId` per call.

use super::rpc::{chains, RpcConfig};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_NETWORK_KEY: &str = "sepolia";

/// A selectable network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkModel {
    pub key: String,
    pub label: String,
    pub rpc_url: String,
    /// Decimal chain id, as bridge callers send it
    pub chain_id: String,
}

/// The built-in presets: mainnet and sepolia
#[derive(Debug, Clone)]
pub struct Networks {
    networks: Vec<NetworkModel>,
}

impl Networks {
    pub fn from_rpc_config(rpc: &RpcConfig) -> Self {
        let preset = |key: &str, label: &str, chain_id: u64| NetworkModel {
            key: key.to_string(),
            label: label.to_string(),
            rpc_url: rpc.get(chain_id).unwrap_or_default().to_string(),
            chain_id: chain_id.to_string(),
        };
        Self {
            networks: vec![
                preset("mainnet", "Mainnet", chains::MAINNET),
                preset("sepolia", "Sepolia", chains::SEPOLIA),
            ],
        }
    }

    pub fn all(&self) -> &[NetworkModel] {
        &self.networks
    }

    pub fn find(&self, key: &str) -> Option<&NetworkModel> {
        self.networks.iter().find(|n| n.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceFile {
    current_network_key: String,
}

/// The selected network key, persisted as a small JSON file
#[derive(Debug, Clone)]
pub struct NetworkPreference {
    path: PathBuf,
    current: String,
}

impl NetworkPreference {
    /// Load the saved selection. A missing, unreadable or unknown value
    /// falls back to the default and is written back.
    pub fn load(path: impl Into<PathBuf>, networks: &Networks) -> Self {
        let path = path.into();
        let saved = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<PreferenceFile>(&raw).ok())
            .map(|file| file.current_network_key);

        let current = match saved.as_deref() {
            Some(key) if networks.contains(key) => key.to_string(),
            _ => DEFAULT_NETWORK_KEY.to_string(),
        };

        let preference = Self { path, current };
        if saved.as_deref() != Some(preference.current.as_str()) {
            if let Err(e) = preference.save() {
                warn!(path = %preference.path.display(), error = %e, "Failed to persist network preference");
            }
        }
        preference
    }

    pub fn current_key(&self) -> &str {
        &self.current
    }

    pub fn current<'a>(&self, networks: &'a Networks) -> Option<&'a NetworkModel> {
        networks.find(&self.current)
    }

    /// Select a network. Unknown keys are ignored and return `false`.
    pub fn set(&mut self, key: &str, networks: &Networks) -> Result<bool> {
        if !networks.contains(key) {
            debug!(key, "ignoring unknown network key");
            return Ok(false);
        }
        self.current = key.to_string();
        self.save()?;
        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = PreferenceFile {
            current_network_key: self.current.clone(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn networks() -> Networks {
        let mut urls = HashMap::new();
        urls.insert(chains::MAINNET, "https://mainnet.example".to_string());
        urls.insert(chains::SEPOLIA, "https://sepolia.example".to_string());
        Networks::from_rpc_config(&RpcConfig::with_urls(urls))
    }

    #[test]
    fn presets_carry_decimal_chain_ids() {
        let networks = networks();
        let keys: Vec<_> = networks.all().iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, ["mainnet", "sepolia"]);

        let sepolia = networks.find("sepolia").unwrap();
        assert_eq!(sepolia.chain_id, "11155111");
        assert_eq!(sepolia.rpc_url, "https://sepolia.example");

        let json = serde_json::to_value(sepolia).unwrap();
        assert_eq!(json["rpcUrl"], "https://sepolia.example");
    }

    #[test]
    fn defaults_to_sepolia_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs/network.json");

        let preference = NetworkPreference::load(&path, &networks());
        assert_eq!(preference.current_key(), "sepolia");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"currentNetworkKey\": \"sepolia\""));
    }

    #[test]
    fn selection_round_trips_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("network.json");
        let networks = networks();

        let mut preference = NetworkPreference::load(&path, &networks);
        assert!(preference.set("mainnet", &networks).unwrap());

        let reloaded = NetworkPreference::load(&path, &networks);
        assert_eq!(reloaded.current_key(), "mainnet");
        assert_eq!(reloaded.current(&networks).unwrap().chain_id, "1");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("network.json");
        let networks = networks();

        let mut preference = NetworkPreference::load(&path, &networks);
        assert!(!preference.set("goerli", &networks).unwrap());
        assert_eq!(preference.current_key(), "sepolia");

        std::fs::write(&path, r#"{"currentNetworkKey":"ropsten"}"#).unwrap();
        assert_eq!(
            NetworkPreference::load(&path, &networks).current_key(),
            "sepolia"
        );

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(
            NetworkPreference::load(&path, &networks).current_key(),
            "sepolia"
        );
    }
}
