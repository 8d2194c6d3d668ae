//! RPC endpoint configuration
//!
//! Resolution order, per chain:
//! 1. Per-chain env vars (`MAINNET_RPC_URL` or `ETH_RPC_URL`, `SEPOLIA_RPC_URL`)
//! 2. Provider API keys (`ALCHEMY_API_KEY`, then `INFURA_API_KEY`)
//! 3. Public RPC fallbacks (rate limited, for testing only)
//!
//! ```bash
//! export SEPOLIA_RPC_URL="https://eth-sepolia.g.alchemy.com/v2/YOUR_KEY"
//! # or
//! export INFURA_API_KEY="YOUR_KEY"
//! ```

use std::collections::HashMap;

/// Chain ID constants
pub mod chains {
    pub const MAINNET: u64 = 1;
    pub const SEPOLIA: u64 = 11155111;
}

/// Environment variable names
pub mod env_vars {
    pub const MAINNET_RPC_URL: &str = "MAINNET_RPC_URL";
    pub const ETH_RPC_URL: &str = "ETH_RPC_URL";
    pub const SEPOLIA_RPC_URL: &str = "SEPOLIA_RPC_URL";

    pub const ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";
    pub const INFURA_API_KEY: &str = "INFURA_API_KEY";
}

/// Public RPC endpoints (rate limited, for testing only)
mod public_rpcs {
    pub const MAINNET: &str = "https://eth.llamarpc.com";
    pub const SEPOLIA: &str = "https://ethereum-sepolia-rpc.publicnode.com";
}

/// RPC URLs indexed by chain ID
#[derive(Debug, Clone)]
pub struct RpcConfig {
    urls: HashMap<u64, String>,
}

impl RpcConfig {
    /// Build from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut urls = HashMap::new();

        if let Some(url) = var(env_vars::MAINNET_RPC_URL).or_else(|| var(env_vars::ETH_RPC_URL)) {
            tracing::debug!("Using explicit RPC URL for mainnet");
            urls.insert(chains::MAINNET, url);
        }
        if let Some(url) = var(env_vars::SEPOLIA_RPC_URL) {
            tracing::debug!("Using SEPOLIA_RPC_URL for sepolia");
            urls.insert(chains::SEPOLIA, url);
        }

        if let Some(key) = var(env_vars::ALCHEMY_API_KEY) {
            tracing::debug!("Filling RPC URLs from ALCHEMY_API_KEY");
            urls.entry(chains::MAINNET)
                .or_insert_with(|| format!("https://eth-mainnet.g.alchemy.com/v2/{}", key));
            urls.entry(chains::SEPOLIA)
                .or_insert_with(|| format!("https://eth-sepolia.g.alchemy.com/v2/{}", key));
        }

        if let Some(key) = var(env_vars::INFURA_API_KEY) {
            tracing::debug!("Filling RPC URLs from INFURA_API_KEY");
            urls.entry(chains::MAINNET)
                .or_insert_with(|| format!("https://mainnet.infura.io/v3/{}", key));
            urls.entry(chains::SEPOLIA)
                .or_insert_with(|| format!("https://sepolia.infura.io/v3/{}", key));
        }

        if !urls.contains_key(&chains::MAINNET) || !urls.contains_key(&chains::SEPOLIA) {
            tracing::debug!("Using public RPC fallbacks (rate limited)");
        }
        urls.entry(chains::MAINNET)
            .or_insert_with(|| public_rpcs::MAINNET.to_string());
        urls.entry(chains::SEPOLIA)
            .or_insert_with(|| public_rpcs::SEPOLIA.to_string());

        Self { urls }
    }

    /// Create with explicit RPC URLs
    pub fn with_urls(urls: HashMap<u64, String>) -> Self {
        Self { urls }
    }

    /// Get RPC URL for a chain
    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(|s| s.as_str())
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_public_rpc_fallbacks() {
        let config = RpcConfig::from_lookup(lookup(&[]));

        assert_eq!(config.get(chains::MAINNET), Some(public_rpcs::MAINNET));
        assert_eq!(config.get(chains::SEPOLIA), Some(public_rpcs::SEPOLIA));
    }

    #[test]
    fn per_chain_urls_win_over_provider_keys() {
        let config = RpcConfig::from_lookup(lookup(&[
            (env_vars::SEPOLIA_RPC_URL, "http://localhost:8545"),
            (env_vars::INFURA_API_KEY, "abc"),
        ]));

        assert_eq!(config.get(chains::SEPOLIA), Some("http://localhost:8545"));
        assert_eq!(
            config.get(chains::MAINNET),
            Some("https://mainnet.infura.io/v3/abc")
        );
    }

    #[test]
    fn eth_rpc_url_is_a_mainnet_alias() {
        let config = RpcConfig::from_lookup(lookup(&[
            (env_vars::ETH_RPC_URL, "https://node.example"),
            (env_vars::ALCHEMY_API_KEY, "k"),
        ]));
        assert_eq!(config.get(chains::MAINNET), Some("https://node.example"));
        assert_eq!(
            config.get(chains::SEPOLIA),
            Some("https://eth-sepolia.g.alchemy.com/v2/k")
        );
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = RpcConfig::from_lookup(lookup(&[(env_vars::MAINNET_RPC_URL, "  ")]));
        assert_eq!(config.get(chains::MAINNET), Some(public_rpcs::MAINNET));
    }

    #[test]
    fn test_get_returns_url() {
        let mut urls = HashMap::new();
        urls.insert(1, "https://custom.rpc".to_string());
        let config = RpcConfig::with_urls(urls);

        assert_eq!(config.get(1), Some("https://custom.rpc"));
        assert_eq!(config.get(999), None);
    }
}
