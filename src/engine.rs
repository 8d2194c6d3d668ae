//! The wallet engine: one typed async method per operation
//!
//! The engine holds no per-call state. Chain operations take an explicit
//! [`Endpoint`] and open a fresh client for it.

use crate::chain::{ChainClient, Endpoint, GasPriceQuote, SuggestedFees, TokenBalance};
use crate::config::Config;
use crate::tx::{self, Asset, FeeOverrides, FeeQuote, TransactionResult, TransferRequest};
use crate::wallet::{account, keystore, message, Account, KdfParams, SecureWallet};
use crate::{Error, Result};
use alloy::primitives::Address;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info};

/// An account plus the keystore produced for it, if any
#[derive(Debug)]
pub struct AccountInfo {
    pub account: Account,
    pub keystore: Option<String>,
}

/// Parse an address, enforcing EIP-55 when the input is mixed-case
pub fn parse_address(value: &str, field: &str) -> Result<Address> {
    let value = value.trim();
    let hex = value.strip_prefix("0x").unwrap_or(value);
    let mixed_case = hex.chars().any(|c| c.is_ascii_uppercase())
        && hex.chars().any(|c| c.is_ascii_lowercase());

    let parsed = if mixed_case {
        Address::parse_checksummed(value, None).map_err(|_| {
            Error::invalid(format!("{} '{}' has an invalid EIP-55 checksum", field, value))
        })
    } else {
        value
            .parse::<Address>()
            .map_err(|_| Error::invalid(format!("{} '{}' is not an address", field, value)))
    }?;
    Ok(parsed)
}

#[derive(Debug, Clone)]
pub struct WalletEngine {
    derivation_path: String,
    keystore_kdf: KdfParams,
    rpc_timeout: Duration,
}

impl Default for WalletEngine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl WalletEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            derivation_path: config.derivation_path.clone(),
            keystore_kdf: config.keystore_kdf,
            rpc_timeout: config.rpc_timeout(),
        }
    }

    pub fn with_keystore_kdf(mut self, kdf: KdfParams) -> Self {
        self.keystore_kdf = kdf;
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    fn client(&self, endpoint: &Endpoint) -> Result<ChainClient> {
        ChainClient::connect(endpoint, self.rpc_timeout)
    }

    /// Run the keystore KDF off the async runtime
    async fn encrypt_keystore(
        &self,
        account: Account,
        password: SecretString,
    ) -> Result<AccountInfo> {
        let kdf = self.keystore_kdf;
        let (account, keystore) = tokio::task::spawn_blocking(move || {
            let keystore = keystore::encrypt(account.wallet(), password.expose_secret(), kdf);
            (account, keystore)
        })
        .await
        .map_err(|e| Error::Config(format!("Keystore task failed: {}", e)))?;

        Ok(AccountInfo {
            account,
            keystore: Some(keystore?),
        })
    }

    async fn with_optional_keystore(
        &self,
        account: Account,
        password: Option<SecretString>,
    ) -> Result<AccountInfo> {
        match password.filter(|p| !p.expose_secret().is_empty()) {
            Some(password) => self.encrypt_keystore(account, password).await,
            None => Ok(AccountInfo {
                account,
                keystore: None,
            }),
        }
    }

    // Key & account management

    /// Fresh 12-word mnemonic and its first account; a non-empty password
    /// also produces a keystore
    pub async fn generate_account(&self, password: Option<SecretString>) -> Result<AccountInfo> {
        let account = account::generate(&self.derivation_path)?;
        info!(address = %account.address_string(), "generated account");
        self.with_optional_keystore(account, password).await
    }

    pub async fn import_from_mnemonic(
        &self,
        mnemonic: SecretString,
        password: Option<SecretString>,
    ) -> Result<AccountInfo> {
        let account = account::from_mnemonic(mnemonic.expose_secret(), &self.derivation_path)?;
        info!(address = %account.address_string(), "imported account from mnemonic");
        self.with_optional_keystore(account, password).await
    }

    pub async fn import_from_private_key(
        &self,
        private_key: SecretString,
        password: Option<SecretString>,
    ) -> Result<AccountInfo> {
        let account = account::from_private_key(private_key.expose_secret())?;
        info!(address = %account.address_string(), "imported account from private key");
        self.with_optional_keystore(account, password).await
    }

    /// Decrypt a keystore; the document is handed back unchanged
    pub async fn import_from_keystore(
        &self,
        json: String,
        password: SecretString,
    ) -> Result<AccountInfo> {
        let (wallet, json) = tokio::task::spawn_blocking(move || {
            let wallet = keystore::decrypt(&json, password.expose_secret());
            (wallet, json)
        })
        .await
        .map_err(|e| Error::Config(format!("Keystore task failed: {}", e)))?;

        let account = Account::from_wallet(wallet?);
        info!(address = %account.address_string(), "imported account from keystore");
        Ok(AccountInfo {
            account,
            keystore: Some(json),
        })
    }

    pub async fn export_to_keystore(
        &self,
        private_key: SecretString,
        password: SecretString,
    ) -> Result<String> {
        if password.expose_secret().is_empty() {
            return Err(Error::invalid("password must not be empty"));
        }
        let account = account::from_private_key(private_key.expose_secret())?;
        let info = self.encrypt_keystore(account, password).await?;
        info.keystore
            .ok_or_else(|| Error::Config("keystore was not produced".to_string()))
    }

    pub async fn address_from_private_key(&self, private_key: SecretString) -> Result<String> {
        account::address_from_private_key(private_key.expose_secret())
    }

    // Messages

    pub async fn sign_message(&self, private_key: SecretString, msg: &str) -> Result<String> {
        let wallet = SecureWallet::from_hex(private_key.expose_secret())?;
        let signature = message::sign_message(&wallet, msg)?;
        debug!(address = %wallet.address(), "signed message");
        Ok(signature)
    }

    pub async fn recover_signer(&self, msg: &str, signature: &str) -> Result<String> {
        message::recover_signer(msg, signature)
    }

    pub async fn verify_signer(&self, msg: &str, signature: &str, expected: &str) -> bool {
        message::verify_signer(msg, signature, expected)
    }

    pub async fn hash_message(&self, msg: &str) -> String {
        message::hash_message(msg).to_string()
    }

    // Chain reads

    pub async fn chain_id(&self, endpoint: &Endpoint) -> Result<u64> {
        self.client(endpoint)?.get_chain_id().await
    }

    pub async fn native_balance(&self, address: &str, endpoint: &Endpoint) -> Result<String> {
        let address = parse_address(address, "address")?;
        self.client(endpoint)?.native_balance(address).await
    }

    pub async fn token_balance(
        &self,
        token: &str,
        wallet: &str,
        endpoint: &Endpoint,
    ) -> Result<TokenBalance> {
        let token = parse_address(token, "tokenAddress")?;
        let wallet = parse_address(wallet, "walletAddress")?;
        self.client(endpoint)?.token_balance(token, wallet).await
    }

    pub async fn gas_price(&self, endpoint: &Endpoint) -> Result<GasPriceQuote> {
        self.client(endpoint)?.gas_price().await
    }

    pub async fn suggested_fees(&self, endpoint: &Endpoint) -> Result<Option<SuggestedFees>> {
        self.client(endpoint)?.suggested_fees().await
    }

    // Transactions

    pub async fn estimate_transfer_gas(
        &self,
        from: &str,
        to: &str,
        amount: &str,
        asset: Asset,
        endpoint: &Endpoint,
    ) -> Result<FeeQuote> {
        let from = parse_address(from, "fromAddress")?;
        let to = parse_address(to, "to")?;
        tx::estimate_transfer(&self.client(endpoint)?, from, to, amount, asset).await
    }

    pub async fn transfer(
        &self,
        private_key: SecretString,
        to: &str,
        amount: &str,
        asset: Asset,
        overrides: FeeOverrides,
        endpoint: &Endpoint,
    ) -> Result<TransactionResult> {
        let request = TransferRequest {
            wallet: SecureWallet::from_hex(private_key.expose_secret())?,
            recipient: parse_address(to, "to")?,
            amount: amount.to_string(),
            asset,
            overrides,
        };
        tx::transfer(&self.client(endpoint)?, endpoint.chain_id, &request).await
    }
}
