//! Account generation and import
//!
//! Mnemonics are English BIP-39 phrases; keys are derived along a BIP-32
//! path, `m/44'/60'/0'/0/0` unless configured otherwise.

use super::SecureWallet;
use crate::{Error, Result};
use alloy::signers::local::coins_bip39::{English, Entropy, Mnemonic};
use alloy::signers::local::MnemonicBuilder;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

/// Default Ethereum derivation path (first account, external chain)
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// An account produced by generation or import
#[derive(Debug)]
pub struct Account {
    wallet: SecureWallet,
    mnemonic: Option<SecretString>,
}

impl Account {
    pub fn from_wallet(wallet: SecureWallet) -> Self {
        Self {
            wallet,
            mnemonic: None,
        }
    }

    pub fn wallet(&self) -> &SecureWallet {
        &self.wallet
    }

    pub fn address_string(&self) -> String {
        self.wallet.address_string()
    }

    pub fn mnemonic(&self) -> Option<&SecretString> {
        self.mnemonic.as_ref()
    }
}

/// Generate a fresh 12-word mnemonic from OS entropy and derive its account
pub fn generate(derivation_path: &str) -> Result<Account> {
    let mut entropy = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| Error::Entropy(e.to_string()))?;

    let mnemonic = Mnemonic::<English>::new_from_entropy(Entropy::from(entropy));
    let phrase = SecretString::from(mnemonic.to_phrase());
    entropy.fill(0);

    derive(phrase, derivation_path)
}

/// Import an account from a BIP-39 phrase, validating words and checksum
pub fn from_mnemonic(phrase: &str, derivation_path: &str) -> Result<Account> {
    let normalized = normalize_phrase(phrase);
    let words = normalized.split(' ').filter(|w| !w.is_empty()).count();
    if !matches!(words, 12 | 15 | 18 | 21 | 24) {
        return Err(Error::InvalidMnemonic(format!(
            "expected 12, 15, 18, 21 or 24 words, got {}",
            words
        )));
    }

    // Word-list and checksum validation happen here, before any derivation.
    Mnemonic::<English>::new_from_phrase(&normalized)
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;

    derive(SecretString::from(normalized), derivation_path)
}

/// Import an account from a raw private key
pub fn from_private_key(key_hex: &str) -> Result<Account> {
    SecureWallet::from_hex(key_hex).map(Account::from_wallet)
}

/// Derive the checksummed address for a private key
pub fn address_from_private_key(key_hex: &str) -> Result<String> {
    SecureWallet::from_hex(key_hex).map(|w| w.address_string())
}

fn derive(phrase: SecretString, derivation_path: &str) -> Result<Account> {
    let signer = MnemonicBuilder::<English>::default()
        .phrase(phrase.expose_secret())
        .derivation_path(derivation_path)
        .map_err(|e| Error::Config(format!("Invalid derivation path: {}", e)))?
        .build()
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;

    Ok(Account {
        wallet: SecureWallet::from_signer(signer),
        mnemonic: Some(phrase),
    })
}

fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
