//! Secure wallet implementation
//!
//! SECURITY: key material lives in alloy's `PrivateKeySigner`.
//! - `Debug` is redacted
//! - There is no `Serialize` impl; the hex key is only produced by the
//!   explicit `export_private_key` call, wrapped in a `SecretString`
//! - Keys are never logged

use crate::{Error, Result};
use alloy::consensus::SignableTransaction;
use alloy::hex;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Signature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use secrecy::SecretString;

/// Wallet that owns one secp256k1 key
pub struct SecureWallet {
    /// The signer
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
}

impl SecureWallet {
    /// Create a wallet from a hex-encoded private key (`0x` optional).
    ///
    /// The key must be exactly 32 bytes and a valid nonzero scalar below the
    /// secp256k1 group order.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let trimmed = key_hex.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let bytes = hex::decode(trimmed)
            .map_err(|_| Error::InvalidPrivateKey("not a hex string".to_string()))?;
        if bytes.len() != 32 {
            return Err(Error::InvalidPrivateKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        Self::from_bytes(&B256::from_slice(&bytes))
    }

    pub fn from_bytes(key: &B256) -> Result<Self> {
        let signer = PrivateKeySigner::from_bytes(key).map_err(|_| {
            Error::InvalidPrivateKey("key is zero or not below the secp256k1 order".to_string())
        })?;
        Ok(Self::from_signer(signer))
    }

    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self { signer, address }
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the address as an EIP-55 checksummed string
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Raw key bytes, for keystore encryption only
    pub(crate) fn key_bytes(&self) -> B256 {
        self.signer.to_bytes()
    }

    /// Export the private key as `0x`-prefixed hex
    pub fn export_private_key(&self) -> SecretString {
        SecretString::from(hex::encode_prefixed(self.signer.to_bytes()))
    }

    /// Sign a message with the EIP-191 personal-message prefix.
    ///
    /// k256 derives the nonce per RFC 6979, so signatures are deterministic.
    pub fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.signer
            .sign_message_sync(message)
            .map_err(|e| Error::InvalidSignature(format!("Signing failed: {}", e)))
    }

    /// Sign a transaction in place of its chain-bound signing hash
    pub fn sign_transaction(
        &self,
        tx: &mut dyn SignableTransaction<Signature>,
    ) -> Result<Signature> {
        self.signer
            .sign_transaction_sync(tx)
            .map_err(|e| Error::InvalidInput(format!("Transaction signing failed: {}", e)))
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
