//! EIP-191 personal-message signing and recovery

use super::SecureWallet;
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::{eip191_hash_message, Address, Signature, B256, U256};

/// `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`
pub fn hash_message(message: &str) -> B256 {
    eip191_hash_message(message.as_bytes())
}

/// Sign a UTF-8 message, returning `0x`-prefixed `r ‖ s ‖ v` with v in {27, 28}
pub fn sign_message(wallet: &SecureWallet, message: &str) -> Result<String> {
    let signature = wallet.sign_message(message.as_bytes())?;
    Ok(hex::encode_prefixed(signature.as_bytes()))
}

/// Recover the checksummed address that signed `message`
pub fn recover_signer(message: &str, signature: &str) -> Result<String> {
    let signature = parse_signature(signature)?;
    signature
        .recover_address_from_msg(message.as_bytes())
        .map(|address| address.to_checksum(None))
        .map_err(|e| Error::InvalidSignature(format!("recovery failed: {}", e)))
}

/// Check that `signature` over `message` was made by `expected`.
///
/// Malformed signatures or addresses yield `false`.
pub fn verify_signer(message: &str, signature: &str, expected: &str) -> bool {
    let Ok(expected) = expected.trim().parse::<Address>() else {
        return false;
    };
    parse_signature(signature)
        .ok()
        .and_then(|sig| sig.recover_address_from_msg(message.as_bytes()).ok())
        .is_some_and(|recovered| recovered == expected)
}

fn parse_signature(signature: &str) -> Result<Signature> {
    let trimmed = signature.trim();
    let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|_| Error::InvalidSignature("not a hex string".to_string()))?;
    if bytes.len() != 65 {
        return Err(Error::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let y_parity = match bytes[64] {
        0 | 27 => false,
        1 | 28 => true,
        v => {
            return Err(Error::InvalidSignature(format!(
                "recovery id {} is not 0, 1, 27 or 28",
                v
            )))
        }
    };

    Ok(Signature::new(
        U256::from_be_slice(&bytes[..32]),
        U256::from_be_slice(&bytes[32..64]),
        y_parity,
    ))
}
