//! Error types for the wallet engine

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Why a node refused a transaction or call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    InsufficientFunds,
    NonceTooLow,
    Underpriced,
    Reverted,
    Other,
}

impl RejectionKind {
    /// Classify a node error message.
    ///
    /// Geth, Nethermind, Erigon and Besu word these differently, so this
    /// matches on the fragments they have in common.
    pub fn from_node_message(message: &str) -> Option<Self> {
        let message = message.to_lowercase();
        // Revert reasons are contract text and may quote any other marker
        if message.contains("execution reverted") || message.contains("revert") {
            Some(Self::Reverted)
        } else if message.contains("insufficient funds")
            || message.contains("insufficient balance")
        {
            Some(Self::InsufficientFunds)
        } else if message.contains("nonce too low")
            || message.contains("already known")
            || message.contains("nonce has already been used")
        {
            Some(Self::NonceTooLow)
        } else if message.contains("underpriced")
            || message.contains("fee cap less than block base fee")
            || message.contains("max fee per gas less than block base fee")
            || message.contains("fee too low")
        {
            Some(Self::Underpriced)
        } else if message.contains("intrinsic gas too low")
            || message.contains("gas limit reached")
            || message.contains("exceeds block gas limit")
        {
            Some(Self::Other)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientFunds => "insufficient funds",
            Self::NonceTooLow => "nonce too low",
            Self::Underpriced => "underpriced",
            Self::Reverted => "reverted",
            Self::Other => "rejected",
        }
    }
}

/// Caller-facing error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidKeyMaterial,
    Entropy,
    DecryptionFailed,
    InvalidSignature,
    RpcError,
    ChainRejected,
    UnsupportedFeeModel,
    Config,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    #[error("Keystore decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC call {method} timed out after {}s", .after.as_secs_f32())]
    Timeout { method: &'static str, after: Duration },

    #[error("Transaction rejected ({}): {message}", .kind.as_str())]
    ChainRejected { kind: RejectionKind, message: String },

    #[error("Chain {0} does not support EIP-1559 fees")]
    UnsupportedFeeModel(u64),

    #[error("Chain id mismatch: requested {expected}, endpoint reports {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Engine not ready: wait for FinishLoad before issuing calls")]
    NotReady,

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_)
            | Error::ChainMismatch { .. }
            | Error::NotReady
            | Error::UnknownOperation(_) => ErrorKind::InvalidInput,
            Error::InvalidPrivateKey(_) | Error::InvalidMnemonic(_) => {
                ErrorKind::InvalidKeyMaterial
            }
            Error::Entropy(_) => ErrorKind::Entropy,
            Error::DecryptionFailed(_) => ErrorKind::DecryptionFailed,
            Error::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Error::Rpc(_) | Error::Timeout { .. } => ErrorKind::RpcError,
            Error::ChainRejected { .. } => ErrorKind::ChainRejected,
            Error::UnsupportedFeeModel(_) => ErrorKind::UnsupportedFeeModel,
            Error::Config(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_node_messages() {
        assert_eq!(
            RejectionKind::from_node_message("insufficient funds for gas * price + value"),
            Some(RejectionKind::InsufficientFunds)
        );
        assert_eq!(
            RejectionKind::from_node_message("nonce too low: next nonce 5, tx nonce 3"),
            Some(RejectionKind::NonceTooLow)
        );
        assert_eq!(
            RejectionKind::from_node_message("replacement transaction underpriced"),
            Some(RejectionKind::Underpriced)
        );
        assert_eq!(
            RejectionKind::from_node_message("execution reverted: ERC20: transfer amount exceeds balance"),
            Some(RejectionKind::Reverted)
        );
        assert_eq!(RejectionKind::from_node_message("header not found"), None);
    }

    #[test]
    fn revert_reasons_win_over_other_markers() {
        assert_eq!(
            RejectionKind::from_node_message("execution reverted: ERC20: insufficient balance"),
            Some(RejectionKind::Reverted)
        );
        assert_eq!(
            RejectionKind::from_node_message("execution reverted: nonce too low"),
            Some(RejectionKind::Reverted)
        );
        assert_eq!(
            RejectionKind::from_node_message("insufficient balance for transfer"),
            Some(RejectionKind::InsufficientFunds)
        );
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            Error::ChainMismatch { expected: 1, actual: 5 }.kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            Error::Timeout {
                method: "eth_call",
                after: Duration::from_secs(3)
            }
            .kind(),
            ErrorKind::RpcError
        );
        assert_eq!(
            Error::InvalidMnemonic("bad checksum".into()).kind(),
            ErrorKind::InvalidKeyMaterial
        );
    }
}
