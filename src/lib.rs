//! Ethereum Wallet Engine
//!
//! Key generation and import, Web3 keystores, EIP-191 message signing,
//! balance and fee queries, and signed ETH and ERC-20 transfers over
//! JSON-RPC. Exposed as a typed async API ([`WalletEngine`]) and as a
//! request/response [`bridge`] that hosts drive over JSON lines.
//!
//! # Security Model
//!
//! - Private keys live in a signer whose `Debug` output is redacted
//! - Bridge parameters carrying secrets decode into `SecretString`
//! - Errors and logs never contain key material or passwords
//! - The optional audit log redacts keys, mnemonics, passwords and keystores

pub mod bridge;
pub mod chain;
pub mod config;
pub mod engine;
pub mod server;
pub mod tx;
pub mod units;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use bridge::{Bridge, Envelope};
pub use chain::Endpoint;
pub use config::{Config, RpcConfig};
pub use engine::WalletEngine;
pub use error::{Error, ErrorKind, RejectionKind, Result};
