//! Key material: accounts, keystores and signing
//!
//! Private keys never leave this module except through the explicit
//! `SecureWallet::export_private_key` call.

pub mod account;
pub mod keystore;
pub mod message;
mod signer;

pub use account::{Account, DEFAULT_DERIVATION_PATH};
pub use keystore::KdfParams;
pub use signer::SecureWallet;
