//! Ethereum JSON-RPC access
//!
//! Every query takes an explicit [`Endpoint`]; there is no ambient default.

mod client;
pub mod erc20;
mod reader;

pub use client::{ChainClient, Endpoint, DEFAULT_RPC_TIMEOUT};
pub use reader::{
    Eip1559Estimate, GasPriceQuote, SuggestedFees, TokenBalance, FALLBACK_PRIORITY_FEE,
};
