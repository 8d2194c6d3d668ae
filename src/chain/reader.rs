//! Read-only chain queries: balances, gas price, fee suggestions

use super::erc20;
use super::ChainClient;
use crate::units::{format_ether, format_gwei, format_units};
use crate::Result;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use serde::Serialize;
use tracing::debug;

/// Priority fee used when the node has no `eth_maxPriorityFeePerGas`
pub const FALLBACK_PRIORITY_FEE: u128 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    /// Human-readable balance
    pub balance: String,
    pub decimals: u8,
    /// Balance in base units
    pub raw_balance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPriceQuote {
    pub gas_price_wei: String,
    pub gas_price_gwei: String,
}

/// Fee suggestion for EIP-1559 chains, amounts in wei
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedFees {
    pub gas_price: String,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub base_fee_per_gas: String,
}

/// EIP-1559 fee parameters derived from the latest block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip1559Estimate {
    pub base_fee: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl Eip1559Estimate {
    /// `maxFee = 2 * baseFee + priority`, leaving room for two full blocks
    /// of base-fee growth
    pub fn new(base_fee: u128, priority: u128) -> Self {
        Self {
            base_fee,
            max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority),
            max_priority_fee_per_gas: priority,
        }
    }
}

impl ChainClient {
    /// Native balance of `address` in ETH
    pub async fn native_balance(&self, address: Address) -> Result<String> {
        let wei = self.get_balance(address).await?;
        debug!(%address, %wei, "native balance");
        Ok(format_ether(wei))
    }

    /// `decimals()` then `balanceOf(wallet)` on `token`
    pub async fn token_balance(&self, token: Address, wallet: Address) -> Result<TokenBalance> {
        let call = |input: Bytes| TransactionRequest::default().to(token).input(input.into());

        let data = self.call(call(erc20::decimals_calldata())).await?;
        let decimals = erc20::decode_decimals(&data)?;

        let data = self.call(call(erc20::balance_of_calldata(wallet))).await?;
        let raw = erc20::decode_uint(&data, "balanceOf")?;

        debug!(%token, %wallet, %raw, decimals, "token balance");
        Ok(TokenBalance {
            balance: format_units(raw, decimals),
            decimals,
            raw_balance: raw.to_string(),
        })
    }

    pub async fn gas_price(&self) -> Result<GasPriceQuote> {
        let wei = U256::from(self.get_gas_price().await?);
        Ok(GasPriceQuote {
            gas_price_wei: wei.to_string(),
            gas_price_gwei: format_gwei(wei),
        })
    }

    /// EIP-1559 parameters, or `None` when the latest block has no base fee
    pub async fn eip1559_estimate(&self) -> Result<Option<Eip1559Estimate>> {
        let Some(base_fee) = self.get_base_fee().await? else {
            debug!("latest block has no base fee");
            return Ok(None);
        };
        let priority = self
            .get_max_priority_fee()
            .await?
            .unwrap_or(FALLBACK_PRIORITY_FEE);
        Ok(Some(Eip1559Estimate::new(base_fee, priority)))
    }

    /// Suggested fees for display, `None` on pre-London chains
    pub async fn suggested_fees(&self) -> Result<Option<SuggestedFees>> {
        let Some(estimate) = self.eip1559_estimate().await? else {
            return Ok(None);
        };
        let gas_price = self.get_gas_price().await?;

        Ok(Some(SuggestedFees {
            gas_price: gas_price.to_string(),
            max_fee_per_gas: estimate.max_fee_per_gas.to_string(),
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas.to_string(),
            base_fee_per_gas: estimate.base_fee.to_string(),
        }))
    }
}
