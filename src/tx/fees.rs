//! Fee-model selection and fee quotes

use crate::chain::{ChainClient, Eip1559Estimate, FALLBACK_PRIORITY_FEE};
use crate::units::{format_ether, parse_wei};
use crate::{Error, Result};
use alloy::primitives::U256;
use serde::Serialize;
use tracing::debug;

/// Caller-supplied fee fields, all in wei
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeOverrides {
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

impl FeeOverrides {
    /// Parse decimal wei strings. Blank strings count as absent.
    pub fn parse(
        gas_limit: Option<&str>,
        gas_price: Option<&str>,
        max_fee_per_gas: Option<&str>,
        max_priority_fee_per_gas: Option<&str>,
    ) -> Result<Self> {
        fn field<T: TryFrom<U256>>(value: Option<&str>, name: &str) -> Result<Option<T>> {
            match value.map(str::trim).filter(|v| !v.is_empty()) {
                None => Ok(None),
                Some(v) => {
                    let wide = parse_wei(v, name)?;
                    T::try_from(wide)
                        .map(Some)
                        .map_err(|_| Error::invalid(format!("{} is out of range", name)))
                }
            }
        }

        let overrides = Self {
            gas_limit: field(gas_limit, "gasLimit")?,
            gas_price: field(gas_price, "gasPrice")?,
            max_fee_per_gas: field(max_fee_per_gas, "maxFeePerGas")?,
            max_priority_fee_per_gas: field(max_priority_fee_per_gas, "maxPriorityFeePerGas")?,
        };
        if overrides.gas_limit == Some(0) {
            return Err(Error::invalid("gasLimit must be positive"));
        }
        overrides.check_kinds()?;
        Ok(overrides)
    }

    fn check_kinds(&self) -> Result<()> {
        if self.has_eip1559() && self.gas_price.is_some() {
            return Err(Error::invalid(
                "gasPrice cannot be combined with maxFeePerGas or maxPriorityFeePerGas",
            ));
        }
        Ok(())
    }

    fn has_eip1559(&self) -> bool {
        self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some()
    }
}

/// How a transaction pays for gas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeModel {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl FeeModel {
    /// Highest price per gas the transaction can pay
    pub fn max_price(&self) -> u128 {
        match self {
            FeeModel::Legacy { gas_price } => *gas_price,
            FeeModel::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

impl From<Eip1559Estimate> for FeeModel {
    fn from(estimate: Eip1559Estimate) -> Self {
        FeeModel::Eip1559 {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        }
    }
}

/// Pick the fee model for a transfer.
///
/// EIP-1559 overrides give a type-2 transaction, a `gasPrice` override gives
/// legacy, and mixing the two is rejected. With no overrides the chain
/// decides: type-2 when the latest block carries a base fee, legacy otherwise.
pub async fn resolve_fee_model(
    client: &ChainClient,
    overrides: &FeeOverrides,
    chain_id: u64,
) -> Result<FeeModel> {
    overrides.check_kinds()?;

    if let Some(gas_price) = overrides.gas_price {
        return Ok(FeeModel::Legacy { gas_price });
    }

    let (max_fee, priority) = match (
        overrides.max_fee_per_gas,
        overrides.max_priority_fee_per_gas,
    ) {
        (None, None) => {
            let model = match client.eip1559_estimate().await? {
                Some(estimate) => estimate.into(),
                None => FeeModel::Legacy {
                    gas_price: client.get_gas_price().await?,
                },
            };
            debug!(?model, "fee model from chain");
            return Ok(model);
        }
        pair => pair,
    };

    let Some(base_fee) = client.get_base_fee().await? else {
        return Err(Error::UnsupportedFeeModel(chain_id));
    };

    let (max_fee_per_gas, max_priority_fee_per_gas) = match max_fee {
        Some(max_fee) => {
            let priority = match priority {
                Some(priority) => priority,
                None => client
                    .get_max_priority_fee()
                    .await?
                    .unwrap_or(FALLBACK_PRIORITY_FEE)
                    .min(max_fee),
            };
            (max_fee, priority)
        }
        None => {
            let estimate =
                Eip1559Estimate::new(base_fee, priority.unwrap_or(FALLBACK_PRIORITY_FEE));
            (estimate.max_fee_per_gas, estimate.max_priority_fee_per_gas)
        }
    };

    if max_priority_fee_per_gas > max_fee_per_gas {
        return Err(Error::invalid(
            "maxPriorityFeePerGas must not exceed maxFeePerGas",
        ));
    }

    let model = FeeModel::Eip1559 {
        max_fee_per_gas,
        max_priority_fee_per_gas,
    };
    debug!(?model, "fee model from overrides");
    Ok(model)
}

/// Pricing half of a [`FeeQuote`] or a submitted transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QuotedPricing {
    Legacy {
        #[serde(rename = "gasPrice")]
        gas_price: String,
    },
    Eip1559 {
        #[serde(rename = "maxFeePerGas")]
        max_fee_per_gas: String,
        #[serde(rename = "maxPriorityFeePerGas")]
        max_priority_fee_per_gas: String,
    },
}

/// Gas limit and worst-case cost of a transaction, computed fresh per call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    pub gas_limit: String,
    #[serde(flatten)]
    pub pricing: QuotedPricing,
    pub estimated_fee_wei: String,
    pub estimated_fee_eth: String,
}

impl From<FeeModel> for QuotedPricing {
    fn from(model: FeeModel) -> Self {
        match model {
            FeeModel::Legacy { gas_price } => QuotedPricing::Legacy {
                gas_price: gas_price.to_string(),
            },
            FeeModel::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => QuotedPricing::Eip1559 {
                max_fee_per_gas: max_fee_per_gas.to_string(),
                max_priority_fee_per_gas: max_priority_fee_per_gas.to_string(),
            },
        }
    }
}

impl FeeQuote {
    pub fn new(gas_limit: u64, model: FeeModel) -> Self {
        let fee = U256::from(gas_limit) * U256::from(model.max_price());
        Self {
            gas_limit: gas_limit.to_string(),
            pricing: model.into(),
            estimated_fee_wei: fee.to_string(),
            estimated_fee_eth: format_ether(fee),
        }
    }
}
