//! Parameter decoding shared by the handlers
//!
//! Callers send chain ids, decimals and amounts either as JSON strings or
//! numbers, so those fields accept both.

use crate::chain::Endpoint;
use crate::tx::FeeOverrides;
use crate::Result;
use serde::de::{Deserializer, Error as _};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
        }
    }
}

/// A string, or a number rendered as its decimal text
pub fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(Scalar::into_text)
}

pub fn opt_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Scalar>::deserialize(deserializer).map(|v| v.map(Scalar::into_text))
}

pub fn u64_from_any<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let text = string_or_number(deserializer)?;
    text.trim()
        .parse::<u64>()
        .map_err(|_| D::Error::custom(format!("expected an unsigned integer, got '{}'", text)))
}

pub fn u8_from_any<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = u64_from_any(deserializer)?;
    u8::try_from(value)
        .map_err(|_| D::Error::custom(format!("decimals must be at most 255, got {}", value)))
}

/// `rpcUrl` and `chainId`, carried by every chain operation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointParams {
    pub rpc_url: String,
    #[serde(deserialize_with = "u64_from_any")]
    pub chain_id: u64,
}

impl EndpointParams {
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::new(&self.rpc_url, self.chain_id)
    }
}

/// Optional fee and gas overrides, decimal wei
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideParams {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub gas_limit: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub gas_price: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub max_fee_per_gas: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub max_priority_fee_per_gas: Option<String>,
}

impl OverrideParams {
    pub fn parse(&self) -> Result<FeeOverrides> {
        FeeOverrides::parse(
            self.gas_limit.as_deref(),
            self.gas_price.as_deref(),
            self.max_fee_per_gas.as_deref(),
            self.max_priority_fee_per_gas.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        #[serde(flatten)]
        endpoint: EndpointParams,
        #[serde(deserialize_with = "u8_from_any")]
        decimals: u8,
        #[serde(deserialize_with = "string_or_number")]
        amount: String,
        #[serde(flatten)]
        overrides: OverrideParams,
    }

    #[test]
    fn accepts_strings_and_numbers() {
        let sample: Sample = serde_json::from_value(json!({
            "rpcUrl": "http://127.0.0.1:8545",
            "chainId": "11155111",
            "decimals": 6,
            "amount": 1.5,
            "gasLimit": 21000,
            "maxFeePerGas": "30000000000"
        }))
        .unwrap();
        assert_eq!(sample.endpoint.chain_id, 11155111);
        assert_eq!(sample.decimals, 6);
        assert_eq!(sample.amount, "1.5");
        assert_eq!(sample.overrides.gas_limit.as_deref(), Some("21000"));
        assert_eq!(sample.overrides.gas_price, None);

        let overrides = sample.overrides.parse().unwrap();
        assert_eq!(overrides.gas_limit, Some(21000));
        assert_eq!(overrides.max_fee_per_gas, Some(30_000_000_000));

        let sample: Sample = serde_json::from_value(json!({
            "rpcUrl": "http://127.0.0.1:8545",
            "chainId": 1,
            "decimals": "18",
            "amount": "2"
        }))
        .unwrap();
        assert_eq!(sample.endpoint.chain_id, 1);
        assert_eq!(sample.decimals, 18);
    }

    #[test]
    fn rejects_bad_numbers() {
        let bad_chain = json!({
            "rpcUrl": "http://127.0.0.1:8545",
            "chainId": "sepolia",
            "decimals": 6,
            "amount": "1"
        });
        assert!(serde_json::from_value::<Sample>(bad_chain).is_err());

        let bad_decimals = json!({
            "rpcUrl": "http://127.0.0.1:8545",
            "chainId": 1,
            "decimals": 300,
            "amount": "1"
        });
        assert!(serde_json::from_value::<Sample>(bad_decimals).is_err());
    }

    #[test]
    fn endpoint_is_validated() {
        let params: EndpointParams =
            serde_json::from_value(json!({ "rpcUrl": "ftp://node", "chainId": 1 })).unwrap();
        assert!(params.endpoint().is_err());
    }
}
