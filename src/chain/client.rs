//! JSON-RPC access to one endpoint
//!
//! Every request runs under a deadline. Node error responses are classified
//! into `ChainRejected` kinds where the message is recognisable; transport
//! failures become `Rpc`; an expired deadline becomes `Timeout`.

use crate::error::RejectionKind;
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::Http;
use alloy::transports::{TransportError, TransportErrorKind, TransportResult};
use serde::Deserialize;
use std::future::IntoFuture;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default per-request deadline
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// An RPC URL and the chain id the caller expects it to serve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub rpc_url: Url,
    pub chain_id: u64,
}

impl Endpoint {
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let rpc_url: Url = rpc_url
            .trim()
            .parse()
            .map_err(|e| Error::invalid(format!("Invalid rpcUrl: {}", e)))?;
        if !matches!(rpc_url.scheme(), "http" | "https") {
            return Err(Error::invalid(format!(
                "rpcUrl must be http or https, got '{}'",
                rpc_url.scheme()
            )));
        }
        if chain_id == 0 {
            return Err(Error::invalid("chainId must be nonzero"));
        }
        Ok(Self { rpc_url, chain_id })
    }
}

#[derive(Debug, Deserialize)]
struct LatestBlockFees {
    #[serde(rename = "baseFeePerGas", default)]
    base_fee_per_gas: Option<U256>,
}

/// Thin wrapper over an alloy provider that applies deadlines and error
/// classification
#[derive(Clone)]
pub struct ChainClient {
    provider: DynProvider,
    timeout: Duration,
}

impl ChainClient {
    /// Connect over HTTP; the reqwest client carries the same deadline
    pub fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        let transport = Http::with_client(http, endpoint.rpc_url.clone());
        let client = RpcClient::new(transport, false);
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_client(client)
            .erased();
        Ok(Self::from_provider(provider, timeout))
    }

    pub fn from_provider(provider: DynProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Client over alloy's mock transport; responses are served in push order
    #[cfg(test)]
    pub(crate) fn mocked() -> (Self, alloy::transports::mock::Asserter) {
        let asserter = alloy::transports::mock::Asserter::new();
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter.clone())
            .erased();
        (Self::from_provider(provider, Duration::from_secs(5)), asserter)
    }

    /// Run `call` under the deadline; the outer error is always `Timeout`
    async fn deadline<F, T>(&self, method: &'static str, call: F) -> Result<TransportResult<T>>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        debug!(method, "rpc request");
        tokio::time::timeout(self.timeout, call).await.map_err(|_| {
            warn!(method, timeout_ms = self.timeout.as_millis() as u64, "rpc timed out");
            Error::Timeout {
                method,
                after: self.timeout,
            }
        })
    }

    async fn request<F, T>(&self, method: &'static str, call: F) -> Result<T>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        self.deadline(method, call)
            .await?
            .map_err(|err| classify(method, err, self.timeout))
    }

    pub async fn get_chain_id(&self) -> Result<u64> {
        self.request("eth_chainId", self.provider.get_chain_id()).await
    }

    pub async fn get_balance(&self, address: Address) -> Result<U256> {
        self.request("eth_getBalance", self.provider.get_balance(address))
            .await
    }

    pub async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
        self.request("eth_call", self.provider.call(tx)).await
    }

    pub async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64> {
        self.request("eth_estimateGas", self.provider.estimate_gas(tx))
            .await
    }

    pub async fn get_gas_price(&self) -> Result<u128> {
        self.request("eth_gasPrice", self.provider.get_gas_price())
            .await
    }

    /// `eth_maxPriorityFeePerGas`, or `None` when the node answers with a
    /// JSON-RPC error (the method is not implemented everywhere). Transport
    /// failures and timeouts still propagate.
    pub async fn get_max_priority_fee(&self) -> Result<Option<u128>> {
        const METHOD: &str = "eth_maxPriorityFeePerGas";
        match self
            .deadline(METHOD, self.provider.get_max_priority_fee_per_gas())
            .await?
        {
            Ok(fee) => Ok(Some(fee)),
            Err(err) if err.as_error_resp().is_some() => {
                debug!(error = %err, "node has no priority fee oracle");
                Ok(None)
            }
            Err(err) => Err(classify(METHOD, err, self.timeout)),
        }
    }

    pub async fn get_pending_nonce(&self, address: Address) -> Result<u64> {
        self.request(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(address).pending(),
        )
        .await
    }

    /// Base fee of the latest block, `None` before London
    pub async fn get_base_fee(&self) -> Result<Option<u128>> {
        let block: Option<LatestBlockFees> = self
            .request(
                "eth_getBlockByNumber",
                self.provider
                    .raw_request("eth_getBlockByNumber".into(), ("latest", false)),
            )
            .await?;
        let block = block.ok_or_else(|| Error::Rpc("latest block not available".to_string()))?;

        block
            .base_fee_per_gas
            .map(|fee| {
                u128::try_from(fee)
                    .map_err(|_| Error::Rpc(format!("base fee {} out of range", fee)))
            })
            .transpose()
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        let pending = self
            .request(
                "eth_sendRawTransaction",
                self.provider.send_raw_transaction(raw),
            )
            .await?;
        Ok(*pending.tx_hash())
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn is_transport_timeout(err: &TransportError) -> bool {
    match err {
        TransportError::Transport(TransportErrorKind::Custom(inner)) => inner
            .downcast_ref::<reqwest::Error>()
            .is_some_and(|e| e.is_timeout()),
        _ => false,
    }
}

fn classify(method: &'static str, err: TransportError, after: Duration) -> Error {
    if is_transport_timeout(&err) {
        warn!(method, "http request timed out");
        return Error::Timeout { method, after };
    }

    if let Some(payload) = err.as_error_resp() {
        if let Some(kind) = RejectionKind::from_node_message(&payload.message) {
            let message = match (kind, &payload.data) {
                (RejectionKind::Reverted, Some(data)) => {
                    parse_revert_reason(&format!("{} {}", payload.message, data.get()))
                }
                (RejectionKind::Reverted, None) => parse_revert_reason(&payload.message),
                _ => payload.message.to_string(),
            };
            warn!(method, kind = kind.as_str(), %message, "node rejected request");
            return Error::ChainRejected { kind, message };
        }
        warn!(method, code = payload.code, message = %payload.message, "rpc error response");
        return Error::Rpc(format!(
            "{} failed: {} (code {})",
            method, payload.message, payload.code
        ));
    }

    warn!(method, error = %err, "rpc transport error");
    Error::Rpc(format!("{} failed: {}", method, err))
}

/// Pull a human-readable revert reason out of a node error message,
/// decoding `Error(string)` revert data when that is all there is
fn parse_revert_reason(error: &str) -> String {
    for marker in ["revert: ", "execution reverted: "] {
        if let Some(start) = error.find(marker) {
            let reason = &error[start + marker.len()..];
            let reason = match reason.find('"') {
                Some(end) => &reason[..end],
                None => reason,
            };
            // Some nodes append the raw data after the reason
            let reason = match reason.find(" 0x") {
                Some(end) => &reason[..end],
                None => reason,
            };
            let reason = reason.trim();
            if !reason.is_empty() {
                return reason.to_string();
            }
        }
    }

    if let Some(start) = error.find("0x") {
        let data = &error[start + 2..];
        let end = data
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(data.len());
        let data = &data[..end];
        if let Some(reason) = decode_error_string(data) {
            return reason;
        }
        if !data.is_empty() {
            return format!("execution reverted with data 0x{}", data);
        }
    }

    "execution reverted".to_string()
}

/// Decode ABI-encoded `Error(string)` revert data (selector `0x08c379a0`)
fn decode_error_string(data_hex: &str) -> Option<String> {
    let data = hex::decode(data_hex).ok()?;
    let body = data.strip_prefix(&[0x08, 0xc3, 0x79, 0xa0][..])?;
    if body.len() < 64 {
        return None;
    }
    let offset = usize::try_from(U256::from_be_slice(&body[..32])).ok()?;
    let len_word = body.get(offset..offset.checked_add(32)?)?;
    let len = usize::try_from(U256::from_be_slice(len_word)).ok()?;
    let start = offset + 32;
    let bytes = body.get(start..start.checked_add(len)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}
