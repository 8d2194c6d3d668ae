//! Transfer pipeline: build, sign and broadcast ETH and ERC-20 transfers
//!
//! A transfer moves through `Idle → NonceFetched → Signed → Submitted`.
//! The chain id reported by the endpoint is checked against the caller's
//! before anything is signed.

use super::fees::{resolve_fee_model, FeeModel, FeeOverrides, FeeQuote, QuotedPricing};
use crate::chain::{erc20, ChainClient};
use crate::units::{parse_ether, parse_units};
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::rpc::types::TransactionRequest;
use serde::Serialize;
use tracing::{debug, info, warn};

/// What is being transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Native,
    Token { contract: Address, decimals: u8 },
}

/// The on-chain call a transfer turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCall {
    /// Transaction destination: the recipient, or the token contract
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

impl Asset {
    /// Build the call moving `amount` (human units) to `recipient`
    pub fn transfer_call(&self, recipient: Address, amount: &str) -> Result<TransferCall> {
        match self {
            Asset::Native => Ok(TransferCall {
                to: recipient,
                value: parse_ether(amount)?,
                input: Bytes::new(),
            }),
            Asset::Token { contract, decimals } => {
                let amount = parse_units(amount, *decimals)?;
                Ok(TransferCall {
                    to: *contract,
                    value: U256::ZERO,
                    input: erc20::transfer_calldata(recipient, amount),
                })
            }
        }
    }

    fn token_address(&self) -> Option<Address> {
        match self {
            Asset::Native => None,
            Asset::Token { contract, .. } => Some(*contract),
        }
    }
}

impl TransferCall {
    fn request(&self, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .from(from)
            .to(self.to)
            .value(self.value)
            .input(self.input.clone().into())
    }
}

/// A transfer ready to be built
#[derive(Debug)]
pub struct TransferRequest {
    pub wallet: SecureWallet,
    pub recipient: Address,
    /// Amount in human units (ETH, or token units scaled by `decimals`)
    pub amount: String,
    pub asset: Asset,
    pub overrides: FeeOverrides,
}

/// Outcome of a broadcast transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub hash: String,
    pub from: String,
    /// The recipient, not the token contract
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    pub nonce: u64,
    pub gas_limit: String,
    #[serde(flatten)]
    pub pricing: QuotedPricing,
}

/// Pipeline position of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransferStage {
    Idle,
    NonceFetched,
    Signed,
    Submitted,
}

/// A signed, encoded transaction that has not been broadcast yet
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub raw: Bytes,
    pub hash: B256,
    pub nonce: u64,
    pub from: Address,
    pub recipient: Address,
    pub token: Option<Address>,
    pub fee: FeeModel,
    pub gas_limit: u64,
    stage: TransferStage,
}

impl SignedTransfer {
    pub fn stage(&self) -> TransferStage {
        self.stage
    }
}

struct Pipeline {
    stage: TransferStage,
    from: Address,
}

impl Pipeline {
    fn new(from: Address) -> Self {
        Self {
            stage: TransferStage::Idle,
            from,
        }
    }

    fn advance(&mut self, next: TransferStage) {
        debug_assert!(next > self.stage, "transfer stages only move forward");
        debug!(from = %self.from, stage = ?next, "transfer stage");
        self.stage = next;
    }
}

/// Check that the endpoint serves the chain the caller is signing for
pub async fn ensure_chain(client: &ChainClient, expected: u64) -> Result<()> {
    let actual = client.get_chain_id().await?;
    if actual != expected {
        warn!(expected, actual, "endpoint serves a different chain");
        return Err(Error::ChainMismatch { expected, actual });
    }
    Ok(())
}

/// Gas limit and legacy-priced cost of moving `amount` of `asset`
pub async fn estimate_transfer(
    client: &ChainClient,
    from: Address,
    recipient: Address,
    amount: &str,
    asset: Asset,
) -> Result<FeeQuote> {
    let call = asset.transfer_call(recipient, amount)?;
    let gas_limit = client.estimate_gas(call.request(from)).await?;
    let gas_price = client.get_gas_price().await?;
    debug!(%from, gas_limit, gas_price, "estimated transfer");
    Ok(FeeQuote::new(gas_limit, FeeModel::Legacy { gas_price }))
}

/// Run the pipeline up to `Signed`: chain check, nonce, fees, gas, signature
pub async fn prepare_transfer(
    client: &ChainClient,
    chain_id: u64,
    request: &TransferRequest,
) -> Result<SignedTransfer> {
    let from = request.wallet.address();
    let call = request.asset.transfer_call(request.recipient, &request.amount)?;
    let mut pipeline = Pipeline::new(from);

    ensure_chain(client, chain_id).await?;

    let nonce = client.get_pending_nonce(from).await?;
    pipeline.advance(TransferStage::NonceFetched);

    let fee = resolve_fee_model(client, &request.overrides, chain_id).await?;

    let gas_limit = match request.overrides.gas_limit {
        Some(limit) => limit,
        None => client.estimate_gas(call.request(from)).await?,
    };

    let envelope = sign(&request.wallet, chain_id, nonce, gas_limit, fee, &call)?;
    pipeline.advance(TransferStage::Signed);

    let hash = *envelope.tx_hash();
    info!(%from, %hash, nonce, gas_limit, ?fee, "transfer signed");

    Ok(SignedTransfer {
        raw: envelope.encoded_2718().into(),
        hash,
        nonce,
        from,
        recipient: request.recipient,
        token: request.asset.token_address(),
        fee,
        gas_limit,
        stage: pipeline.stage,
    })
}

/// Broadcast a signed transfer
pub async fn submit_transfer(
    client: &ChainClient,
    signed: SignedTransfer,
) -> Result<TransactionResult> {
    let returned = client.send_raw_transaction(&signed.raw).await?;
    if returned != signed.hash {
        warn!(local = %signed.hash, node = %returned, "node reported a different hash");
    }
    info!(
        hash = %signed.hash,
        nonce = signed.nonce,
        stage = ?TransferStage::Submitted,
        "transfer submitted"
    );

    Ok(TransactionResult {
        hash: signed.hash.to_string(),
        from: signed.from.to_checksum(None),
        to: signed.recipient.to_checksum(None),
        token_address: signed.token.map(|t| t.to_checksum(None)),
        nonce: signed.nonce,
        gas_limit: signed.gas_limit.to_string(),
        pricing: signed.fee.into(),
    })
}

/// Prepare and broadcast in one go
pub async fn transfer(
    client: &ChainClient,
    chain_id: u64,
    request: &TransferRequest,
) -> Result<TransactionResult> {
    let signed = prepare_transfer(client, chain_id, request).await?;
    submit_transfer(client, signed).await
}

fn sign(
    wallet: &SecureWallet,
    chain_id: u64,
    nonce: u64,
    gas_limit: u64,
    fee: FeeModel,
    call: &TransferCall,
) -> Result<TxEnvelope> {
    let envelope = match fee {
        FeeModel::Legacy { gas_price } => {
            let mut tx = TxLegacy {
                chain_id: Some(chain_id),
                nonce,
                gas_price,
                gas_limit,
                to: TxKind::Call(call.to),
                value: call.value,
                input: call.input.clone(),
            };
            let signature = wallet.sign_transaction(&mut tx)?;
            TxEnvelope::from(tx.into_signed(signature))
        }
        FeeModel::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let mut tx = TxEip1559 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                to: TxKind::Call(call.to),
                value: call.value,
                access_list: Default::default(),
                input: call.input.clone(),
            };
            let signature = wallet.sign_transaction(&mut tx)?;
            TxEnvelope::from(tx.into_signed(signature))
        }
    };
    Ok(envelope)
}
