//! Bridge handlers, one per operation
//!
//! Secrets arrive as `SecretString` and are only exposed inside the engine.
//! Private keys and mnemonics leave the process only in [`AccountOutput`],
//! which the caller asked for.

use super::params::{string_or_number, u8_from_any, EndpointParams, OverrideParams};
use super::{operations, Bridge, BridgeHandler};
use crate::engine::{parse_address, AccountInfo, WalletEngine};
use crate::tx::{Asset, FeeQuote, TransactionResult};
use crate::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub(super) fn register_all(bridge: &mut Bridge) {
    bridge.register(GenerateAccount);
    bridge.register(ImportFromMnemonic);
    bridge.register(ImportFromPrivateKey);
    bridge.register(ImportFromKeystore);
    bridge.register(PrivateKeyToKeystore);
    bridge.register(AddressFromPrivateKey);
    bridge.register(SignMessage);
    bridge.register(VerifyMessage);
    bridge.register(VerifyMessageSignature);
    bridge.register(HashMessage);
    bridge.register(ChainId);
    bridge.register(EthBalance);
    bridge.register(Erc20Balance);
    bridge.register(GasPrice);
    bridge.register(SuggestedFees);
    bridge.register(EstimateEthTransfer);
    bridge.register(EstimateErc20Transfer);
    bridge.register(EthTransfer);
    bridge.register(Erc20Transfer);
}

/// Account payload returned by generation and import
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOutput {
    pub address: String,
    pub private_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystore: Option<String>,
}

impl From<AccountInfo> for AccountOutput {
    fn from(info: AccountInfo) -> Self {
        let wallet = info.account.wallet();
        Self {
            address: wallet.address_string(),
            private_key: wallet.export_private_key().expose_secret().to_string(),
            mnemonic: info
                .account
                .mnemonic()
                .map(|m| m.expose_secret().to_string()),
            keystore: info.keystore,
        }
    }
}

// Key & account management

#[derive(Debug, Deserialize)]
pub struct PasswordParams {
    #[serde(default)]
    pub password: Option<SecretString>,
}

pub struct GenerateAccount;

#[async_trait]
impl BridgeHandler for GenerateAccount {
    const NAME: &'static str = operations::GENERATE_ACCOUNT;
    type Input = PasswordParams;
    type Output = AccountOutput;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine.generate_account(input.password).await.map(Into::into)
    }
}

#[derive(Debug, Deserialize)]
pub struct MnemonicParams {
    pub mnemonic: SecretString,
    #[serde(default)]
    pub password: Option<SecretString>,
}

pub struct ImportFromMnemonic;

#[async_trait]
impl BridgeHandler for ImportFromMnemonic {
    const NAME: &'static str = operations::IMPORT_FROM_MNEMONIC;
    type Input = MnemonicParams;
    type Output = AccountOutput;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine
            .import_from_mnemonic(input.mnemonic, input.password)
            .await
            .map(Into::into)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeyParams {
    pub private_key: SecretString,
    #[serde(default)]
    pub password: Option<SecretString>,
}

pub struct ImportFromPrivateKey;

#[async_trait]
impl BridgeHandler for ImportFromPrivateKey {
    const NAME: &'static str = operations::IMPORT_FROM_PRIVATE_KEY;
    type Input = PrivateKeyParams;
    type Output = AccountOutput;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine
            .import_from_private_key(input.private_key, input.password)
            .await
            .map(Into::into)
    }
}

#[derive(Debug, Deserialize)]
pub struct KeystoreParams {
    pub json: String,
    pub password: SecretString,
}

pub struct ImportFromKeystore;

#[async_trait]
impl BridgeHandler for ImportFromKeystore {
    const NAME: &'static str = operations::IMPORT_FROM_KEYSTORE;
    type Input = KeystoreParams;
    type Output = AccountOutput;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine
            .import_from_keystore(input.json, input.password)
            .await
            .map(Into::into)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    pub private_key: SecretString,
    pub password: SecretString,
}

pub struct PrivateKeyToKeystore;

#[async_trait]
impl BridgeHandler for PrivateKeyToKeystore {
    const NAME: &'static str = operations::PRIVATE_KEY_TO_KEYSTORE;
    type Input = ExportParams;
    type Output = String;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine
            .export_to_keystore(input.private_key, input.password)
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOnlyParams {
    pub private_key: SecretString,
}

pub struct AddressFromPrivateKey;

#[async_trait]
impl BridgeHandler for AddressFromPrivateKey {
    const NAME: &'static str = operations::ADDRESS_FROM_PRIVATE_KEY;
    type Input = KeyOnlyParams;
    type Output = String;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine.address_from_private_key(input.private_key).await
    }
}

// Messages

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageParams {
    pub private_key: SecretString,
    pub message: String,
}

pub struct SignMessage;

#[async_trait]
impl BridgeHandler for SignMessage {
    const NAME: &'static str = operations::SIGN_MESSAGE;
    type Input = SignMessageParams;
    type Output = String;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine.sign_message(input.private_key, &input.message).await
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub message: String,
    pub signature: String,
}

pub struct VerifyMessage;

#[async_trait]
impl BridgeHandler for VerifyMessage {
    const NAME: &'static str = operations::VERIFY_MESSAGE;
    type Input = VerifyParams;
    type Output = String;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine
            .recover_signer(&input.message, &input.signature)
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignatureParams {
    pub message: String,
    pub signature: String,
    pub expected_address: String,
}

pub struct VerifyMessageSignature;

#[async_trait]
impl BridgeHandler for VerifyMessageSignature {
    const NAME: &'static str = operations::VERIFY_MESSAGE_SIGNATURE;
    type Input = VerifySignatureParams;
    type Output = bool;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        Ok(engine
            .verify_signer(&input.message, &input.signature, &input.expected_address)
            .await)
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageParams {
    pub message: String,
}

pub struct HashMessage;

#[async_trait]
impl BridgeHandler for HashMessage {
    const NAME: &'static str = operations::HASH_MESSAGE;
    type Input = MessageParams;
    type Output = String;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        Ok(engine.hash_message(&input.message).await)
    }
}

// Chain reads

pub struct ChainId;

#[async_trait]
impl BridgeHandler for ChainId {
    const NAME: &'static str = operations::CHAIN_ID;
    type Input = EndpointParams;
    type Output = String;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        let chain_id = engine.chain_id(&input.endpoint()?).await?;
        Ok(chain_id.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct BalanceParams {
    pub address: String,
    #[serde(flatten)]
    pub endpoint: EndpointParams,
}

pub struct EthBalance;

#[async_trait]
impl BridgeHandler for EthBalance {
    const NAME: &'static str = operations::ETH_BALANCE;
    type Input = BalanceParams;
    type Output = String;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine
            .native_balance(&input.address, &input.endpoint.endpoint()?)
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceParams {
    pub token_address: String,
    pub wallet_address: String,
    #[serde(flatten)]
    pub endpoint: EndpointParams,
}

pub struct Erc20Balance;

#[async_trait]
impl BridgeHandler for Erc20Balance {
    const NAME: &'static str = operations::ERC20_BALANCE;
    type Input = TokenBalanceParams;
    type Output = crate::chain::TokenBalance;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine
            .token_balance(
                &input.token_address,
                &input.wallet_address,
                &input.endpoint.endpoint()?,
            )
            .await
    }
}

pub struct GasPrice;

#[async_trait]
impl BridgeHandler for GasPrice {
    const NAME: &'static str = operations::GAS_PRICE;
    type Input = EndpointParams;
    type Output = crate::chain::GasPriceQuote;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine.gas_price(&input.endpoint()?).await
    }
}

pub struct SuggestedFees;

#[async_trait]
impl BridgeHandler for SuggestedFees {
    const NAME: &'static str = operations::SUGGESTED_FEES;
    type Input = EndpointParams;
    type Output = Value;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        // Pre-London chains get an empty object
        match engine.suggested_fees(&input.endpoint()?).await? {
            Some(fees) => Ok(serde_json::to_value(fees)?),
            None => Ok(json!({})),
        }
    }
}

// Transactions

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateEthParams {
    pub from_address: String,
    pub to: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value_eth: String,
    #[serde(flatten)]
    pub endpoint: EndpointParams,
}

pub struct EstimateEthTransfer;

#[async_trait]
impl BridgeHandler for EstimateEthTransfer {
    const NAME: &'static str = operations::ESTIMATE_ETH_TRANSFER;
    type Input = EstimateEthParams;
    type Output = FeeQuote;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine
            .estimate_transfer_gas(
                &input.from_address,
                &input.to,
                &input.value_eth,
                Asset::Native,
                &input.endpoint.endpoint()?,
            )
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateErc20Params {
    pub from_address: String,
    pub token_address: String,
    pub to: String,
    #[serde(deserialize_with = "string_or_number")]
    pub amount_human: String,
    #[serde(deserialize_with = "u8_from_any")]
    pub decimals: u8,
    #[serde(flatten)]
    pub endpoint: EndpointParams,
}

pub struct EstimateErc20Transfer;

#[async_trait]
impl BridgeHandler for EstimateErc20Transfer {
    const NAME: &'static str = operations::ESTIMATE_ERC20_TRANSFER;
    type Input = EstimateErc20Params;
    type Output = FeeQuote;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        let asset = Asset::Token {
            contract: parse_address(&input.token_address, "tokenAddress")?,
            decimals: input.decimals,
        };
        engine
            .estimate_transfer_gas(
                &input.from_address,
                &input.to,
                &input.amount_human,
                asset,
                &input.endpoint.endpoint()?,
            )
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthTransferParams {
    pub private_key: SecretString,
    pub to: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value_eth: String,
    #[serde(flatten)]
    pub overrides: OverrideParams,
    #[serde(flatten)]
    pub endpoint: EndpointParams,
}

pub struct EthTransfer;

#[async_trait]
impl BridgeHandler for EthTransfer {
    const NAME: &'static str = operations::ETH_TRANSFER;
    type Input = EthTransferParams;
    type Output = TransactionResult;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        engine
            .transfer(
                input.private_key,
                &input.to,
                &input.value_eth,
                Asset::Native,
                input.overrides.parse()?,
                &input.endpoint.endpoint()?,
            )
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc20TransferParams {
    pub private_key: SecretString,
    pub token_address: String,
    pub to: String,
    #[serde(deserialize_with = "string_or_number")]
    pub amount_human: String,
    #[serde(deserialize_with = "u8_from_any")]
    pub decimals: u8,
    #[serde(flatten)]
    pub overrides: OverrideParams,
    #[serde(flatten)]
    pub endpoint: EndpointParams,
}

pub struct Erc20Transfer;

#[async_trait]
impl BridgeHandler for Erc20Transfer {
    const NAME: &'static str = operations::ERC20_TRANSFER;
    type Input = Erc20TransferParams;
    type Output = TransactionResult;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output> {
        let asset = Asset::Token {
            contract: parse_address(&input.token_address, "tokenAddress")?,
            decimals: input.decimals,
        };
        engine
            .transfer(
                input.private_key,
                &input.to,
                &input.amount_human,
                asset,
                input.overrides.parse()?,
                &input.endpoint.endpoint()?,
            )
            .await
    }
}
