//! Request/response bridge over the wallet engine
//!
//! A caller names an operation and passes a JSON parameter object; the
//! bridge answers with an [`Envelope`]. Handlers implement
//! [`BridgeHandler`] and are registered by operation name. Nothing is
//! dispatched until [`Bridge::finish_load`] has run.

pub mod audit;
mod envelope;
mod handlers;
mod params;

use crate::engine::WalletEngine;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub use audit::AuditLogInterceptor;
pub use envelope::Envelope;
pub use handlers::AccountOutput;

/// Operation names, as bridge callers send them
pub mod operations {
    pub const GENERATE_ACCOUNT: &str = "generateAccount";
    pub const IMPORT_FROM_MNEMONIC: &str = "importAccountFromMnemonic";
    pub const IMPORT_FROM_PRIVATE_KEY: &str = "importAccountFromPrivateKey";
    pub const IMPORT_FROM_KEYSTORE: &str = "importAccountFromKeystore";
    pub const PRIVATE_KEY_TO_KEYSTORE: &str = "privateKeyToKeystore";
    pub const ADDRESS_FROM_PRIVATE_KEY: &str = "getAddressFromPrivateKey";
    pub const SIGN_MESSAGE: &str = "signMessage";
    pub const VERIFY_MESSAGE: &str = "verifyMessage";
    pub const VERIFY_MESSAGE_SIGNATURE: &str = "verifyMessageSignature";
    pub const HASH_MESSAGE: &str = "hashMessage";
    pub const CHAIN_ID: &str = "getChainId";
    pub const ETH_BALANCE: &str = "getETHBalance";
    pub const ERC20_BALANCE: &str = "getERC20TokenBalance";
    pub const GAS_PRICE: &str = "getGasPrice";
    pub const SUGGESTED_FEES: &str = "getSuggestedFees";
    pub const ESTIMATE_ETH_TRANSFER: &str = "estimateEthTransferGas";
    pub const ESTIMATE_ERC20_TRANSFER: &str = "estimateErc20TransferGas";
    pub const ETH_TRANSFER: &str = "ethTransfer";
    pub const ERC20_TRANSFER: &str = "erc20Transfer";
}

/// One bridge operation with typed parameters and result
#[async_trait]
pub trait BridgeHandler: Send + Sync + 'static {
    const NAME: &'static str;
    type Input: DeserializeOwned + Send;
    type Output: Serialize + Send;

    async fn execute(&self, engine: &WalletEngine, input: Self::Input) -> Result<Self::Output>;
}

/// What an interceptor sees of a call
#[derive(Debug, Clone)]
pub struct CallContext {
    pub operation: String,
    pub params: Value,
}

/// Observes calls on their way through the bridge
#[async_trait]
pub trait CallInterceptor: Send + Sync {
    async fn before_call(&self, context: &CallContext);

    async fn after_call(&self, context: &CallContext, result: &Result<Value>, duration_ms: u64);
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn call(&self, engine: &WalletEngine, params: Value) -> Result<Value>;
}

struct Erased<H>(H);

#[async_trait]
impl<H: BridgeHandler> ErasedHandler for Erased<H> {
    async fn call(&self, engine: &WalletEngine, params: Value) -> Result<Value> {
        // Absent params decode like an empty object
        let params = match params {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let input: H::Input = serde_json::from_value(params)
            .map_err(|e| Error::invalid(format!("invalid params for {}: {}", H::NAME, e)))?;
        let output = self.0.execute(engine, input).await?;
        Ok(serde_json::to_value(output)?)
    }
}

pub struct Bridge {
    engine: WalletEngine,
    handlers: HashMap<&'static str, Box<dyn ErasedHandler>>,
    interceptors: Vec<Arc<dyn CallInterceptor>>,
    ready: AtomicBool,
}

impl Bridge {
    /// A bridge with every wallet operation registered
    pub fn new(engine: WalletEngine) -> Self {
        let mut bridge = Self {
            engine,
            handlers: HashMap::new(),
            interceptors: Vec::new(),
            ready: AtomicBool::new(false),
        };
        handlers::register_all(&mut bridge);
        bridge
    }

    pub fn register<H: BridgeHandler>(&mut self, handler: H) {
        if self.handlers.insert(H::NAME, Box::new(Erased(handler))).is_some() {
            warn!(operation = H::NAME, "replaced existing bridge handler");
        }
    }

    pub fn with_interceptor(mut self, interceptor: impl CallInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Mark the bridge ready; calls made before this are rejected
    pub fn finish_load(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            info!(operations = self.handlers.len(), "bridge loaded");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn operations(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn engine(&self) -> &WalletEngine {
        &self.engine
    }

    /// Run an operation and wrap the outcome in an envelope
    pub async fn call(&self, operation: &str, params: Value) -> Envelope {
        Envelope::from_result(self.dispatch(operation, params).await)
    }

    /// Run an operation, returning the raw result
    pub async fn dispatch(&self, operation: &str, params: Value) -> Result<Value> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        let handler = self
            .handlers
            .get(operation)
            .ok_or_else(|| Error::UnknownOperation(operation.to_string()))?;

        let context = CallContext {
            operation: operation.to_string(),
            params,
        };
        for interceptor in &self.interceptors {
            interceptor.before_call(&context).await;
        }

        let started = Instant::now();
        let result = handler.call(&self.engine, context.params.clone()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        for interceptor in &self.interceptors {
            interceptor.after_call(&context, &result, duration_ms).await;
        }

        match &result {
            Ok(_) => debug!(operation, duration_ms, "bridge call succeeded"),
            Err(e) => warn!(operation, duration_ms, kind = ?e.kind(), error = %e, "bridge call failed"),
        }
        result
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("operations", &self.operations())
            .field("interceptors", &self.interceptors.len())
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn ready_bridge() -> Bridge {
        let bridge = Bridge::new(WalletEngine::default());
        bridge.finish_load();
        bridge
    }

    #[tokio::test]
    async fn rejects_calls_before_finish_load() {
        let bridge = Bridge::new(WalletEngine::default());
        let envelope = bridge
            .call(
                operations::ADDRESS_FROM_PRIVATE_KEY,
                json!({ "privateKey": TEST_KEY }),
            )
            .await;
        assert!(!envelope.state);
        assert!(envelope.error.unwrap().contains("FinishLoad"));

        bridge.finish_load();
        let envelope = bridge
            .call(
                operations::ADDRESS_FROM_PRIVATE_KEY,
                json!({ "privateKey": TEST_KEY }),
            )
            .await;
        assert!(envelope.state);
        assert_eq!(envelope.result, Some(json!(TEST_ADDRESS)));
    }

    #[tokio::test]
    async fn unknown_operation_is_an_error_envelope() {
        let envelope = ready_bridge().call("mintMoney", json!({})).await;
        assert!(!envelope.state);
        assert_eq!(
            envelope.error.as_deref(),
            Some("Unknown operation: mintMoney")
        );
    }

    #[tokio::test]
    async fn malformed_params_are_invalid_input() {
        let bridge = ready_bridge();

        let err = bridge
            .dispatch(operations::SIGN_MESSAGE, json!({ "message": "gm" }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = bridge
            .dispatch(operations::SIGN_MESSAGE, Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = bridge
            .dispatch(operations::SIGN_MESSAGE, json!("not an object"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn registers_every_operation() {
        let bridge = ready_bridge();
        let names = bridge.operations();
        assert_eq!(names.len(), 19);
        for name in [
            operations::GENERATE_ACCOUNT,
            operations::IMPORT_FROM_KEYSTORE,
            operations::VERIFY_MESSAGE_SIGNATURE,
            operations::SUGGESTED_FEES,
            operations::ERC20_TRANSFER,
        ] {
            assert!(names.contains(&name), "missing {}", name);
        }
    }

    struct Counting {
        before: Arc<AtomicUsize>,
        after: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CallInterceptor for Counting {
        async fn before_call(&self, _context: &CallContext) {
            self.before.fetch_add(1, Ordering::SeqCst);
        }

        async fn after_call(&self, _context: &CallContext, _result: &Result<Value>, _ms: u64) {
            self.after.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn interceptors_see_dispatched_calls_only() {
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let bridge = Bridge::new(WalletEngine::default()).with_interceptor(Counting {
            before: before.clone(),
            after: after.clone(),
        });

        // Not ready yet, so nothing reaches the interceptor
        bridge.call(operations::HASH_MESSAGE, json!({ "message": "a" })).await;
        bridge.finish_load();
        bridge.call(operations::HASH_MESSAGE, json!({ "message": "a" })).await;
        bridge.call("nope", json!({})).await;

        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }
}
