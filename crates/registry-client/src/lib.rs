//! registry-client: Typed boundary to the token time-lock registry
//!
//! Reads go through `eth_call`, writes through `eth_sendTransaction` on a
//! wallet-backed JSON-RPC endpoint. Every write suspends the caller until its
//! transaction receipt is available.

pub mod abi;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod rpc;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use serde_json::{json, Value};
use tokenlock_core::{
    Address, AppConfig, ConfirmationConfig, Error, Lock, LockIndex, RegistryError, TxHash,
    TxReceipt, UnixSeconds,
};

pub use rpc::RpcClient;
pub use session::{SessionHandle, WalletSession};

/// Result type for registry client operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Operations the lock lifecycle needs from the registry.
///
/// Implementations map every failure into [`RegistryError`] and only return
/// from a write once it is confirmed.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Registry contract address, the spender for authorizations
    fn registry_address(&self) -> &Address;

    /// Address of the connected signing identity
    async fn account(&self) -> Result<Address>;

    /// All locks of `owner`, in registry order
    async fn list_locks(&self, owner: &Address) -> Result<Vec<Lock>>;

    /// Allow `spender` to pull `amount` of `token` from the caller
    async fn authorize_transfer(
        &self,
        token: &Address,
        spender: &Address,
        amount: &BigUint,
    ) -> Result<TxReceipt>;

    /// Deposit `amount` of `token` until `unlock_time`
    async fn create_lock(
        &self,
        token: &Address,
        amount: &BigUint,
        unlock_time: UnixSeconds,
    ) -> Result<TxReceipt>;

    /// Withdraw the caller's lock at `index`
    async fn withdraw(&self, index: LockIndex) -> Result<TxReceipt>;
}

/// Registry client over JSON-RPC
#[derive(Clone)]
pub struct RegistryClient {
    rpc: Arc<RpcClient>,
    session: SessionHandle,
    registry: Address,
    confirmations: ConfirmationConfig,
}

impl RegistryClient {
    /// Create a client for the configured endpoint and registry contract
    pub fn new(config: &AppConfig, session: SessionHandle) -> std::result::Result<Self, Error> {
        let registry = Address::parse(&config.rpc.registry_address)?;
        let rpc = RpcClient::new(
            config.rpc.url.clone(),
            Duration::from_secs(config.rpc.request_timeout_secs),
        )?;

        Ok(Self {
            rpc: Arc::new(rpc),
            session,
            registry,
            confirmations: config.confirmations.clone(),
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Ask the endpoint for an account and connect the first one returned
    pub async fn request_accounts(&self) -> Result<Address> {
        let result = self.rpc.call("eth_requestAccounts", json!([])).await?;
        let first = result
            .as_array()
            .and_then(|accounts| accounts.first())
            .and_then(|a| a.as_str())
            .ok_or_else(|| RegistryError::connection("wallet returned no accounts"))?;

        let address = Address::parse(first)
            .map_err(|e| RegistryError::connection(format!("wallet returned {}", e)))?;
        self.session.connect(address.clone()).await;
        Ok(address)
    }

    /// Submit a transaction from the session account and wait for its receipt
    async fn send_transaction(&self, to: &Address, data: Vec<u8>) -> Result<TxReceipt> {
        let session = self.session.require().await?;
        let params = json!([{
            "from": session.address.as_str(),
            "to": to.as_str(),
            "data": abi::to_hex_data(&data),
        }]);

        let result = self.rpc.call("eth_sendTransaction", params).await?;
        let tx_hash = result
            .as_str()
            .map(TxHash::new)
            .ok_or_else(|| RegistryError::remote_call("eth_sendTransaction returned no hash"))?;

        tracing::info!(tx_hash = %tx_hash, to = %to, "Transaction submitted");
        self.wait_for_receipt(&tx_hash).await
    }

    /// Poll for the receipt until it appears or the confirmation timeout hits
    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<TxReceipt> {
        let poll = Duration::from_millis(self.confirmations.poll_interval_ms);
        let limit = Duration::from_secs(self.confirmations.timeout_secs);

        let wait = async {
            loop {
                // The transaction is already submitted, so a failed poll only
                // means the receipt is not known yet
                match self
                    .rpc
                    .call("eth_getTransactionReceipt", json!([tx_hash.as_str()]))
                    .await
                {
                    Ok(value) => {
                        if let Some(receipt) = parse_receipt(tx_hash, &value)? {
                            return Ok::<TxReceipt, RegistryError>(receipt);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                    }
                }
                tokio::time::sleep(poll).await;
            }
        };

        let receipt = tokio::time::timeout(limit, wait).await.map_err(|_| {
            RegistryError::remote_call(format!(
                "transaction {} not confirmed after {}s",
                tx_hash,
                limit.as_secs()
            ))
        })??;

        tracing::info!(
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            "Transaction confirmed"
        );
        Ok(receipt)
    }
}

#[async_trait]
impl Registry for RegistryClient {
    fn registry_address(&self) -> &Address {
        &self.registry
    }

    async fn account(&self) -> Result<Address> {
        Ok(self.session.require().await?.address)
    }

    async fn list_locks(&self, owner: &Address) -> Result<Vec<Lock>> {
        self.session.require().await?;

        let params = json!([{
            "to": self.registry.as_str(),
            "data": abi::to_hex_data(&abi::encode_get_locks(owner)),
        }, "latest"]);
        let result = self.rpc.call("eth_call", params).await?;
        let data = result
            .as_str()
            .ok_or_else(|| RegistryError::remote_call("eth_call returned no data"))?;

        let locks = abi::decode_locks(&abi::from_hex_data(data)?)?;
        tracing::debug!(owner = %owner, count = locks.len(), "Fetched locks");
        Ok(locks)
    }

    async fn authorize_transfer(
        &self,
        token: &Address,
        spender: &Address,
        amount: &BigUint,
    ) -> Result<TxReceipt> {
        let data = abi::encode_approve(spender, amount)?;
        self.send_transaction(token, data).await
    }

    async fn create_lock(
        &self,
        token: &Address,
        amount: &BigUint,
        unlock_time: UnixSeconds,
    ) -> Result<TxReceipt> {
        let data = abi::encode_lock(token, amount, unlock_time)?;
        self.send_transaction(&self.registry, data).await
    }

    async fn withdraw(&self, index: LockIndex) -> Result<TxReceipt> {
        let data = abi::encode_withdraw(index);
        self.send_transaction(&self.registry, data).await
    }
}

/// Interpret an `eth_getTransactionReceipt` result. `None` while pending.
pub fn parse_receipt(tx_hash: &TxHash, value: &Value) -> Result<Option<TxReceipt>> {
    if value.is_null() {
        return Ok(None);
    }

    let block_number = match value["blockNumber"].as_str() {
        Some(hex) => parse_quantity(hex)?,
        // Some nodes return a receipt object for pending transactions
        None => return Ok(None),
    };

    match value["status"].as_str() {
        Some(status) if parse_quantity(status)? == 0 => Err(RegistryError::remote_call(format!(
            "transaction {} reverted",
            tx_hash
        ))),
        _ => Ok(Some(TxReceipt {
            tx_hash: tx_hash.clone(),
            block_number,
        })),
    }
}

/// Parse a `0x`-prefixed hex quantity
fn parse_quantity(hex: &str) -> Result<u64> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    u64::from_str_radix(digits, 16)
        .map_err(|e| RegistryError::remote_call(format!("invalid quantity {}: {}", hex, e)))
}
