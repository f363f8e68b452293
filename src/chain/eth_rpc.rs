//! Ethereum JSON-RPC source chain
//!
//! Talks to an Anvil/Geth node. Writes go through `eth_sendTransaction`, so
//! the configured `sender` must be an account the node can sign for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::error::ChainError;
use super::{EventFilter, SourceChain};
use crate::config::SourceChainConfig;
use crate::core_types::{Amount, BlockHeight};
use crate::eth::abi;
use crate::eth::primitives::hex_u64;
use crate::eth::{Address, Block, Bytes, H256, Log, Quantity, Receipt, decode_hex};

const UNKNOWN_REVERT: &str = "Transaction reverted without a reason";

/// JSON-RPC request structure
#[derive(Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcError {
    /// Reason carried by an `eth_call` revert. Nodes put the ABI-encoded
    /// `Error(string)` payload either directly in `data` or one level down.
    fn revert_reason(&self) -> String {
        let payload = match &self.data {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Object(map)) => map.get("data").and_then(Value::as_str),
            _ => None,
        };

        payload
            .and_then(|hex| decode_hex(hex).ok())
            .and_then(|bytes| abi::decode_revert_reason(&bytes))
            .unwrap_or_else(|| {
                self.message
                    .strip_prefix("execution reverted: ")
                    .unwrap_or(&self.message)
                    .to_string()
            })
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

/// Subset of `eth_getTransactionByHash` needed to replay a call.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    from: Address,
    to: Option<Address>,
    input: Bytes,
    value: Quantity,
    gas: Quantity,
    #[serde(default, with = "hex_u64::option")]
    block_number: Option<u64>,
}

/// Source chain backed by an Ethereum JSON-RPC endpoint
pub struct EthRpcClient {
    config: SourceChainConfig,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl EthRpcClient {
    pub fn new(config: SourceChainConfig) -> Result<Self, ChainError> {
        info!(
            url = %config.rpc_url,
            token = %config.token_address,
            locker = %config.locker_address,
            "Initializing Ethereum RPC client"
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChainError::RpcConnection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &SourceChainConfig {
        &self.config
    }

    async fn send<T, R>(&self, method: &'static str, params: T) -> Result<JsonRpcResponse<R>, ChainError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        debug!(method, "RPC call");
        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::RpcConnection(format!("HTTP request failed: {}", e)))?;

        response
            .json()
            .await
            .map_err(|e| ChainError::Parse(format!("Failed to parse {} response: {}", method, e)))
    }

    /// JSON-RPC call where a `null` result is meaningful (unknown hash,
    /// unmined transaction).
    async fn rpc_call_nullable<T, R>(&self, method: &'static str, params: T) -> Result<Option<R>, ChainError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let response: JsonRpcResponse<R> = self.send(method, params).await?;
        if let Some(error) = response.error {
            return Err(ChainError::Rejected(error.to_string()));
        }
        Ok(response.result)
    }

    async fn rpc_call<T, R>(&self, method: &'static str, params: T) -> Result<R, ChainError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        self.rpc_call_nullable(method, params)
            .await?
            .ok_or_else(|| ChainError::Parse(format!("No result in {} response", method)))
    }

    fn sender(&self) -> Result<Address, ChainError> {
        self.config
            .sender
            .ok_or_else(|| ChainError::Config("source.sender is not configured".to_string()))
    }

    async fn send_transaction(&self, to: Address, data: Vec<u8>) -> Result<H256, ChainError> {
        let from = self.sender()?;
        let tx = json!({
            "from": from,
            "to": to,
            "data": Bytes(data),
        });
        self.rpc_call("eth_sendTransaction", [tx]).await
    }
}

#[async_trait]
impl SourceChain for EthRpcClient {
    fn name(&self) -> &'static str {
        "ethereum"
    }

    async fn approve(&self, amount: Amount) -> Result<H256, ChainError> {
        let data = abi::encode_approve(&self.config.locker_address, amount);
        let hash = self.send_transaction(self.config.token_address, data).await?;
        info!(tx_hash = %hash, amount = %amount, "Approval sent");
        Ok(hash)
    }

    async fn lock(&self, amount: Amount, recipient: &str) -> Result<H256, ChainError> {
        let data = abi::encode_lock_token(amount, recipient);
        let hash = self.send_transaction(self.config.locker_address, data).await?;
        info!(tx_hash = %hash, amount = %amount, recipient, "Lock sent");
        Ok(hash)
    }

    async fn get_receipt(&self, tx_hash: &H256) -> Result<Option<Receipt>, ChainError> {
        self.rpc_call_nullable("eth_getTransactionReceipt", [tx_hash]).await
    }

    async fn get_block(&self, number: BlockHeight) -> Result<Option<Block>, ChainError> {
        self.rpc_call_nullable("eth_getBlockByNumber", (format!("0x{:x}", number), false))
            .await
    }

    /// Replays the transaction with `eth_call` at its own block and decodes
    /// the `Error(string)` payload of the resulting revert.
    async fn get_revert_reason(&self, tx_hash: &H256) -> Result<String, ChainError> {
        let tx: RpcTransaction = self
            .rpc_call_nullable("eth_getTransactionByHash", [tx_hash])
            .await?
            .ok_or_else(|| ChainError::Rejected(format!("Transaction {} not found", tx_hash)))?;

        let call = json!({
            "from": tx.from,
            "to": tx.to,
            "data": tx.input,
            "value": tx.value,
            "gas": tx.gas,
        });
        let block = tx
            .block_number
            .map(|n| format!("0x{:x}", n))
            .unwrap_or_else(|| "latest".to_string());

        let response: JsonRpcResponse<Bytes> = self.send("eth_call", (call, block)).await?;
        let reason = match response.error {
            Some(error) => error.revert_reason(),
            None => {
                warn!(tx_hash = %tx_hash, "Replay of reverted transaction succeeded");
                response
                    .result
                    .and_then(|output| abi::decode_revert_reason(output.as_slice()))
                    .unwrap_or_else(|| UNKNOWN_REVERT.to_string())
            }
        };
        Ok(reason)
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<Log>, ChainError> {
        let params = json!({
            "address": filter.address,
            "topics": [filter.topic0],
            "fromBlock": format!("0x{:x}", filter.from_block),
            "toBlock": format!("0x{:x}", filter.to_block),
        });
        let mut logs: Vec<Log> = self.rpc_call("eth_getLogs", [params]).await?;

        // eth_getLogs has no transaction filter
        if let Some(tx_hash) = filter.transaction_hash {
            logs.retain(|log| log.transaction_hash == Some(tx_hash));
        }
        Ok(logs)
    }
}
