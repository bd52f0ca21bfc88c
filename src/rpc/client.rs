//! JSON-RPC 2.0 client for a single node.
//!
//! # Responsibilities
//! - Frame requests and unwrap `result` / `error` envelopes
//! - Typed helpers for the methods the client consumes
//! - Liveness ping used by endpoint discovery

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::net::Transport;
use crate::tx::types::Transaction;
use crate::types::{Hash256, KazeError, KazeResult, ScriptHash};
use crate::wallet::fixed8::Fixed8;

const REQUEST_ID: u64 = 1234;

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Unspent output as reported by `gettxout`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TxOut {
    pub n: u16,
    pub asset: Hash256,
    pub value: Fixed8,
    pub address: String,
}

/// Subset of `getcontractstate` the client needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractState {
    pub hash: ScriptHash,
    pub script: Vec<u8>,
}

/// Result of a read-only `invokescript`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvokeResult {
    pub state: String,
    #[serde(default)]
    pub gas_consumed: Option<Fixed8>,
    #[serde(default)]
    pub stack: Vec<StackItem>,
}

impl InvokeResult {
    /// The VM stopped on a fault instead of halting.
    pub fn faulted(&self) -> bool {
        self.state.contains("FAULT")
    }
}

/// One VM stack entry: `{type, value}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StackItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct RpcClient<T> {
    transport: T,
    url: String,
}

impl<T: Transport> RpcClient<T> {
    pub fn new(transport: T, url: impl Into<String>) -> Self {
        Self { transport, url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call(&self, method: &str, params: Vec<Value>) -> KazeResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": REQUEST_ID,
        });
        let raw = self.transport.post_json(&self.url, &body).await?;
        let response: RpcResponse = serde_json::from_value(raw)
            .map_err(|e| KazeError::UnexpectedResponse(format!("{} envelope: {}", method, e)))?;

        if let Some(err) = response.error {
            tracing::debug!(url = %self.url, method, code = err.code, "RPC error");
            return Err(KazeError::Rpc { code: err.code, message: err.message });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    pub async fn get_block_count(&self) -> KazeResult<u64> {
        let result = self.call("getblockcount", vec![]).await?;
        result
            .as_u64()
            .ok_or_else(|| KazeError::UnexpectedResponse(format!("getblockcount returned {}", result)))
    }

    /// Round-trip latency of a `getblockcount` call.
    pub async fn ping(&self) -> KazeResult<Duration> {
        let start = Instant::now();
        self.get_block_count().await?;
        Ok(start.elapsed())
    }

    /// Submit a signed transaction. `Ok(false)` means the node refused it.
    pub async fn send_raw_transaction(&self, tx: &Transaction) -> KazeResult<bool> {
        let result = self.call("sendrawtransaction", vec![Value::String(tx.to_hex())]).await?;
        result
            .as_bool()
            .ok_or_else(|| KazeError::UnexpectedResponse(format!("sendrawtransaction returned {}", result)))
    }

    pub async fn get_contract_state(&self, hash: &ScriptHash) -> KazeResult<ContractState> {
        let result = self
            .call("getcontractstate", vec![Value::String(hash.to_be_hex())])
            .await?;
        let script = result
            .get("script")
            .and_then(Value::as_str)
            .ok_or(KazeError::MissingField("script"))?;
        let script = hex::decode(script)
            .map_err(|e| KazeError::UnexpectedResponse(format!("contract script is not hex: {}", e)))?;
        Ok(ContractState { hash: *hash, script })
    }

    /// Run `script` on the node without persisting anything.
    pub async fn invoke_script(&self, script: &[u8]) -> KazeResult<InvokeResult> {
        let result = self.call("invokescript", vec![Value::String(hex::encode(script))]).await?;
        serde_json::from_value(result).map_err(|e| KazeError::UnexpectedResponse(format!("invokescript: {}", e)))
    }

    /// `None` when the output is spent or unknown to the node.
    pub async fn get_tx_out(&self, txid: &Hash256, index: u16) -> KazeResult<Option<TxOut>> {
        let result = self
            .call("gettxout", vec![Value::String(txid.to_be_hex()), json!(index)])
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| KazeError::UnexpectedResponse(format!("gettxout: {}", e)))
    }
}
