//! Minimal typed JSON-RPC client for the EVM node (reqwest).
//!
//! Transport-only: no chain semantics, and deliberately **no automatic
//! retries** — the bounded receipt polling loop in the submitter is the only
//! wait/retry behavior of the whole submission path. JSON-RPC errors are
//! surfaced with their `data` field intact because contract revert payloads
//! and domain tokens travel there.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use num_bigint::BigUint;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result, RpcErrorObj};
use crate::types::{Address, ChainId, Hex};
use crate::utils::bytes::{hex_prefixed, parse_quantity, parse_quantity_big};

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// `eth_estimateGas` / `eth_call` request object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub data: Hex,
}

/// Log entry of a mined transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<Hex>,
    #[serde(default)]
    pub data: Hex,
}

/// Transaction receipt, reduced to the fields the submitter needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: Hex,
    /// `"0x1"` = success. Pre-Byzantium nodes may omit it.
    #[serde(default)]
    pub status: Option<Hex>,
    /// Structured revert reason, when the node exposes one.
    #[serde(default)]
    pub revert_reason: Option<String>,
    #[serde(default)]
    pub logs: Vec<RpcLog>,
}

impl TxReceipt {
    pub fn is_ok(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1") | Some("0x01"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockHeader {
    #[serde(default)]
    base_fee_per_gas: Option<Hex>,
}

/// Builder for [`EvmRpcClient`].
#[derive(Clone, Debug)]
pub struct EvmRpcClientBuilder {
    endpoint: Url,
    timeout: Duration,
    connect_timeout: Duration,
    pool_max_idle: usize,
}

impl EvmRpcClientBuilder {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle: 5,
        }
    }

    pub fn from_str(endpoint: &str) -> Result<Self> {
        Ok(Self::new(endpoint.parse::<Url>()?))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle = max;
        self
    }

    pub fn build(self) -> Result<EvmRpcClient> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.pool_max_idle)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| Error::Transport(format!("http client build: {e}")))?;
        Ok(EvmRpcClient { endpoint: self.endpoint, client, id: AtomicU64::new(1) })
    }
}

/// Async JSON-RPC client bound to one EVM endpoint.
#[derive(Debug)]
pub struct EvmRpcClient {
    endpoint: Url,
    client: Client,
    id: AtomicU64,
}

impl EvmRpcClient {
    /// Quick constructor with defaults.
    pub fn new(endpoint: &str) -> Result<Self> {
        EvmRpcClientBuilder::from_str(endpoint)?.build()
    }

    pub fn builder(endpoint: &str) -> Result<EvmRpcClientBuilder> {
        EvmRpcClientBuilder::from_str(endpoint)
    }

    /// Perform a typed JSON-RPC call. One shot, no retries. A `null` result
    /// is an error here; use [`call_opt`](Self::call_opt) for methods where
    /// `null` means absence.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        match self.call_raw(method, params).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::RpcResponse(format!("decode {method}: {e}"))),
            None => Err(Error::RpcResponse(format!("{method}: missing result and error"))),
        }
    }

    /// Like [`call`](Self::call), but maps a `null`/absent result to `None`
    /// (e.g. `eth_getTransactionReceipt` before the transaction is mined).
    pub async fn call_opt<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>> {
        match self.call_raw(method, params).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::RpcResponse(format!("decode {method}: {e}"))),
            None => Ok(None),
        }
    }

    async fn call_raw(&self, method: &str, params: Value) -> Result<Option<Value>> {
        let req = RpcRequest {
            jsonrpc: "2.0",
            id: self.id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("rpc send: {e}")))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("rpc read body: {e}")))?;
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let parsed: RpcResponse<Value> = serde_json::from_slice(&bytes)
            .map_err(|e| Error::RpcResponse(format!("decode {method}: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(Error::Rpc(RpcErrorObj::new(err.code, err.message, err.data)));
        }
        Ok(parsed.result.filter(|v| !v.is_null()))
    }

    // ------------------------- typed eth_ methods ----------------------------

    pub async fn chain_id(&self) -> Result<ChainId> {
        let q: Hex = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&q)
    }

    /// Account nonce including pending transactions.
    pub async fn transaction_count_pending(&self, address: &str) -> Result<u64> {
        let q: Hex = self
            .call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_quantity(&q)
    }

    /// Node-suggested priority fee (EIP-1559 tip).
    pub async fn max_priority_fee_per_gas(&self) -> Result<BigUint> {
        let q: Hex = self.call("eth_maxPriorityFeePerGas", json!([])).await?;
        parse_quantity_big(&q)
    }

    /// Base fee of the latest block.
    pub async fn latest_base_fee(&self) -> Result<BigUint> {
        let header: BlockHeader = self
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let base = header
            .base_fee_per_gas
            .ok_or_else(|| Error::RpcResponse("latest block has no baseFeePerGas".into()))?;
        parse_quantity_big(&base)
    }

    /// Dry-run gas estimation. Errors keep the node's message and `data`.
    pub async fn estimate_gas(&self, call: &CallRequest) -> Result<BigUint> {
        let q: Hex = self
            .call("eth_estimateGas", json!([call]))
            .await?;
        parse_quantity_big(&q)
    }

    /// Broadcast a signed raw transaction; returns the transaction hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<Hex> {
        self.call("eth_sendRawTransaction", json!([hex_prefixed(raw)])).await
    }

    /// Receipt of a transaction; `None` while not yet mined.
    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>> {
        self.call_opt("eth_getTransactionReceipt", json!([tx_hash])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let b = EvmRpcClient::builder("http://localhost:8545").unwrap();
        assert_eq!(b.pool_max_idle, 5);
        b.build().unwrap();
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        assert!(EvmRpcClient::new("not a url").is_err());
    }

    #[test]
    fn receipt_status_interpretation() {
        let ok = TxReceipt {
            transaction_hash: "0x01".into(),
            status: Some("0x1".into()),
            revert_reason: None,
            logs: vec![],
        };
        assert!(ok.is_ok());
        let failed = TxReceipt { status: Some("0x0".into()), ..ok.clone() };
        assert!(!failed.is_ok());
        let unknown = TxReceipt { status: None, ..ok };
        assert!(!unknown.is_ok());
    }

    #[test]
    fn receipt_deserializes_from_node_shape() {
        let j = r#"{
            "transactionHash": "0xabc",
            "status": "0x0",
            "revertReason": "execution reverted: uem.alreadySent",
            "logs": [{"address": "0xdef", "topics": ["0x11"], "data": "0x"}]
        }"#;
        let r: TxReceipt = serde_json::from_str(j).unwrap();
        assert!(!r.is_ok());
        assert_eq!(r.revert_reason.as_deref(), Some("execution reverted: uem.alreadySent"));
        assert_eq!(r.logs.len(), 1);
    }
}
