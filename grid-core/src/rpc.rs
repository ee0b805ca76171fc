//! JSON-RPC connector for Ethereum-compatible nodes.
//!
//! The job and the status server only ever talk to the chain through the
//! [`ChainConnector`] trait. [`RpcClient`] is the HTTP implementation used in
//! production; tests substitute `testing::MockConnector`.

use alloy::primitives::{Address, Bytes, B256, U128, U64};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while talking to the node
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("Empty RPC response for {0}")]
    EmptyResult(String),
}

/// Read/write surface the rest of the workspace needs from a node.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// `eth_chainId`; doubles as the connectivity check.
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError>;

    /// `eth_getTransactionCount` at the pending block.
    async fn transaction_count(&self, account: Address) -> Result<u64, RpcError>;

    /// `eth_gasPrice` in wei.
    async fn gas_price(&self) -> Result<u128, RpcError>;

    /// `eth_sendRawTransaction`; returns the hash reported by the node.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RpcError>;

    /// `eth_getTransactionReceipt`; `None` while the transaction is pending.
    async fn transaction_receipt(&self, hash: B256)
        -> Result<Option<TransactionReceipt>, RpcError>;
}

/// The receipt fields the harness reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default, with = "alloy::serde::quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(with = "alloy::serde::quantity")]
    pub gas_used: u64,
    /// `1` on success, `0` on revert. Pre-Byzantium receipts carry a state
    /// root instead and leave this empty.
    #[serde(default, with = "alloy::serde::quantity::opt")]
    pub status: Option<u64>,
}

impl TransactionReceipt {
    /// Receipts without a status count as successful.
    pub fn succeeded(&self) -> bool {
        self.status != Some(0)
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC client
#[derive(Debug)]
pub struct RpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one request. A `null` result is returned as `None`; callers
    /// decide whether that is an error.
    async fn request<T>(&self, method: &str, params: serde_json::Value) -> Result<Option<T>, RpcError>
    where
        T: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!("RPC -> {} (id {})", method, request.id);

        let response: RpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }

    async fn request_required<T>(&self, method: &str, params: serde_json::Value) -> Result<T, RpcError>
    where
        T: DeserializeOwned,
    {
        self.request(method, params)
            .await?
            .ok_or_else(|| RpcError::EmptyResult(method.to_string()))
    }
}

#[async_trait]
impl ChainConnector for RpcClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let id: U64 = self.request_required("eth_chainId", json!([])).await?;
        Ok(id.to())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        self.request_required("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    async fn transaction_count(&self, account: Address) -> Result<u64, RpcError> {
        let count: U64 = self
            .request_required("eth_getTransactionCount", json!([account, "pending"]))
            .await?;
        Ok(count.to())
    }

    async fn gas_price(&self) -> Result<u128, RpcError> {
        let price: U128 = self.request_required("eth_gasPrice", json!([])).await?;
        Ok(price.to())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RpcError> {
        self.request_required("eth_sendRawTransaction", json!([raw]))
            .await
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }
}
