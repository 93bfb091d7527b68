//! Ethereum JSON-RPC ledger client
//!
//! Implements `LedgerClient` over HTTP with `eth_blockNumber` and
//! `eth_getLogs`. One request per call; retry lives in the reader.

use crate::domain::{
    to_hex, Address, BlockHeight, Hash, RawLogRecord, RelayerError, RelayerResult,
};
use crate::ports::outbound::{LedgerClient, LogFilter};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// Log object as returned by `eth_getLogs`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: String,
    topics: Vec<String>,
    data: String,
    block_number: Option<String>,
    transaction_hash: Option<String>,
    transaction_index: Option<String>,
    log_index: Option<String>,
    #[serde(default)]
    removed: bool,
}

/// HTTP JSON-RPC client for an EVM source chain.
pub struct JsonRpcLedgerClient {
    client: Client,
    endpoint: String,
    request_id: AtomicU64,
}

impl JsonRpcLedgerClient {
    /// Create a client for `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> RelayerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| RelayerError::Config(format!("cannot build RPC client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            request_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> RelayerResult<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        trace!("[ledger] -> {} #{}", method, request.id);

        let transient = |reason: String| RelayerError::TransientRead {
            operation: method.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    transient(format!("cannot connect to {}", self.endpoint))
                } else {
                    transient(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(transient(format!("node returned HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(RelayerError::InvalidResponse(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let body = response.bytes().await.map_err(|e| transient(e.to_string()))?;
        let rpc: JsonRpcResponse = serde_json::from_slice(&body)
            .map_err(|e| RelayerError::InvalidResponse(format!("{}: {}", method, e)))?;

        if let Some(error) = rpc.error {
            return Err(rpc_error(method, &error));
        }
        rpc.result
            .ok_or_else(|| RelayerError::InvalidResponse(format!("{}: missing result", method)))
    }
}

/// Map a JSON-RPC error object to a read error.
///
/// Parse, invalid-request, unknown-method and invalid-params errors mean
/// the request is wrong and repeating it cannot help. Everything else
/// (server errors, rate and result limits, internal errors) is transient.
fn rpc_error(method: &str, error: &JsonRpcErrorObject) -> RelayerError {
    let reason = format!("JSON-RPC error {}: {}", error.code, error.message);
    match error.code {
        -32700 | -32602..=-32600 => {
            RelayerError::InvalidResponse(format!("{}: {}", method, reason))
        }
        _ => RelayerError::TransientRead {
            operation: method.to_string(),
            reason,
        },
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn block_number(&self) -> RelayerResult<BlockHeight> {
        let result = self.call("eth_blockNumber", Value::Array(vec![])).await?;
        let quantity = result
            .as_str()
            .ok_or_else(|| RelayerError::InvalidResponse("block number is not a string".into()))?;
        parse_quantity(quantity)
    }

    async fn get_logs(&self, filter: &LogFilter) -> RelayerResult<Vec<RawLogRecord>> {
        let params = serde_json::json!([{
            "fromBlock": format!("0x{:x}", filter.from_block),
            "toBlock": format!("0x{:x}", filter.to_block),
            "address": to_hex(&filter.address),
            "topics": [to_hex(&filter.topic0)],
        }]);

        let result = self.call("eth_getLogs", params).await?;
        let logs: Vec<RpcLog> = serde_json::from_value(result)
            .map_err(|e| RelayerError::InvalidResponse(format!("eth_getLogs: {}", e)))?;

        logs.into_iter().map(parse_log).collect()
    }
}

/// Parse a `0x`-prefixed hex quantity.
fn parse_quantity(value: &str) -> RelayerResult<u64> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| RelayerError::InvalidResponse(format!("quantity {:?} lacks 0x", value)))?;
    if digits.is_empty() {
        return Err(RelayerError::InvalidResponse("empty quantity".to_string()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| RelayerError::InvalidResponse(format!("quantity {:?}: {}", value, e)))
}

fn parse_bytes(value: &str) -> RelayerResult<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits)
        .map_err(|e| RelayerError::InvalidResponse(format!("hex {:?}: {}", value, e)))
}

fn parse_fixed<const N: usize>(value: &str) -> RelayerResult<[u8; N]> {
    let bytes = parse_bytes(value)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        RelayerError::InvalidResponse(format!("expected {} bytes, got {}", N, bytes.len()))
    })
}

fn required<'a>(field: &'a Option<String>, name: &str) -> RelayerResult<&'a str> {
    field
        .as_deref()
        .ok_or_else(|| RelayerError::InvalidResponse(format!("log missing {}", name)))
}

fn parse_log(log: RpcLog) -> RelayerResult<RawLogRecord> {
    // Pending logs carry null positions; a windowed query never returns them
    let block_number = parse_quantity(required(&log.block_number, "blockNumber")?)?;
    let tx_hash: Hash = parse_fixed(required(&log.transaction_hash, "transactionHash")?)?;
    let tx_index = parse_quantity(required(&log.transaction_index, "transactionIndex")?)?;
    let log_index = parse_quantity(required(&log.log_index, "logIndex")?)?;
    let address: Address = parse_fixed(&log.address)?;
    let topics = log
        .topics
        .iter()
        .map(|t| parse_fixed::<32>(t))
        .collect::<RelayerResult<Vec<Hash>>>()?;

    Ok(RawLogRecord {
        block_number,
        tx_hash,
        tx_index,
        log_index,
        address,
        topics,
        data: parse_bytes(&log.data)?,
        removed: log.removed,
    })
}
