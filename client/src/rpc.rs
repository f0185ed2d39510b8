//! Ethereum JSON-RPC backend. Signing is delegated to the endpoint
//! (`eth_sendTransaction`), the way a browser wallet or an unlocked dev node
//! signs for its accounts.

use async_trait::async_trait;
use ledger_api::abi;
use ledger_api::{
    Address, Artist, Concert, ContractCall, CounterKind, Ledger, LedgerError, Receipt, TxHash, Venue, WalletProvider,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// EIP-1193 "user rejected request".
const USER_REJECTED_CODE: i64 = 4001;
const METHOD_NOT_FOUND_CODE: i64 = -32601;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl RpcError {
    fn into_ledger_error(self) -> LedgerError {
        if self.code == USER_REJECTED_CODE {
            return LedgerError::UserRejected;
        }
        let payload = self.data.as_ref().and_then(revert_payload);
        if payload.is_some() || self.message.contains("revert") {
            let reason = payload
                .and_then(|p| abi::decode_revert_reason(&p))
                .or_else(|| Some(self.message.clone()));
            return LedgerError::Reverted { reason };
        }
        LedgerError::Transport(format!("{} (code {})", self.message, self.code))
    }
}

/// Revert data is either a hex string or an object carrying one under `data`.
fn revert_payload(data: &Value) -> Option<Vec<u8>> {
    match data {
        Value::String(s) => decode_hex(s).ok(),
        Value::Object(map) => map.get("data").and_then(revert_payload),
        _ => None,
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, LedgerError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| LedgerError::Decode(format!("bad hex {:?}: {}", s, e)))
}

fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn parse_quantity(value: &Value) -> Result<u64, LedgerError> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::Decode(format!("expected hex quantity, got {}", value)))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| LedgerError::Decode(format!("bad quantity {:?}: {}", s, e)))
}

/// What a receipt poll says about a write.
#[derive(Debug, Clone, PartialEq)]
enum ReceiptState {
    NotMined,
    Mined { block_number: u64 },
    Reverted { block: Value },
}

/// Interprets an `eth_getTransactionReceipt` result. A missing `status`
/// (pre-Byzantium receipts) counts as success.
fn interpret_receipt(receipt: &Value) -> Result<ReceiptState, LedgerError> {
    if receipt.is_null() {
        return Ok(ReceiptState::NotMined);
    }
    let block = receipt.get("blockNumber").cloned().unwrap_or(Value::Null);
    let status = receipt.get("status").map(parse_quantity).transpose()?;
    if status == Some(0) {
        return Ok(ReceiptState::Reverted { block });
    }
    Ok(ReceiptState::Mined {
        block_number: parse_quantity(&block)?,
    })
}

/// Carries one JSON-RPC request to the node and returns its `result`.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError>;
}

/// JSON-RPC over HTTP POST.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        HttpTransport {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });
        debug!("JSON-RPC {} -> {}", method, self.url);

        let response = self.http.post(&self.url).json(&body).send().await.map_err(|e| {
            if e.is_connect() {
                LedgerError::Unavailable(format!("cannot reach {}: {}", self.url, e))
            } else {
                LedgerError::Transport(e.to_string())
            }
        })?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(LedgerError::Transport(format!("{} returned {}: {}", method, status, text)));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(format!("{} response: {}", method, e)))?;
        if let Some(err) = parsed.error {
            debug!("JSON-RPC {} failed: {:?}", method, err);
            return Err(err.into_ledger_error());
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

pub struct JsonRpcLedger {
    transport: Box<dyn RpcTransport>,
    contract: Address,
    poll_interval: Duration,
}

impl JsonRpcLedger {
    pub fn new(url: impl Into<String>, contract: Address, poll_interval: Duration) -> Self {
        Self::with_transport(HttpTransport::new(url), contract, poll_interval)
    }

    pub fn with_transport(transport: impl RpcTransport + 'static, contract: Address, poll_interval: Duration) -> Self {
        JsonRpcLedger {
            transport: Box::new(transport),
            contract,
            poll_interval,
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        self.transport.request(method, params).await
    }

    async fn eth_call(&self, data: Vec<u8>, block: &str) -> Result<Vec<u8>, LedgerError> {
        let params = json!([{ "to": self.contract.to_string(), "data": encode_hex(&data) }, block]);
        let result = self.request("eth_call", params).await?;
        let s = result
            .as_str()
            .ok_or_else(|| LedgerError::Decode(format!("eth_call returned {}", result)))?;
        decode_hex(s)
    }

    /// Replays a reverted write at its block to recover the revert reason.
    async fn replay_revert_reason(&self, tx: TxHash, block: &Value) -> Option<String> {
        let original = self
            .request("eth_getTransactionByHash", json!([tx.to_string()]))
            .await
            .ok()?;
        let from = original.get("from")?.clone();
        let to = original.get("to")?.clone();
        let input = original.get("input")?.clone();
        let value = original.get("value")?.clone();
        let call = json!({ "from": from, "to": to, "data": input, "value": value });
        match self.request("eth_call", json!([call, block])).await {
            Err(LedgerError::Reverted { reason }) => reason,
            _ => None,
        }
    }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn counter(&self, kind: CounterKind) -> Result<u64, LedgerError> {
        abi::decode_counter(&self.eth_call(abi::encode_counter_read(kind), "latest").await?)
    }

    async fn artist(&self, id: u64) -> Result<Artist, LedgerError> {
        abi::decode_artist(&self.eth_call(abi::encode_artist_read(id), "latest").await?)
    }

    async fn venue(&self, id: u64) -> Result<Venue, LedgerError> {
        abi::decode_venue(&self.eth_call(abi::encode_venue_read(id), "latest").await?)
    }

    async fn concert(&self, id: u64) -> Result<Concert, LedgerError> {
        abi::decode_concert(&self.eth_call(abi::encode_concert_read(id), "latest").await?)
    }

    async fn send_transaction(&self, from: Address, call: &ContractCall) -> Result<TxHash, LedgerError> {
        let params = json!([{
            "from": from.to_string(),
            "to": self.contract.to_string(),
            "data": encode_hex(&abi::encode_call(call)),
            "value": format!("0x{:x}", call.value().value()),
        }]);
        let result = self.request("eth_sendTransaction", params).await?;
        let s = result
            .as_str()
            .ok_or_else(|| LedgerError::Decode(format!("eth_sendTransaction returned {}", result)))?;
        let hash: TxHash = s.parse().map_err(|e| LedgerError::Decode(format!("{}", e)))?;
        info!("{} sent as {}", call.kind(), hash);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx: TxHash) -> Result<Receipt, LedgerError> {
        loop {
            let receipt = match self
                .request("eth_getTransactionReceipt", json!([tx.to_string()]))
                .await
            {
                Ok(receipt) => receipt,
                // The write is already out; a lost poll says nothing about it.
                Err(e @ (LedgerError::Transport(_) | LedgerError::Unavailable(_))) => {
                    warn!("Receipt poll for {} failed, retrying: {}", tx, e);
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
                Err(e) => return Err(e),
            };
            match interpret_receipt(&receipt)? {
                ReceiptState::NotMined => tokio::time::sleep(self.poll_interval).await,
                ReceiptState::Mined { block_number } => {
                    return Ok(Receipt {
                        tx_hash: tx,
                        block_number,
                    });
                }
                ReceiptState::Reverted { block } => {
                    let reason = self.replay_revert_reason(tx, &block).await;
                    warn!("{} reverted: {:?}", tx, reason);
                    return Err(LedgerError::Reverted { reason });
                }
            }
        }
    }
}

/// Wallet reached over the same JSON-RPC endpoint.
pub struct JsonRpcWallet {
    ledger: Arc<JsonRpcLedger>,
}

impl JsonRpcWallet {
    pub fn new(ledger: JsonRpcLedger) -> Self {
        JsonRpcWallet {
            ledger: Arc::new(ledger),
        }
    }
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, LedgerError> {
        let accounts = match self.ledger.request("eth_requestAccounts", json!([])).await {
            // Plain nodes only know eth_accounts.
            Err(LedgerError::Transport(msg)) if msg.ends_with(&format!("(code {})", METHOD_NOT_FOUND_CODE)) => {
                self.ledger.request("eth_accounts", json!([])).await?
            }
            other => other?,
        };
        let accounts: Vec<String> =
            serde_json::from_value(accounts).map_err(|e| LedgerError::Decode(format!("accounts: {}", e)))?;
        accounts
            .iter()
            .map(|a| a.parse().map_err(|e| LedgerError::Decode(format!("{}", e))))
            .collect()
    }

    fn ledger(&self) -> Arc<dyn Ledger> {
        self.ledger.clone()
    }
}
