use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rolegate_core::{AppError, AppResult};
use rolegate_domain::RevertCatalog;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

mod reader;
mod submitter;


/// Tunables for transaction submission and finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonRpcSettings {
    /// EIP-155 chain id used when signing.
    pub chain_id: u64,
    /// Blocks that must include or follow a receipt before it counts as final.
    pub confirmations: u64,
    /// Deadline for a receipt to become final.
    pub finalization_timeout: Duration,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
    /// Extra gas added on top of the node estimate, in percent.
    pub gas_headroom_percent: u64,
}

impl JsonRpcSettings {
    /// Creates settings for `chain_id` with one confirmation and a two minute deadline.
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            confirmations: 1,
            finalization_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            gas_headroom_percent: 20,
        }
    }
}

/// Ethereum JSON-RPC adapter for ledger reads and transaction submission.
///
/// It does not serialize nonces itself; wrap it in a `SerializedSubmitter` before
/// sharing it between concurrent workflows.
pub struct JsonRpcLedgerClient {
    http_client: reqwest::Client,
    endpoint: Url,
    settings: JsonRpcSettings,
    catalog: RevertCatalog,
    next_request_id: AtomicU64,
}

impl JsonRpcLedgerClient {
    /// Creates a client for the node at `endpoint`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoint: Url, settings: JsonRpcSettings) -> Self {
        Self {
            http_client,
            endpoint,
            settings,
            catalog: RevertCatalog::new(),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Returns the configured settings.
    #[must_use]
    pub fn settings(&self) -> JsonRpcSettings {
        self.settings
    }

    /// Asks the node which chain it serves.
    pub async fn remote_chain_id(&self) -> AppResult<u64> {
        let value: String = self
            .call("eth_chainId", json!([]))
            .await
            .map_err(|failure| AppError::TransientRead(failure.to_string()))?;
        let chain_id = parse_quantity(&value).map_err(AppError::TransientRead)?;
        u64::try_from(chain_id)
            .map_err(|_| AppError::TransientRead(format!("chain id {value} is out of range")))
    }

    async fn call<T>(&self, method: &str, params: Value) -> Result<T, RpcFailure>
    where
        T: DeserializeOwned,
    {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|error| RpcFailure::Transport(format!("{method} transport error: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcFailure::Transport(format!(
                "{method} returned HTTP status {status}"
            )));
        }

        let body = response.json::<RpcResponse>().await.map_err(|error| {
            RpcFailure::Transport(format!("{method} returned an unreadable body: {error}"))
        })?;
        if let Some(error) = body.error {
            return Err(RpcFailure::Node(error));
        }

        serde_json::from_value(body.result.unwrap_or(Value::Null)).map_err(|error| {
            RpcFailure::Transport(format!("{method} returned a malformed result: {error}"))
        })
    }

    /// Maps a failed read into the error taxonomy.
    fn read_error(&self, failure: RpcFailure) -> AppError {
        match failure.revert_data() {
            Some(data) => AppError::ContractRevert(self.catalog.decode(&data).to_string()),
            None => AppError::TransientRead(failure.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Clone)]
enum RpcFailure {
    Transport(String),
    Node(RpcErrorObject),
}

impl RpcFailure {
    /// Revert payload when the node reports an execution revert.
    ///
    /// Nodes use code 3 with hex data, or a message mentioning the revert and no data.
    fn revert_data(&self) -> Option<Vec<u8>> {
        let Self::Node(error) = self else {
            return None;
        };

        let hex_data = match &error.data {
            Some(Value::String(data)) => Some(data.as_str()),
            Some(Value::Object(object)) => object.get("data").and_then(Value::as_str),
            _ => None,
        };
        let reverted = error.code == 3 || error.message.to_ascii_lowercase().contains("revert");
        if !reverted {
            return None;
        }

        Some(
            hex_data
                .and_then(|data| parse_data(data).ok())
                .unwrap_or_default(),
        )
    }
}

impl Display for RpcFailure {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(formatter, "{message}"),
            Self::Node(error) => write!(formatter, "node error {}: {}", error.code, error.message),
        }
    }
}

fn quantity(value: u128) -> String {
    format!("0x{value:x}")
}

fn data_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Parses a hex quantity, saturating values wider than 128 bits.
fn parse_quantity(value: &str) -> Result<u128, String> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| format!("quantity '{value}' lacks a 0x prefix"))?
        .trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("quantity '{value}' is not hexadecimal"));
    }
    if digits.len() > 32 {
        return Ok(u128::MAX);
    }

    u128::from_str_radix(digits, 16).map_err(|error| format!("quantity '{value}': {error}"))
}

fn parse_data(value: &str) -> Result<Vec<u8>, String> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|error| format!("data '{value}' is not hex: {error}"))
}
