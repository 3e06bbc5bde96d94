//! A JSON-RPC over HTTP client for the Flux daemon.
//!
//! Every call runs under a bounded timeout and a retry budget with
//! exponential backoff. Errors are classified as transient (network,
//! HTTP 5xx, timeout) or permanent (authentication, unknown method);
//! only transient errors are retried, and exhausting the budget surfaces
//! the last error to the sync loop, which halts.

pub mod types;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub use types::{BlockchainInfo, MempoolInfo, NetworkInfo, VerboseBlock, VerboseTx};

/// JSON-RPC error code for an unknown method.
const RPC_METHOD_NOT_FOUND: i64 = -32601;

/// An RPC failure.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The HTTP request could not be completed (network error or timeout).
    #[error("rpc transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The daemon answered with a non-success HTTP status.
    #[error("rpc http status {status}")]
    Status { status: u16 },

    /// The daemon answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response body was not the JSON shape the method promises.
    #[error("rpc response decoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The response carried neither a result nor an error.
    #[error("rpc response missing result field")]
    MissingResult,

    /// The retry budget for a method was exhausted.
    #[error("rpc method {method} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        method: &'static str,
        attempts: u32,
        #[source]
        last: Box<RpcError>,
    },
}

impl RpcError {
    /// Whether retrying the same call can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Transport(_) => true,
            RpcError::Status { status } => *status >= 500,
            RpcError::Rpc { code, .. } => *code != RPC_METHOD_NOT_FOUND,
            RpcError::Json(_) | RpcError::MissingResult => false,
            RpcError::RetriesExhausted { .. } => false,
        }
    }
}

/// Connection settings for [`RpcClient`].
#[derive(Clone, Debug)]
pub struct RpcConfig {
    /// Daemon endpoint, e.g. `http://127.0.0.1:16124`.
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per retry.
    pub base_backoff: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            url: "http://127.0.0.1:16124".to_string(),
            user: None,
            password: None,
            timeout: Duration::from_secs(30),
            max_attempts: 5,
            base_backoff: Duration::from_secs(1),
        }
    }
}

/// A Flux daemon JSON-RPC client.
#[derive(Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    config: RpcConfig,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.config.url)
            .finish()
    }
}

impl RpcClient {
    pub fn new(config: RpcConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(RpcClient { client, config })
    }

    /// Send one JSON-RPC request without retrying.
    async fn send_once(&self, method: &'static str, params: Value) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "fluxscan",
            "method": method,
            "params": params,
        });

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(user) = &self.config.user {
            request = request.basic_auth(user, self.config.password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();

        // The daemon reports RPC-level failures inside a 500 body, so
        // decode the body before giving up on an error status.
        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Status {
                    status: status.as_u16(),
                })
            }
            Err(error) => return Err(RpcError::Transport(error)),
        };

        if let Some(error) = payload.get("error").filter(|error| !error.is_null()) {
            return Err(RpcError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
            });
        }

        match payload.get("result") {
            Some(result) => Ok(result.clone()),
            None => Err(RpcError::MissingResult),
        }
    }

    /// Send a JSON-RPC request, retrying transient failures with
    /// exponential backoff up to the configured attempt budget.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<R, RpcError> {
        let mut backoff = self.config.base_backoff;
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.send_once(method, params.clone()).await {
                Ok(result) => return Ok(serde_json::from_value(result)?),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    warn!(
                        method,
                        attempt,
                        backoff_secs = backoff.as_secs_f64(),
                        %error,
                        "transient rpc failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(error) if attempt < max_attempts => return Err(error),
                Err(error) => {
                    return Err(RpcError::RetriesExhausted {
                        method,
                        attempts: attempt,
                        last: Box::new(error),
                    })
                }
            }
        }

        unreachable!("the attempt loop always returns")
    }

    /// The current best-chain height.
    pub async fn get_block_count(&self) -> Result<u64, RpcError> {
        self.call("getblockcount", json!([])).await
    }

    pub async fn get_best_block_hash(&self) -> Result<String, RpcError> {
        self.call("getbestblockhash", json!([])).await
    }

    pub async fn get_block_hash(&self, height: u32) -> Result<String, RpcError> {
        self.call("getblockhash", json!([height])).await
    }

    /// The raw hex of the block with the given hash (`getblock` at
    /// verbosity 0).
    pub async fn get_block_raw(&self, hash: &str) -> Result<String, RpcError> {
        self.call("getblock", json!([hash, 0])).await
    }

    /// The structured block with embedded transaction objects (`getblock`
    /// at verbosity 2).
    pub async fn get_block_verbose(&self, hash: &str) -> Result<VerboseBlock, RpcError> {
        self.call("getblock", json!([hash, 2])).await
    }

    /// Raw transaction hex. A fallback path only: daemons without txindex
    /// answer 500 for most transactions, and ingestion slices the raw
    /// block instead.
    pub async fn get_raw_transaction(&self, txid: &str) -> Result<String, RpcError> {
        debug!(txid, "falling back to getrawtransaction");
        self.call("getrawtransaction", json!([txid, 0])).await
    }

    pub async fn get_blockchain_info(&self) -> Result<BlockchainInfo, RpcError> {
        self.call("getblockchaininfo", json!([])).await
    }

    pub async fn get_network_info(&self) -> Result<NetworkInfo, RpcError> {
        self.call("getnetworkinfo", json!([])).await
    }

    pub async fn get_mempool_info(&self) -> Result<MempoolInfo, RpcError> {
        self.call("getmempoolinfo", json!([])).await
    }
}
