//! JSON-RPC 2.0 ledger client over HTTP.
//!
//! Talks to a ledger node exposing `vend.submit`, `vend.transactionStatus`,
//! and `vend.holderOf`. The interesting part is failure classification: every
//! way the call can go wrong must land in exactly one
//! [`FaultKind`](openvend_types::FaultKind) bucket, because the coordinator's
//! safety argument rests on that mapping:
//!
//! - transport failures and 5xx answers → `Unreachable` (nothing was
//!   admitted, resubmission is safe);
//! - JSON-RPC error objects and 4xx answers → `Rejected` (the node said no,
//!   identical bytes cannot succeed);
//! - a request timeout **on submit** → `Timeout` (the instruction may be in
//!   the node's queue; only a reconciliation read may follow);
//! - a reply that does not parse → `Rejected` (the node is answering
//!   garbage; hammering it with the same bytes is not productive).
//!
//! Read-only calls that time out are `Unreachable` instead: a lost status
//! query has no side effect to double.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use openvend_types::{Address, AssetId, LedgerConfig, Result, TxHash, TxRef, VendError};

use crate::client::{Instruction, LedgerClient, TxReceipt, TxStatus};

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    #[allow(dead_code)]
    id: Option<Value>,
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

/// How one RPC round trip failed, before fault classification.
#[derive(Debug, Clone)]
enum RpcFailure {
    /// The request never completed (connect refused, DNS, reset, timeout).
    Transport { message: String, timed_out: bool },
    /// The node answered with a non-success HTTP status.
    Http { status: u16, body: String },
    /// The node answered 200 with a body that is not a JSON-RPC envelope.
    InvalidJson { error: String },
    /// The envelope carried a JSON-RPC error object.
    JsonRpc { code: i64, message: String },
}

impl RpcFailure {
    fn summary(&self) -> String {
        match self {
            Self::Transport { message, .. } => format!("transport: {message}"),
            Self::Http { status, body } => format!("http {status}: {body}"),
            Self::InvalidJson { error } => format!("invalid json-rpc envelope: {error}"),
            Self::JsonRpc { code, message } => format!("json-rpc error {code}: {message}"),
        }
    }

    /// Classification for read-only methods, where a lost request has no
    /// side effect and is always safe to re-issue.
    fn into_read_error(self) -> VendError {
        match self {
            Self::Transport { .. } | Self::Http { status: 500..=599, .. } => {
                VendError::LedgerUnreachable { reason: self.summary() }
            }
            Self::InvalidJson { .. } => VendError::MalformedLedgerReply { reason: self.summary() },
            Self::Http { .. } | Self::JsonRpc { .. } => {
                VendError::LedgerRejected { reason: self.summary() }
            }
        }
    }

    /// Classification for `submit`, the one side-effecting method. A timeout
    /// here means the instruction may have been admitted.
    fn into_submit_error(self, tx_ref: TxRef) -> VendError {
        match self {
            Self::Transport { timed_out: true, .. } => {
                VendError::SubmitOutcomeUnknown { tx_ref }
            }
            other => other.into_read_error(),
        }
    }
}

// -- wire result shapes ------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubmitResult {
    accepted: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResult {
    status: String,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    block: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HolderResult {
    holder: String,
}

/// Production [`LedgerClient`] speaking JSON-RPC 2.0 to a ledger node.
pub struct RpcLedgerClient {
    client: reqwest::Client,
    url: String,
    confirm_timeout: Duration,
    confirm_poll: Duration,
}

impl RpcLedgerClient {
    /// Build the client. Fails only on an unusable HTTP configuration, which
    /// the binary surfaces at startup.
    ///
    /// # Errors
    /// [`VendError::Configuration`] when the HTTP client cannot be built.
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)))
            .build()
            .map_err(|err| VendError::Configuration {
                reason: format!("http client build failed: {err}"),
            })?;
        Ok(Self {
            client,
            url: config.rpc_url.clone(),
            confirm_timeout: Duration::from_secs(config.confirm_timeout_secs),
            confirm_poll: Duration::from_millis(config.confirm_poll_ms),
        })
    }

    async fn call(&self, method: &str, params: Value) -> std::result::Result<Value, RpcFailure> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": "openvend",
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| RpcFailure::Transport {
                timed_out: err.is_timeout(),
                message: err.to_string(),
            })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(RpcFailure::Http { status: status.as_u16(), body });
        }
        let envelope: RpcEnvelope = serde_json::from_str(&body)
            .map_err(|err| RpcFailure::InvalidJson { error: err.to_string() })?;
        if let Some(err) = envelope.error {
            return Err(RpcFailure::JsonRpc { code: err.code, message: err.message });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    fn parse_result<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|err| VendError::MalformedLedgerReply {
            reason: format!("unexpected result shape: {err}"),
        })
    }
}

#[async_trait::async_trait]
impl LedgerClient for RpcLedgerClient {
    #[instrument(skip(self, instruction), fields(tx_ref = %instruction.tx_ref))]
    async fn submit(&self, instruction: &Instruction) -> Result<TxRef> {
        let params = json!({
            "txRef": instruction.tx_ref.to_string(),
            "instruction": instruction.kind,
        });
        let result = self
            .call("vend.submit", params)
            .await
            .map_err(|failure| failure.into_submit_error(instruction.tx_ref))?;
        let parsed: SubmitResult = Self::parse_result(result)?;
        if !parsed.accepted {
            return Err(VendError::LedgerRejected {
                reason: parsed.reason.unwrap_or_else(|| "not accepted".to_string()),
            });
        }
        debug!(%instruction, "instruction accepted");
        Ok(instruction.tx_ref)
    }

    /// Poll the status endpoint until the reference reaches a terminal state
    /// or the configured deadline passes. A failed poll is not a failed
    /// confirmation: the loop keeps going and lets the deadline decide, which
    /// lands the claim in the safe `Timeout` bucket instead of guessing.
    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<TxReceipt> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            match self.transaction_status(tx_ref).await {
                Ok(TxStatus::Confirmed(receipt)) => return Ok(receipt),
                Ok(TxStatus::Dropped) => {
                    return Err(VendError::LedgerRejected {
                        reason: format!("transaction {tx_ref} dropped by the ledger"),
                    });
                }
                // Pending: admitted, not final. Unknown: the node may not
                // have indexed it yet right after submit. Both mean wait.
                Ok(TxStatus::Pending | TxStatus::Unknown) => {}
                Err(err) => {
                    warn!(%tx_ref, error = %err, "status poll failed, will retry until deadline");
                }
            }
            if Instant::now() + self.confirm_poll > deadline {
                return Err(VendError::ConfirmTimeout {
                    tx_ref: *tx_ref,
                    waited_ms: u64::try_from(self.confirm_timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(self.confirm_poll).await;
        }
    }

    async fn transaction_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        let result = self
            .call("vend.transactionStatus", json!({ "txRef": tx_ref.to_string() }))
            .await
            .map_err(RpcFailure::into_read_error)?;
        let parsed: StatusResult = Self::parse_result(result)?;
        match parsed.status.as_str() {
            "confirmed" => {
                let tx_hash = parsed.tx_hash.ok_or_else(|| VendError::MalformedLedgerReply {
                    reason: "confirmed status without txHash".to_string(),
                })?;
                Ok(TxStatus::Confirmed(TxReceipt::new(TxHash::new(tx_hash), parsed.block)))
            }
            "pending" => Ok(TxStatus::Pending),
            "unknown" => Ok(TxStatus::Unknown),
            "dropped" => Ok(TxStatus::Dropped),
            other => Err(VendError::MalformedLedgerReply {
                reason: format!("unrecognized status '{other}'"),
            }),
        }
    }

    async fn holder_of(&self, asset_id: AssetId) -> Result<Address> {
        let result = self
            .call("vend.holderOf", json!({ "assetId": asset_id.as_u64() }))
            .await
            .map_err(RpcFailure::into_read_error)?;
        let parsed: HolderResult = Self::parse_result(result)?;
        parsed.holder.parse().map_err(|_| VendError::MalformedLedgerReply {
            reason: format!("holder is not a ledger address: {}", parsed.holder),
        })
    }
}
