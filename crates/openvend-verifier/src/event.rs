//! Event envelope parsing, allow-listing, and claim extraction.
//!
//! Runs strictly after signature verification. The gate order is fail-closed:
//!
//! ```text
//!   raw bytes ──▶ 1. signature + freshness   (authentication)
//!             ──▶ 2. envelope parse          (structure)
//!             ──▶ 3. event-type allow-list   (relevance; Ignored is success)
//!             ──▶ 4. claim field validation  (first offending field wins)
//! ```
//!
//! Nothing in this module touches the claim ledger or the asset ledger.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use openvend_types::{Address, AssetId, Claim, OrderId, Result, VendError, VerifierConfig};

use crate::signature;

/// Wire shape of a processor event. `data` stays untyped until the event type
/// is known to be actionable.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

/// What the trust boundary decided about one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Authenticated, allow-listed, and structurally valid: act on it.
    Actionable(Claim),
    /// Authenticated but not an event type this pipeline acts on.
    /// Acknowledged upstream as success so the processor stops redelivering.
    Ignored { event_type: String },
}

/// The trust boundary for incoming webhook deliveries.
pub struct EventVerifier {
    config: VerifierConfig,
}

impl EventVerifier {
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Authenticate a delivery and extract its claim.
    ///
    /// # Errors
    /// - [`VendError::SignatureMissing`] / [`VendError::SignatureInvalid`] /
    ///   [`VendError::StaleEvent`] from the signature gate.
    /// - [`VendError::MalformedEnvelope`] when the body is not an event.
    /// - [`VendError::MalformedClaim`] naming the first offending field.
    pub fn process(&self, raw_body: &[u8], signature_header: Option<&str>) -> Result<Disposition> {
        signature::verify(
            &self.config.secret,
            raw_body,
            signature_header,
            self.config.tolerance_secs,
            Utc::now(),
        )?;

        let envelope: EventEnvelope =
            serde_json::from_slice(raw_body).map_err(|err| VendError::MalformedEnvelope {
                reason: err.to_string(),
            })?;

        if !self.config.allowed_events.iter().any(|t| *t == envelope.event_type) {
            debug!(event_type = %envelope.event_type, "event type not allow-listed, ignoring");
            return Ok(Disposition::Ignored {
                event_type: envelope.event_type,
            });
        }

        let claim = extract_claim(&envelope.data)?;
        debug!(order_id = %claim.order_id, asset = %claim.asset_id, "claim extracted");
        Ok(Disposition::Actionable(claim))
    }
}

/// Field-by-field claim validation. The first offending field is reported;
/// later fields are not inspected.
fn extract_claim(data: &Value) -> Result<Claim> {
    let order_id = match data.get("orderId").and_then(Value::as_str) {
        Some(raw) if !raw.trim().is_empty() => OrderId::new(raw.trim()),
        Some(_) => {
            return Err(malformed("orderId", "empty string"));
        }
        None => {
            return Err(malformed("orderId", "missing or not a string"));
        }
    };

    let recipient = match data.get("recipient").and_then(Value::as_str) {
        Some(raw) => raw.trim().parse::<Address>().map_err(|err| match err {
            VendError::InvalidAddress { reason } => malformed("recipient", reason),
            other => other,
        })?,
        None => {
            return Err(malformed("recipient", "missing or not a string"));
        }
    };

    let asset_id = parse_asset_id(data.get("assetId"))?;
    let reward_amount = parse_reward_amount(data.get("rewardAmount"))?;

    Ok(Claim {
        order_id,
        recipient,
        asset_id,
        reward_amount,
    })
}

/// Asset ids arrive as JSON numbers or decimal strings depending on the
/// processor's serializer; both spell the same non-negative integer.
fn parse_asset_id(value: Option<&Value>) -> Result<AssetId> {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(AssetId)
            .ok_or_else(|| malformed("assetId", "not a non-negative integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(AssetId)
            .map_err(|_| malformed("assetId", "string does not parse as an integer")),
        Some(_) => Err(malformed("assetId", "expected number or string")),
        None => Err(malformed("assetId", "missing")),
    }
}

fn parse_reward_amount(value: Option<&Value>) -> Result<Option<Decimal>> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<Decimal>().ok(),
        Some(Value::Number(n)) => n.to_string().parse::<Decimal>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(amount) if amount >= Decimal::ZERO => Ok(Some(amount)),
        Some(_) => Err(malformed("rewardAmount", "negative amount")),
        None => Err(malformed("rewardAmount", "not a decimal amount")),
    }
}

fn malformed(field: &str, reason: impl Into<String>) -> VendError {
    VendError::MalformedClaim {
        field: field.to_string(),
        reason: reason.into(),
    }
}
