//! Error types for the OpenVend issuance pipeline.
//!
//! All errors use the `OV_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Event verification errors
//! - 2xx: Claim ledger errors
//! - 3xx: Ledger client errors
//! - 4xx: Issuance coordinator errors
//! - 5xx: Configuration errors
//! - 9xx: General / internal errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AssetId, ClaimKey, ClaimStatus, TxRef};

/// Central error enum for all OpenVend operations.
#[derive(Debug, Error)]
pub enum VendError {
    // =================================================================
    // Event Verification Errors (1xx)
    // =================================================================
    /// The signature header was absent or empty.
    #[error("OV_ERR_100: Signature header missing")]
    SignatureMissing,

    /// The signature header did not verify against the raw body.
    #[error("OV_ERR_101: Signature invalid: {reason}")]
    SignatureInvalid { reason: String },

    /// The event timestamp fell outside the freshness window (replay guard).
    #[error("OV_ERR_102: Stale event: age {age_secs}s exceeds tolerance {tolerance_secs}s")]
    StaleEvent { age_secs: i64, tolerance_secs: i64 },

    /// The body was not a parseable event envelope.
    #[error("OV_ERR_103: Malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    /// A required claim field was missing or ill-typed.
    #[error("OV_ERR_104: Malformed claim: field '{field}': {reason}")]
    MalformedClaim { field: String, reason: String },

    /// A ledger address failed structural validation.
    #[error("OV_ERR_105: Invalid address: {reason}")]
    InvalidAddress { reason: String },

    // =================================================================
    // Claim Ledger Errors (2xx)
    // =================================================================
    /// A status transition the claim state machine forbids.
    #[error("OV_ERR_200: Invalid claim transition for {key}: {from} -> {to}")]
    InvalidTransition {
        key: ClaimKey,
        from: ClaimStatus,
        to: ClaimStatus,
    },

    /// No record exists for the given claim key.
    #[error("OV_ERR_201: Claim not found: {0}")]
    ClaimNotFound(ClaimKey),

    /// The claim journal contained an unreadable line before the tail.
    #[error("OV_ERR_202: Claim journal corrupt at line {line}: {reason}")]
    JournalCorrupt { line: usize, reason: String },

    // =================================================================
    // Ledger Client Errors (3xx)
    // =================================================================
    /// The ledger actively refused the instruction. Never auto-retried.
    #[error("OV_ERR_300: Ledger rejected instruction: {reason}")]
    LedgerRejected { reason: String },

    /// Transport-level failure before admission. Safe to retry with backoff.
    #[error("OV_ERR_301: Ledger unreachable: {reason}")]
    LedgerUnreachable { reason: String },

    /// Confirmation did not arrive within the deadline. Outcome unknown.
    #[error("OV_ERR_302: Confirmation timeout for tx {tx_ref} after {waited_ms}ms")]
    ConfirmTimeout { tx_ref: TxRef, waited_ms: u64 },

    /// Submission was sent but its fate is unknown (request timed out mid-flight).
    #[error("OV_ERR_303: Submission outcome unknown for tx {tx_ref}")]
    SubmitOutcomeUnknown { tx_ref: TxRef },

    /// The ledger node answered with something that does not parse.
    #[error("OV_ERR_304: Malformed ledger reply: {reason}")]
    MalformedLedgerReply { reason: String },

    // =================================================================
    // Issuance Coordinator Errors (4xx)
    // =================================================================
    /// The asset is held by neither the issuer nor the recipient.
    #[error("OV_ERR_400: {asset_id} held by unexpected account {holder}")]
    AssetHeldElsewhere { asset_id: AssetId, holder: String },

    /// Reward retry was requested for a claim with no pending reward failure.
    #[error("OV_ERR_401: No reward retry pending for {key}")]
    RewardNotPending { key: ClaimKey },

    // =================================================================
    // Configuration Errors (5xx)
    // =================================================================
    /// Invalid or incomplete configuration.
    #[error("OV_ERR_500: Configuration error: {reason}")]
    Configuration { reason: String },

    /// A specific environment variable was missing or unparseable.
    #[error("OV_ERR_501: Invalid environment variable {key}: {reason}")]
    InvalidEnv { key: String, reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("OV_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("OV_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// I/O error (disk, network).
    #[error("OV_ERR_902: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, VendError>;

impl VendError {
    /// Retryability classification for ledger-facing failures.
    ///
    /// `None` for errors that never cross the ledger boundary.
    #[must_use]
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::LedgerRejected { .. }
            | Self::MalformedLedgerReply { .. }
            | Self::AssetHeldElsewhere { .. } => Some(FaultKind::Rejected),
            Self::LedgerUnreachable { .. } => Some(FaultKind::Unreachable),
            Self::ConfirmTimeout { .. } | Self::SubmitOutcomeUnknown { .. } => {
                Some(FaultKind::Timeout)
            }
            _ => None,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for VendError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for VendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Persisted classification of a downstream ledger failure.
///
/// This is what claim records store and what retry policy dispatches on:
/// - `Rejected`: the ledger said no; an identical resubmission cannot succeed.
/// - `Unreachable`: nothing reached the ledger; resubmission is safe.
/// - `Timeout`: outcome unknown; only a reconciliation read may precede
///   resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    Rejected,
    Unreachable,
    Timeout,
}

impl FaultKind {
    /// Whether a later redelivery of the same claim can make progress.
    ///
    /// `Timeout` counts as retryable because re-entry reconciles before it
    /// resubmits anything.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Unreachable | Self::Timeout)
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected => write!(f, "REJECTED"),
            Self::Unreachable => write!(f, "UNREACHABLE"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}
