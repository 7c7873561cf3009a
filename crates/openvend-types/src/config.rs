//! Configuration types for the OpenVend pipeline.
//!
//! Every config struct is built fallibly at process start; nothing here reads
//! the environment. The gateway crate owns env resolution and surfaces every
//! problem as a startup error, never as a panic mid-request.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, Address, AssetId};

/// Shared secret for the processor's signature header.
///
/// Wrapped so the secret never leaks through `Debug` output or derived
/// serialization. Construct once at startup, pass by reference.
#[derive(Clone)]
pub struct EndpointSecret(Vec<u8>);

impl EndpointSecret {
    #[must_use]
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for EndpointSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EndpointSecret(***)")
    }
}

/// Event verification settings.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Shared HMAC secret for the signature header.
    pub secret: EndpointSecret,
    /// Freshness window in seconds, two-sided.
    pub tolerance_secs: i64,
    /// Event types the pipeline acts on. Everything else is ignored.
    pub allowed_events: Vec<String>,
}

impl VerifierConfig {
    /// Defaults for everything except the secret, which has none.
    #[must_use]
    pub fn new(secret: EndpointSecret) -> Self {
        Self {
            secret,
            tolerance_secs: constants::DEFAULT_SIGNATURE_TOLERANCE_SECS,
            allowed_events: vec![constants::DEFAULT_ALLOWED_EVENT.to_string()],
        }
    }
}

/// Ledger RPC client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the ledger node.
    pub rpc_url: String,
    /// Total submission attempts for unreachable faults.
    pub submit_attempts: u32,
    /// Exponential backoff base between submission attempts, milliseconds.
    pub submit_backoff_base_ms: u64,
    /// Confirmation deadline per leg, seconds.
    pub confirm_timeout_secs: u64,
    /// Confirmation status poll interval, milliseconds.
    pub confirm_poll_ms: u64,
    /// Per-request HTTP timeout, seconds.
    pub request_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            submit_attempts: constants::DEFAULT_SUBMIT_ATTEMPTS,
            submit_backoff_base_ms: constants::DEFAULT_SUBMIT_BACKOFF_BASE_MS,
            confirm_timeout_secs: constants::DEFAULT_CONFIRM_TIMEOUT_SECS,
            confirm_poll_ms: constants::DEFAULT_CONFIRM_POLL_MS,
            request_timeout_secs: constants::DEFAULT_RPC_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Reward amount for one specific asset, overriding the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRule {
    pub asset_id: AssetId,
    pub amount: Decimal,
}

/// Issuance policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceConfig {
    /// The account assets are issued from. The ownership pre-check expects
    /// unissued assets to sit here.
    pub issuer: Address,
    /// Reward paid when neither the event nor the table names an amount.
    /// Zero disables the reward leg.
    pub default_reward: Decimal,
    /// Per-asset reward overrides. Small by construction; scanned linearly.
    pub reward_table: Vec<RewardRule>,
}

impl IssuanceConfig {
    #[must_use]
    pub fn new(issuer: Address) -> Self {
        Self {
            issuer,
            default_reward: Decimal::ZERO,
            reward_table: Vec::new(),
        }
    }

    /// Effective reward for an asset when the event names none.
    #[must_use]
    pub fn reward_for(&self, asset_id: AssetId) -> Decimal {
        self.reward_table
            .iter()
            .find(|rule| rule.asset_id == asset_id)
            .map_or(self.default_reward, |rule| rule.amount)
    }
}
