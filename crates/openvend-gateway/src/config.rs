//! Environment-driven configuration.
//!
//! Every `OPENVEND_*` variable is read and validated here, once, at startup.
//! Anything missing or unparseable surfaces as [`VendError::InvalidEnv`]
//! naming the offending key; nothing in the request path reads the
//! environment or can fail on configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use openvend_types::{
    constants, Address, AssetId, EndpointSecret, IssuanceConfig, LedgerConfig, Result, RewardRule,
    VendError, VerifierConfig,
};

/// Full process configuration for the gateway binary.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub verifier: VerifierConfig,
    pub ledger: LedgerConfig,
    pub issuance: IssuanceConfig,
    /// Claim journal file. `None` selects the in-memory claim ledger, which
    /// does not survive restarts.
    pub journal_path: Option<PathBuf>,
}

impl GatewayConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// [`VendError::InvalidEnv`] naming the first offending variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key-value source. The seam tests use.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = required(&lookup, "OPENVEND_ENDPOINT_SECRET")?;
        let mut verifier = VerifierConfig::new(EndpointSecret::new(secret.into_bytes()));
        verifier.tolerance_secs =
            parsed(&lookup, "OPENVEND_SIGNATURE_TOLERANCE_SECS", verifier.tolerance_secs)?;
        if verifier.tolerance_secs <= 0 {
            return Err(invalid("OPENVEND_SIGNATURE_TOLERANCE_SECS", "must be positive"));
        }
        if let Some(raw) = lookup("OPENVEND_ALLOWED_EVENTS") {
            let events: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(ToString::to_string)
                .collect();
            if events.is_empty() {
                return Err(invalid("OPENVEND_ALLOWED_EVENTS", "allow-list is empty"));
            }
            verifier.allowed_events = events;
        }

        let issuer: Address = required(&lookup, "OPENVEND_ISSUER_ADDRESS")?
            .parse()
            .map_err(|err: VendError| invalid("OPENVEND_ISSUER_ADDRESS", err.to_string()))?;
        let mut issuance = IssuanceConfig::new(issuer);
        issuance.default_reward = parsed(&lookup, "OPENVEND_DEFAULT_REWARD", Decimal::ZERO)?;
        if issuance.default_reward < Decimal::ZERO {
            return Err(invalid("OPENVEND_DEFAULT_REWARD", "must not be negative"));
        }
        if let Some(raw) = lookup("OPENVEND_REWARD_TABLE") {
            issuance.reward_table = parse_reward_table(&raw)?;
        }

        let mut ledger = LedgerConfig {
            rpc_url: required(&lookup, "OPENVEND_LEDGER_RPC_URL")?,
            ..LedgerConfig::default()
        };
        ledger.submit_attempts =
            parsed(&lookup, "OPENVEND_SUBMIT_ATTEMPTS", ledger.submit_attempts)?;
        ledger.submit_backoff_base_ms =
            parsed(&lookup, "OPENVEND_SUBMIT_BACKOFF_BASE_MS", ledger.submit_backoff_base_ms)?;
        ledger.confirm_timeout_secs =
            parsed(&lookup, "OPENVEND_CONFIRM_TIMEOUT_SECS", ledger.confirm_timeout_secs)?;
        ledger.confirm_poll_ms =
            parsed(&lookup, "OPENVEND_CONFIRM_POLL_MS", ledger.confirm_poll_ms)?;

        let bind_addr: SocketAddr = lookup("OPENVEND_BIND_ADDR")
            .unwrap_or_else(|| constants::DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|_| invalid("OPENVEND_BIND_ADDR", "not a host:port address"))?;

        let journal_path = lookup("OPENVEND_JOURNAL_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self { bind_addr, verifier, ledger, issuance, journal_path })
    }
}

fn required(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(invalid(key, "set but empty")),
        None => Err(invalid(key, "required but unset")),
    }
}

fn parsed<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(key, format!("cannot parse '{raw}'"))),
    }
}

/// `asset_id=amount` pairs, comma-separated: `3=25,7=10.5`.
fn parse_reward_table(raw: &str) -> Result<Vec<RewardRule>> {
    let mut table = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((id, amount)) = pair.split_once('=') else {
            return Err(invalid(
                "OPENVEND_REWARD_TABLE",
                format!("expected asset_id=amount, got '{pair}'"),
            ));
        };
        let asset_id = id.trim().parse::<u64>().map_err(|_| {
            invalid("OPENVEND_REWARD_TABLE", format!("bad asset id '{id}'"))
        })?;
        let amount = amount.trim().parse::<Decimal>().map_err(|_| {
            invalid("OPENVEND_REWARD_TABLE", format!("bad amount '{amount}'"))
        })?;
        if amount < Decimal::ZERO {
            return Err(invalid("OPENVEND_REWARD_TABLE", "negative amount"));
        }
        table.push(RewardRule { asset_id: AssetId(asset_id), amount });
    }
    Ok(table)
}

fn invalid(key: &str, reason: impl Into<String>) -> VendError {
    VendError::InvalidEnv { key: key.to_string(), reason: reason.into() }
}
