//! Bounded submission retry with exponential backoff.
//!
//! Only `Unreachable` faults retry: nothing reached the ledger, so a second
//! attempt cannot double-execute. `Rejected` exits immediately (the node said
//! no) and `Timeout`-class faults exit immediately (the outcome is unknown;
//! resolving that is the coordinator's reconciliation job, not a resubmit).

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use openvend_types::{constants, FaultKind, LedgerConfig, Result, TxRef};

use crate::client::{Instruction, LedgerClient};

/// Backoff schedule for submission attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub backoff_base: Duration,
    /// Upper bound on any single delay.
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(attempts: u32, backoff_base: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_base,
            backoff_cap: Duration::from_millis(constants::SUBMIT_BACKOFF_CAP_MS),
        }
    }

    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.submit_attempts,
            Duration::from_millis(config.submit_backoff_base_ms),
        )
    }

    /// Delay after the given zero-based failed attempt: `base * 2^attempt`,
    /// jittered by ±12.5% so simultaneous retriers spread out, capped.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(8);
        let raw = self.backoff_base.saturating_mul(factor);
        let jitter = rand::thread_rng().gen_range(0.875..=1.125);
        raw.mul_f64(jitter).min(self.backoff_cap)
    }
}

/// Submit, retrying transport failures per the policy.
///
/// # Errors
/// The last attempt's error, or any non-`Unreachable` error immediately.
pub async fn submit_with_retry(
    client: &dyn LedgerClient,
    policy: &RetryPolicy,
    instruction: &Instruction,
) -> Result<TxRef> {
    let mut attempt = 0u32;
    loop {
        match client.submit(instruction).await {
            Ok(tx_ref) => return Ok(tx_ref),
            Err(err)
                if err.fault_kind() == Some(FaultKind::Unreachable)
                    && attempt + 1 < policy.attempts =>
            {
                let delay = policy.backoff(attempt);
                warn!(%instruction, attempt, ?delay, error = %err, "ledger unreachable, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
