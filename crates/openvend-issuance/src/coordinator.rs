//! The issuance state machine: one verified claim in, exactly one recorded
//! outcome and at most one scarce transfer out.
//!
//! Per claim the flow is:
//! 1. **Admission** — win the claim via the claim ledger's check-and-set, or
//!    stop as a duplicate (success-as-noop).
//! 2. **Reconcile** — if the previous attempt ended in an unknown outcome,
//!    a read-only status query decides before anything is resubmitted.
//! 3. **Pre-check** — who holds the asset right now; skip or refuse instead
//!    of submitting a doomed transfer.
//! 4. **Leg 1** — scarce-asset transfer, submit + confirm to finality.
//! 5. **Leg 2** — fungible reward payout, submit + confirm.
//! 6. **Record** — exactly one `record_outcome` per won claim, always.
//!
//! Partial-failure policy: once leg 1 is final the claim records `ISSUED`
//! even when leg 2 fails. The scarce transfer is the action that must never
//! repeat; the reward is fungible and independently retryable through
//! [`IssuanceCoordinator::retry_reward`].

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use openvend_ledger::{
    submit_with_retry, Instruction, LedgerClient, RetryPolicy, TxReceipt, TxStatus,
};
use openvend_types::{
    Claim, ClaimKey, ClaimStatus, FaultKind, IssuanceConfig, Leg, Result, TxHash, TxRef, VendError,
};

use crate::claim_ledger::{BeginIssuance, ClaimLedger, ClaimOutcome, RewardResult};

/// Evidence handed back for a concluded issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceReceipt {
    pub key: ClaimKey,
    /// Transfer-leg hash; `None` when the leg was skipped because the
    /// recipient already held the asset.
    pub tx_hash: Option<TxHash>,
    pub reward_tx_hash: Option<TxHash>,
}

/// What one delivery of a claim amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// Both legs done (or no reward was due).
    Issued(IssuanceReceipt),
    /// Transfer final, reward owed. The claim is `ISSUED`; only the reward
    /// leg may run again.
    PartiallyIssued { receipt: IssuanceReceipt, reward_fault: FaultKind },
    /// Duplicate of a completed claim. Success-as-noop.
    AlreadyIssued { tx_hash: Option<TxHash> },
    /// A concurrent execution owns the claim. Success-as-noop.
    InProgress,
    /// The attempt concluded without issuing; the claim is `FAILED` and
    /// re-enterable.
    Failed { fault: FaultKind, detail: String },
}

impl IssuanceOutcome {
    /// Whether a redelivery of the same notification can make progress.
    /// Drives the transport-level status code upstream.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Failed { fault, .. } => fault.is_retryable(),
            _ => false,
        }
    }
}

/// Result of an out-of-band reward retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardRetryOutcome {
    Paid(TxHash),
    /// The record carries no reward debt. No-op.
    NothingOwed,
    /// The payout still owes; the annotation was refreshed with this fault.
    StillOwed(FaultKind),
}

/// Internal conclusion of an owned attempt, before it is recorded.
enum Conclusion {
    Issued {
        tx_hash: Option<TxHash>,
        reward_tx_hash: Option<TxHash>,
        reward_fault: Option<FaultKind>,
    },
    Failed { fault: FaultKind, detail: String },
}

/// Drives verified claims to exactly-once issuance.
pub struct IssuanceCoordinator {
    claims: Arc<dyn ClaimLedger>,
    ledger: Arc<dyn LedgerClient>,
    config: IssuanceConfig,
    retry: RetryPolicy,
}

impl IssuanceCoordinator {
    #[must_use]
    pub fn new(
        claims: Arc<dyn ClaimLedger>,
        ledger: Arc<dyn LedgerClient>,
        config: IssuanceConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self { claims, ledger, config, retry }
    }

    /// Process one actionable claim.
    ///
    /// Ledger failures are folded into the returned outcome (and the claim
    /// record); an `Err` here means the claim ledger itself failed and the
    /// delivery should be retried by the caller.
    #[instrument(skip_all, fields(key = %claim.key(), order_id = %claim.order_id))]
    pub async fn process(&self, claim: &Claim) -> Result<IssuanceOutcome> {
        // 1. Admission.
        let prior_fault = match self.claims.try_begin_issuance(claim).await? {
            BeginIssuance::AlreadyIssued { tx_hash } => {
                info!("duplicate delivery of an issued claim, acknowledging");
                return Ok(IssuanceOutcome::AlreadyIssued { tx_hash });
            }
            BeginIssuance::AlreadyInProgress => {
                info!("claim owned by a concurrent execution, acknowledging");
                return Ok(IssuanceOutcome::InProgress);
            }
            BeginIssuance::Won { prior_fault } => prior_fault,
        };

        // 2..5. The claim is owned: run the legs, then record exactly once.
        let conclusion = self.execute(claim, prior_fault).await;

        // 6. Record.
        match conclusion {
            Conclusion::Issued { tx_hash, reward_tx_hash, reward_fault } => {
                self.claims
                    .record_outcome(
                        claim.key(),
                        ClaimOutcome::Issued {
                            tx_hash: tx_hash.clone(),
                            reward_tx_hash: reward_tx_hash.clone(),
                            reward_fault,
                        },
                    )
                    .await?;
                let receipt = IssuanceReceipt { key: claim.key(), tx_hash, reward_tx_hash };
                match reward_fault {
                    None => {
                        info!(tx_hash = ?receipt.tx_hash, "claim issued");
                        Ok(IssuanceOutcome::Issued(receipt))
                    }
                    Some(fault) => {
                        warn!(%fault, "claim issued with reward leg owing");
                        Ok(IssuanceOutcome::PartiallyIssued { receipt, reward_fault: fault })
                    }
                }
            }
            Conclusion::Failed { fault, detail } => {
                warn!(%fault, detail, "issuance attempt failed");
                self.claims
                    .record_outcome(
                        claim.key(),
                        ClaimOutcome::Failed { fault, detail: detail.clone() },
                    )
                    .await?;
                Ok(IssuanceOutcome::Failed { fault, detail })
            }
        }
    }

    async fn execute(&self, claim: &Claim, prior_fault: Option<FaultKind>) -> Conclusion {
        let transfer_ref = TxRef::deterministic(claim.asset_id, Leg::Transfer);

        // 2. Reconcile a prior unknown outcome before any resubmission.
        let mut adopted: Option<TxHash> = None;
        if prior_fault == Some(FaultKind::Timeout) {
            match self.ledger.transaction_status(&transfer_ref).await {
                Ok(TxStatus::Confirmed(receipt)) => {
                    info!(tx_hash = %receipt.tx_hash, "prior transfer confirmed after timeout, adopting");
                    adopted = Some(receipt.tx_hash);
                }
                Ok(TxStatus::Pending) => {
                    return Conclusion::Failed {
                        fault: FaultKind::Timeout,
                        detail: "prior transfer still pending on the ledger".to_string(),
                    };
                }
                // Unknown: the earlier submission never took. Dropped: it
                // took and died. Either way nothing is in flight.
                Ok(TxStatus::Unknown | TxStatus::Dropped) => {}
                Err(err) => {
                    return Conclusion::Failed {
                        fault: FaultKind::Timeout,
                        detail: format!("prior outcome unresolved, status query failed: {err}"),
                    };
                }
            }
        }

        let tx_hash = if let Some(hash) = adopted {
            Some(hash)
        } else {
            // 3. Ownership pre-check.
            match self.ledger.holder_of(claim.asset_id).await {
                Ok(holder) if holder == self.config.issuer => {
                    // 4. Leg 1: the scarce transfer.
                    let instruction = Instruction::transfer_asset(claim.asset_id, claim.recipient);
                    match self.run_leg(instruction).await {
                        Ok(receipt) => Some(receipt.tx_hash),
                        Err(err) => {
                            return Conclusion::Failed {
                                fault: classify(&err),
                                detail: err.to_string(),
                            };
                        }
                    }
                }
                Ok(holder) if holder == claim.recipient => {
                    info!(asset = %claim.asset_id, "recipient already holds the asset, skipping transfer leg");
                    None
                }
                Ok(holder) => {
                    let err = VendError::AssetHeldElsewhere {
                        asset_id: claim.asset_id,
                        holder: holder.to_string(),
                    };
                    return Conclusion::Failed {
                        fault: FaultKind::Rejected,
                        detail: err.to_string(),
                    };
                }
                Err(err) => {
                    return Conclusion::Failed { fault: classify(&err), detail: err.to_string() };
                }
            }
        };

        // 5. Leg 2: the reward payout, only after leg 1 is settled.
        let amount = self.effective_reward(claim);
        if amount.is_zero() {
            return Conclusion::Issued { tx_hash, reward_tx_hash: None, reward_fault: None };
        }
        let instruction = Instruction::pay_reward(claim.asset_id, claim.recipient, amount);
        match self.run_leg(instruction).await {
            Ok(receipt) => Conclusion::Issued {
                tx_hash,
                reward_tx_hash: Some(receipt.tx_hash),
                reward_fault: None,
            },
            Err(err) => {
                warn!(error = %err, "reward leg failed, transfer stands");
                Conclusion::Issued {
                    tx_hash,
                    reward_tx_hash: None,
                    reward_fault: Some(classify(&err)),
                }
            }
        }
    }

    /// Retry the owed reward of an issued claim, out of band.
    ///
    /// # Errors
    /// [`VendError::ClaimNotFound`] for an unknown key;
    /// [`VendError::RewardNotPending`] for a record that is not `ISSUED`;
    /// claim-ledger I/O errors.
    #[instrument(skip(self))]
    pub async fn retry_reward(&self, key: ClaimKey) -> Result<RewardRetryOutcome> {
        let record = self.claims.get(key).await?.ok_or(VendError::ClaimNotFound(key))?;
        if record.status != ClaimStatus::Issued {
            return Err(VendError::RewardNotPending { key });
        }
        let Some(owed_fault) = record.reward_fault else {
            return Ok(RewardRetryOutcome::NothingOwed);
        };
        let reward_ref = TxRef::deterministic(key.asset_id(), Leg::Reward);

        // Same rule as the transfer leg: an unknown outcome is read before
        // anything is resubmitted.
        if owed_fault == FaultKind::Timeout {
            match self.ledger.transaction_status(&reward_ref).await {
                Ok(TxStatus::Confirmed(receipt)) => {
                    info!(tx_hash = %receipt.tx_hash, "prior reward confirmed after timeout, adopting");
                    self.claims
                        .record_reward_result(key, RewardResult::Paid(receipt.tx_hash.clone()))
                        .await?;
                    return Ok(RewardRetryOutcome::Paid(receipt.tx_hash));
                }
                Ok(TxStatus::Pending) => {
                    self.claims
                        .record_reward_result(key, RewardResult::Failed(FaultKind::Timeout))
                        .await?;
                    return Ok(RewardRetryOutcome::StillOwed(FaultKind::Timeout));
                }
                Ok(TxStatus::Unknown | TxStatus::Dropped) => {}
                Err(err) => {
                    warn!(error = %err, "reward reconciliation query failed");
                    self.claims
                        .record_reward_result(key, RewardResult::Failed(FaultKind::Timeout))
                        .await?;
                    return Ok(RewardRetryOutcome::StillOwed(FaultKind::Timeout));
                }
            }
        }

        let amount = record
            .reward_amount
            .unwrap_or_else(|| self.config.reward_for(key.asset_id()));
        if amount.is_zero() {
            warn!(%key, "reward owed but the effective amount is zero, leaving annotation");
            return Ok(RewardRetryOutcome::NothingOwed);
        }
        let instruction = Instruction::pay_reward(key.asset_id(), record.recipient, amount);
        match self.run_leg(instruction).await {
            Ok(receipt) => {
                self.claims
                    .record_reward_result(key, RewardResult::Paid(receipt.tx_hash.clone()))
                    .await?;
                info!(tx_hash = %receipt.tx_hash, "owed reward paid");
                Ok(RewardRetryOutcome::Paid(receipt.tx_hash))
            }
            Err(err) => {
                let fault = classify(&err);
                self.claims.record_reward_result(key, RewardResult::Failed(fault)).await?;
                Ok(RewardRetryOutcome::StillOwed(fault))
            }
        }
    }

    /// Submit one leg and hold for finality.
    async fn run_leg(&self, instruction: Instruction) -> Result<TxReceipt> {
        let tx_ref = submit_with_retry(self.ledger.as_ref(), &self.retry, &instruction).await?;
        self.ledger.await_confirmation(&tx_ref).await
    }

    /// The event's explicit amount wins; otherwise the configured per-asset
    /// table, then the default. Zero disables the leg.
    fn effective_reward(&self, claim: &Claim) -> Decimal {
        claim.reward_amount.unwrap_or_else(|| self.config.reward_for(claim.asset_id))
    }
}

/// Every error that crossed the ledger boundary carries a fault kind; one
/// that does not is treated as `Rejected` so nothing retries it blindly.
fn classify(err: &VendError) -> FaultKind {
    err.fault_kind().unwrap_or(FaultKind::Rejected)
}
