//! # Claim — the unit of exactly-once issuance
//!
//! A `Claim` is what a verified payment event asks for: one scarce asset
//! delivered to one recipient, plus an optional fungible reward. A
//! `ClaimRecord` is the durable account of what happened to that claim.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐   begin    ┌─────────┐  outcome   ┌────────┐
//!   │ PENDING ├───────────▶│ ISSUING ├───────────▶│ ISSUED │
//!   └─────────┘            └───┬─────┘            └────────┘
//!                       ▲      │ outcome
//!                 retry │      ▼
//!                      ┌┴───────┐
//!                      │ FAILED │
//!                      └────────┘
//! ```
//!
//! `ISSUED` is terminal: the scarce transfer happened (or was found already
//! done) and must never run again. `FAILED` is re-enterable so a later
//! redelivery can retry. At most one holder of `ISSUING` exists per key at any
//! moment; that is the whole idempotency story.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AssetId, FaultKind, OrderId, Result, TxHash, VendError};

/// The lifecycle state of a claim.
///
/// Transitions are **monotonic** within an attempt:
/// - `Pending → Issuing` (an execution won the claim)
/// - `Issuing → Issued` (irreversible ledger effect confirmed)
/// - `Issuing → Failed` (attempt concluded without issuing)
/// - `Failed → Issuing` (a later delivery retries)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Record exists but no execution has claimed it yet.
    Pending,
    /// Exactly one execution is performing the ledger legs.
    Issuing,
    /// The scarce transfer is done. **Irreversible.**
    Issued,
    /// The last attempt concluded without issuing. Retryable.
    Failed,
}

impl ClaimStatus {
    /// Can this status transition to the given target?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending | Self::Failed, Self::Issuing) | (Self::Issuing, Self::Issued | Self::Failed)
        )
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Issuing => write!(f, "ISSUING"),
            Self::Issued => write!(f, "ISSUED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Deduplication key for a claim: the asset id alone.
///
/// Each scarce asset is sold at most once, so two orders racing for the same
/// asset are the same claim even when their order ids differ. Newtype so a
/// future re-keying stays a one-file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ClaimKey(AssetId);

impl ClaimKey {
    #[must_use]
    pub fn new(asset_id: AssetId) -> Self {
        Self(asset_id)
    }

    #[must_use]
    pub fn asset_id(self) -> AssetId {
        self.0
    }
}

impl std::fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "claim:{}", self.0.as_u64())
    }
}

/// What a verified payment event asks the pipeline to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// The processor's order / checkout-session id. Audit only.
    pub order_id: OrderId,
    /// Buyer's ledger address, canonicalized.
    pub recipient: crate::Address,
    /// The scarce asset being bought.
    pub asset_id: AssetId,
    /// Reward amount named by the event, if any. `None` defers to
    /// configuration; an explicit zero disables the reward leg.
    pub reward_amount: Option<Decimal>,
}

impl Claim {
    #[must_use]
    pub fn key(&self) -> ClaimKey {
        ClaimKey::new(self.asset_id)
    }
}

/// Dummy claim for unit tests.
#[cfg(any(test, feature = "test-helpers"))]
impl Claim {
    #[must_use]
    pub fn dummy(asset_id: u64) -> Self {
        Self {
            order_id: OrderId::new(format!("cs_test_{asset_id}")),
            recipient: "0x00a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f708"
                .parse()
                .expect("static test address"),
            asset_id: AssetId(asset_id),
            reward_amount: None,
        }
    }
}

/// Durable record of one claim's progress. One record per claim key; every
/// state change is journaled, so the latest line per key is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Deduplication key this record is stored under.
    pub key: ClaimKey,
    /// The order that first produced this claim.
    pub order_id: OrderId,
    /// Where the asset (and reward) goes.
    pub recipient: crate::Address,
    /// Reward amount carried by the claim, pre-resolution.
    pub reward_amount: Option<Decimal>,
    /// Current lifecycle status.
    pub status: ClaimStatus,
    /// Transfer-leg transaction hash. `None` until confirmed, and stays `None`
    /// when the transfer leg was skipped because the recipient already held
    /// the asset.
    pub tx_hash: Option<TxHash>,
    /// Reward-leg transaction hash, once the payout confirmed.
    pub reward_tx_hash: Option<TxHash>,
    /// Classification of the failure that parked this record in `FAILED`.
    pub fault: Option<FaultKind>,
    /// Human-readable detail for the fault. Operator-facing.
    pub fault_detail: Option<String>,
    /// Set on an `ISSUED` record whose reward leg failed: the transfer is
    /// done and final, the payout still owes. Cleared by a reward retry.
    pub reward_fault: Option<FaultKind>,
    /// How many times an execution won this claim.
    pub attempts: u32,
    /// When the claim reached `ISSUED`.
    pub issued_at: Option<DateTime<Utc>>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

impl ClaimRecord {
    /// Fresh record for a claim nothing has executed yet.
    #[must_use]
    pub fn new(claim: &Claim) -> Self {
        Self {
            key: claim.key(),
            order_id: claim.order_id.clone(),
            recipient: claim.recipient,
            reward_amount: claim.reward_amount,
            status: ClaimStatus::Pending,
            tx_hash: None,
            reward_tx_hash: None,
            fault: None,
            fault_detail: None,
            reward_fault: None,
            attempts: 0,
            issued_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Transition into `ISSUING`, granting the caller ownership of the claim.
    ///
    /// # Errors
    /// Returns `InvalidTransition` unless the current status is `PENDING` or
    /// `FAILED`.
    pub fn mark_issuing(&mut self) -> Result<()> {
        self.transition(ClaimStatus::Issuing)?;
        self.attempts += 1;
        self.fault = None;
        self.fault_detail = None;
        Ok(())
    }

    /// Conclude the attempt as issued. `reward_fault` carries the annotation
    /// for a partial issuance (transfer done, reward owed).
    ///
    /// # Errors
    /// Returns `InvalidTransition` unless the current status is `ISSUING`.
    pub fn mark_issued(
        &mut self,
        tx_hash: Option<TxHash>,
        reward_tx_hash: Option<TxHash>,
        reward_fault: Option<FaultKind>,
    ) -> Result<()> {
        self.transition(ClaimStatus::Issued)?;
        self.tx_hash = tx_hash;
        self.reward_tx_hash = reward_tx_hash;
        self.reward_fault = reward_fault;
        self.issued_at = Some(self.updated_at);
        Ok(())
    }

    /// Conclude the attempt as failed. The record stays re-enterable.
    ///
    /// # Errors
    /// Returns `InvalidTransition` unless the current status is `ISSUING`.
    pub fn mark_failed(&mut self, kind: FaultKind, detail: impl Into<String>) -> Result<()> {
        self.transition(ClaimStatus::Failed)?;
        self.fault = Some(kind);
        self.fault_detail = Some(detail.into());
        Ok(())
    }

    /// Record a confirmed reward payout on an already-issued claim.
    ///
    /// # Errors
    /// Returns `RewardNotPending` unless the record is `ISSUED`.
    pub fn mark_reward_paid(&mut self, reward_tx_hash: TxHash) -> Result<()> {
        self.require_issued()?;
        self.reward_tx_hash = Some(reward_tx_hash);
        self.reward_fault = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record another reward failure on an already-issued claim.
    ///
    /// # Errors
    /// Returns `RewardNotPending` unless the record is `ISSUED`.
    pub fn mark_reward_failed(&mut self, kind: FaultKind) -> Result<()> {
        self.require_issued()?;
        self.reward_fault = Some(kind);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// An issued claim still owing its reward payout.
    #[must_use]
    pub fn has_pending_reward(&self) -> bool {
        self.status == ClaimStatus::Issued && self.reward_fault.is_some()
    }

    fn require_issued(&self) -> Result<()> {
        if self.status != ClaimStatus::Issued {
            return Err(VendError::RewardNotPending { key: self.key });
        }
        Ok(())
    }

    fn transition(&mut self, target: ClaimStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(VendError::InvalidTransition {
                key: self.key,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> ClaimRecord {
        ClaimRecord::new(&Claim::dummy(3))
    }

    #[test]
    fn status_transitions_valid() {
        assert!(ClaimStatus::Pending.can_transition_to(ClaimStatus::Issuing));
        assert!(ClaimStatus::Issuing.can_transition_to(ClaimStatus::Issued));
        assert!(ClaimStatus::Issuing.can_transition_to(ClaimStatus::Failed));
        assert!(ClaimStatus::Failed.can_transition_to(ClaimStatus::Issuing));
    }

    #[test]
    fn status_transitions_invalid() {
        assert!(!ClaimStatus::Issued.can_transition_to(ClaimStatus::Issuing));
        assert!(!ClaimStatus::Issued.can_transition_to(ClaimStatus::Failed));
        assert!(!ClaimStatus::Pending.can_transition_to(ClaimStatus::Issued));
        assert!(!ClaimStatus::Pending.can_transition_to(ClaimStatus::Failed));
        assert!(!ClaimStatus::Failed.can_transition_to(ClaimStatus::Issued));
    }

    #[test]
    fn key_is_the_asset_alone() {
        let mut a = Claim::dummy(3);
        let mut b = Claim::dummy(3);
        a.order_id = OrderId::new("cs_first");
        b.order_id = OrderId::new("cs_second");
        assert_eq!(a.key(), b.key(), "different orders, same asset, same claim");
        assert_ne!(Claim::dummy(3).key(), Claim::dummy(4).key());
    }

    #[test]
    fn issue_happy_path() {
        let mut rec = make_record();
        rec.mark_issuing().unwrap();
        assert_eq!(rec.status, ClaimStatus::Issuing);
        assert_eq!(rec.attempts, 1);

        rec.mark_issued(Some(TxHash::new("0x111")), None, None).unwrap();
        assert_eq!(rec.status, ClaimStatus::Issued);
        assert!(rec.issued_at.is_some());
        assert_eq!(rec.tx_hash, Some(TxHash::new("0x111")));
    }

    #[test]
    fn issued_is_terminal() {
        let mut rec = make_record();
        rec.mark_issuing().unwrap();
        rec.mark_issued(Some(TxHash::new("0x111")), None, None).unwrap();
        assert!(rec.mark_issuing().is_err(), "ISSUED -> ISSUING must fail");
        assert!(
            rec.mark_failed(FaultKind::Unreachable, "late").is_err(),
            "ISSUED -> FAILED must fail"
        );
    }

    #[test]
    fn failed_is_reenterable_and_counts_attempts() {
        let mut rec = make_record();
        rec.mark_issuing().unwrap();
        rec.mark_failed(FaultKind::Unreachable, "connect refused").unwrap();
        assert_eq!(rec.status, ClaimStatus::Failed);
        assert_eq!(rec.fault, Some(FaultKind::Unreachable));

        rec.mark_issuing().unwrap();
        assert_eq!(rec.attempts, 2);
        assert_eq!(rec.fault, None, "re-entry clears the old fault");
        assert_eq!(rec.fault_detail, None);
    }

    #[test]
    fn double_begin_blocked() {
        let mut rec = make_record();
        rec.mark_issuing().unwrap();
        assert!(rec.mark_issuing().is_err(), "ISSUING -> ISSUING must fail");
    }

    #[test]
    fn partial_issue_keeps_reward_fault() {
        let mut rec = make_record();
        rec.mark_issuing().unwrap();
        rec.mark_issued(Some(TxHash::new("0xaa")), None, Some(FaultKind::Timeout))
            .unwrap();
        assert!(rec.has_pending_reward());

        rec.mark_reward_paid(TxHash::new("0xbb")).unwrap();
        assert!(!rec.has_pending_reward());
        assert_eq!(rec.reward_tx_hash, Some(TxHash::new("0xbb")));
    }

    #[test]
    fn reward_updates_require_issued() {
        let mut rec = make_record();
        assert!(rec.mark_reward_paid(TxHash::new("0xbb")).is_err());
        assert!(rec.mark_reward_failed(FaultKind::Rejected).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let mut rec = make_record();
        rec.mark_issuing().unwrap();
        rec.mark_failed(FaultKind::Timeout, "confirm deadline").unwrap();
        let json = serde_json::to_string(&rec).unwrap();
        let back: ClaimRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec.key, back.key);
        assert_eq!(back.status, ClaimStatus::Failed);
        assert_eq!(back.fault, Some(FaultKind::Timeout));
        assert_eq!(back.attempts, 1);
    }
}
