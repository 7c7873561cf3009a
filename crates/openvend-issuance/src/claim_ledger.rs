//! The claim ledger: the single cross-request coordination point.
//!
//! `try_begin_issuance` is an atomic check-and-set over the claim's record.
//! Under any number of concurrent deliveries for the same key, exactly one
//! caller receives [`BeginIssuance::Won`]; everyone else learns the claim is
//! already in flight or already done. Every exactly-once property of the
//! pipeline reduces to this one operation, which is why implementations keep
//! the whole decision under one lock.
//!
//! The ledger client downstream must never be used as an idempotency source:
//! it has no memory of past calls, and resubmission through it can double-pay.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use openvend_types::{
    Claim, ClaimKey, ClaimRecord, ClaimStatus, FaultKind, Result, TxHash, VendError,
};

/// Answer of the begin-issuance check-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginIssuance {
    /// The caller owns the claim and MUST conclude with exactly one
    /// `record_outcome`. `prior_fault` carries the fault of the failed
    /// attempt being retried, `None` on first sight.
    Won { prior_fault: Option<FaultKind> },
    /// Another execution holds the claim right now. Not an error: the winner
    /// owns the outcome, the loser acknowledges and stops.
    AlreadyInProgress,
    /// The scarce transfer already happened. Terminal.
    AlreadyIssued { tx_hash: Option<TxHash> },
}

/// How an owned attempt concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The transfer leg is done (confirmed, adopted, or found already held).
    /// `reward_fault` annotates a partial issuance: transfer final, payout
    /// still owed.
    Issued {
        tx_hash: Option<TxHash>,
        reward_tx_hash: Option<TxHash>,
        reward_fault: Option<FaultKind>,
    },
    /// Nothing irreversible is known to have happened. Re-enterable.
    Failed { fault: FaultKind, detail: String },
}

/// Out-of-band reward bookkeeping on an issued record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardResult {
    Paid(TxHash),
    Failed(FaultKind),
}

/// Durable idempotency store for claims.
///
/// One record per [`ClaimKey`]; `try_begin_issuance` must be linearizable per
/// key with respect to concurrent callers.
#[async_trait]
pub trait ClaimLedger: Send + Sync {
    /// Atomic check-and-set: create-or-reenter the record in `ISSUING`, or
    /// report why not.
    async fn try_begin_issuance(&self, claim: &Claim) -> Result<BeginIssuance>;

    /// Conclude the attempt won earlier. `ISSUING → ISSUED` or
    /// `ISSUING → FAILED`.
    ///
    /// # Errors
    /// [`VendError::ClaimNotFound`] for an unknown key;
    /// [`VendError::InvalidTransition`] if the record is not `ISSUING`.
    async fn record_outcome(&self, key: ClaimKey, outcome: ClaimOutcome) -> Result<()>;

    /// Update the reward annotation on an `ISSUED` record. Never touches
    /// `status`.
    ///
    /// # Errors
    /// [`VendError::ClaimNotFound`] for an unknown key;
    /// [`VendError::RewardNotPending`] if the record is not `ISSUED`.
    async fn record_reward_result(&self, key: ClaimKey, result: RewardResult) -> Result<()>;

    /// Read-only snapshot, for reconciliation and operators.
    async fn get(&self, key: ClaimKey) -> Result<Option<ClaimRecord>>;
}

/// Applies the begin-issuance decision to one record slot. Shared by every
/// implementation so the CAS semantics cannot drift between them; the caller
/// holds whatever lock makes the read-decide-write atomic.
pub(crate) fn decide_begin(
    existing: Option<&ClaimRecord>,
    claim: &Claim,
) -> Result<(BeginIssuance, Option<ClaimRecord>)> {
    match existing {
        None => {
            let mut record = ClaimRecord::new(claim);
            record.mark_issuing()?;
            Ok((BeginIssuance::Won { prior_fault: None }, Some(record)))
        }
        Some(record) => match record.status {
            ClaimStatus::Issuing => Ok((BeginIssuance::AlreadyInProgress, None)),
            ClaimStatus::Issued => Ok((
                BeginIssuance::AlreadyIssued { tx_hash: record.tx_hash.clone() },
                None,
            )),
            ClaimStatus::Pending | ClaimStatus::Failed => {
                let prior_fault = record.fault;
                let mut next = record.clone();
                next.mark_issuing()?;
                Ok((BeginIssuance::Won { prior_fault }, Some(next)))
            }
        },
    }
}

/// Applies an outcome to the record. Same sharing rationale as
/// [`decide_begin`].
pub(crate) fn apply_outcome(record: &mut ClaimRecord, outcome: ClaimOutcome) -> Result<()> {
    match outcome {
        ClaimOutcome::Issued { tx_hash, reward_tx_hash, reward_fault } => {
            record.mark_issued(tx_hash, reward_tx_hash, reward_fault)
        }
        ClaimOutcome::Failed { fault, detail } => record.mark_failed(fault, detail),
    }
}

pub(crate) fn apply_reward_result(record: &mut ClaimRecord, result: RewardResult) -> Result<()> {
    match result {
        RewardResult::Paid(tx_hash) => record.mark_reward_paid(tx_hash),
        RewardResult::Failed(kind) => record.mark_reward_failed(kind),
    }
}

/// In-memory claim ledger. The mutex makes the check-and-set linearizable;
/// suitable for tests and single-process deployments that accept losing
/// records on restart (see `JournalClaimLedger` for the durable one).
#[derive(Default)]
pub struct MemoryClaimLedger {
    records: Mutex<HashMap<ClaimKey, ClaimRecord>>,
}

impl MemoryClaimLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys ever seen. Test and operator convenience.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl ClaimLedger for MemoryClaimLedger {
    async fn try_begin_issuance(&self, claim: &Claim) -> Result<BeginIssuance> {
        let mut records = self.records.lock();
        let (decision, updated) = decide_begin(records.get(&claim.key()), claim)?;
        if let Some(record) = updated {
            records.insert(claim.key(), record);
        }
        Ok(decision)
    }

    async fn record_outcome(&self, key: ClaimKey, outcome: ClaimOutcome) -> Result<()> {
        let mut records = self.records.lock();
        let record = records.get_mut(&key).ok_or(VendError::ClaimNotFound(key))?;
        apply_outcome(record, outcome)
    }

    async fn record_reward_result(&self, key: ClaimKey, result: RewardResult) -> Result<()> {
        let mut records = self.records.lock();
        let record = records.get_mut(&key).ok_or(VendError::ClaimNotFound(key))?;
        apply_reward_result(record, result)
    }

    async fn get(&self, key: ClaimKey) -> Result<Option<ClaimRecord>> {
        Ok(self.records.lock().get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn won(decision: &BeginIssuance) -> bool {
        matches!(decision, BeginIssuance::Won { .. })
    }

    #[tokio::test]
    async fn first_sight_wins_with_no_prior_fault() {
        let ledger = MemoryClaimLedger::new();
        let claim = Claim::dummy(3);
        let decision = ledger.try_begin_issuance(&claim).await.unwrap();
        assert_eq!(decision, BeginIssuance::Won { prior_fault: None });

        let record = ledger.get(claim.key()).await.unwrap().unwrap();
        assert_eq!(record.status, ClaimStatus::Issuing);
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn second_caller_sees_in_progress() {
        let ledger = MemoryClaimLedger::new();
        let claim = Claim::dummy(3);
        assert!(won(&ledger.try_begin_issuance(&claim).await.unwrap()));
        assert_eq!(
            ledger.try_begin_issuance(&claim).await.unwrap(),
            BeginIssuance::AlreadyInProgress
        );
    }

    #[tokio::test]
    async fn issued_is_terminal_and_reports_the_hash() {
        let ledger = MemoryClaimLedger::new();
        let claim = Claim::dummy(3);
        assert!(won(&ledger.try_begin_issuance(&claim).await.unwrap()));
        ledger
            .record_outcome(
                claim.key(),
                ClaimOutcome::Issued {
                    tx_hash: Some(TxHash::new("0x111")),
                    reward_tx_hash: None,
                    reward_fault: None,
                },
            )
            .await
            .unwrap();

        let decision = ledger.try_begin_issuance(&claim).await.unwrap();
        assert_eq!(
            decision,
            BeginIssuance::AlreadyIssued { tx_hash: Some(TxHash::new("0x111")) }
        );
    }

    #[tokio::test]
    async fn failed_reenters_and_reports_prior_fault() {
        let ledger = MemoryClaimLedger::new();
        let claim = Claim::dummy(3);
        assert!(won(&ledger.try_begin_issuance(&claim).await.unwrap()));
        ledger
            .record_outcome(
                claim.key(),
                ClaimOutcome::Failed {
                    fault: FaultKind::Timeout,
                    detail: "confirm deadline".to_string(),
                },
            )
            .await
            .unwrap();

        let decision = ledger.try_begin_issuance(&claim).await.unwrap();
        assert_eq!(decision, BeginIssuance::Won { prior_fault: Some(FaultKind::Timeout) });

        let record = ledger.get(claim.key()).await.unwrap().unwrap();
        assert_eq!(record.attempts, 2);
    }

    #[tokio::test]
    async fn outcome_for_unknown_key_is_not_found() {
        let ledger = MemoryClaimLedger::new();
        let err = ledger
            .record_outcome(
                Claim::dummy(9).key(),
                ClaimOutcome::Failed { fault: FaultKind::Rejected, detail: "x".to_string() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VendError::ClaimNotFound(_)));
    }

    #[tokio::test]
    async fn reward_result_requires_issued_record() {
        let ledger = MemoryClaimLedger::new();
        let claim = Claim::dummy(3);
        ledger.try_begin_issuance(&claim).await.unwrap();
        let err = ledger
            .record_reward_result(claim.key(), RewardResult::Paid(TxHash::new("0xbb")))
            .await
            .unwrap_err();
        assert!(matches!(err, VendError::RewardNotPending { .. }));
    }

    #[tokio::test]
    async fn reward_result_updates_issued_record() {
        let ledger = MemoryClaimLedger::new();
        let claim = Claim::dummy(3);
        ledger.try_begin_issuance(&claim).await.unwrap();
        ledger
            .record_outcome(
                claim.key(),
                ClaimOutcome::Issued {
                    tx_hash: Some(TxHash::new("0xaa")),
                    reward_tx_hash: None,
                    reward_fault: Some(FaultKind::Unreachable),
                },
            )
            .await
            .unwrap();

        ledger
            .record_reward_result(claim.key(), RewardResult::Paid(TxHash::new("0xbb")))
            .await
            .unwrap();
        let record = ledger.get(claim.key()).await.unwrap().unwrap();
        assert!(!record.has_pending_reward());
        assert_eq!(record.reward_tx_hash, Some(TxHash::new("0xbb")));
    }

    #[tokio::test]
    async fn distinct_assets_do_not_interfere() {
        let ledger = MemoryClaimLedger::new();
        assert!(won(&ledger.try_begin_issuance(&Claim::dummy(1)).await.unwrap()));
        assert!(won(&ledger.try_begin_issuance(&Claim::dummy(2)).await.unwrap()));
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_begins_have_exactly_one_winner() {
        let ledger = Arc::new(MemoryClaimLedger::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.try_begin_issuance(&Claim::dummy(3)).await.unwrap()
            }));
        }

        let mut wins = 0;
        let mut in_progress = 0;
        for handle in handles {
            match handle.await.unwrap() {
                BeginIssuance::Won { .. } => wins += 1,
                BeginIssuance::AlreadyInProgress => in_progress += 1,
                BeginIssuance::AlreadyIssued { .. } => panic!("nothing was issued"),
            }
        }
        assert_eq!(wins, 1, "exactly one concurrent caller may win");
        assert_eq!(in_progress, 31);
    }
}
