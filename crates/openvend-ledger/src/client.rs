//! The `LedgerClient` contract: everything the pipeline asks of the ledger.
//!
//! The ledger is an external system with real money-like semantics. Every
//! failure a client implementation returns must classify into exactly one
//! [`FaultKind`](openvend_types::FaultKind); the coordinator's retry and
//! reconciliation policy dispatches on nothing else. Implementations must
//! never invent their own idempotency: deduplication belongs to the claim
//! ledger upstream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use openvend_types::{Address, AssetId, Leg, Result, TxHash, TxRef};

/// One instruction the pipeline can submit.
///
/// The `tx_ref` is derived deterministically from the claim's asset and the
/// leg, so the same logical instruction always carries the same reference no
/// matter how many times or from which process it is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub tx_ref: TxRef,
    pub kind: InstructionKind,
}

/// The two instruction shapes of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InstructionKind {
    /// Move one scarce asset from the issuing account to the recipient.
    TransferAsset { asset_id: AssetId, to: Address },
    /// Pay a fungible reward amount to the recipient.
    PayReward { to: Address, amount: Decimal },
}

impl Instruction {
    #[must_use]
    pub fn transfer_asset(asset_id: AssetId, to: Address) -> Self {
        Self {
            tx_ref: TxRef::deterministic(asset_id, Leg::Transfer),
            kind: InstructionKind::TransferAsset { asset_id, to },
        }
    }

    /// The reward leg borrows the claim's asset id for its reference even
    /// though the payout itself is fungible: the ref identifies the leg of a
    /// claim, not the asset being moved.
    #[must_use]
    pub fn pay_reward(claim_asset: AssetId, to: Address, amount: Decimal) -> Self {
        Self {
            tx_ref: TxRef::deterministic(claim_asset, Leg::Reward),
            kind: InstructionKind::PayReward { to, amount },
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            InstructionKind::TransferAsset { asset_id, to } => {
                write!(f, "transfer {} -> {}", asset_id, to.short())
            }
            InstructionKind::PayReward { to, amount } => {
                write!(f, "reward {} -> {}", amount, to.short())
            }
        }
    }
}

/// Confirmation evidence for a finalized transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    /// Position the ledger reports for the confirmed transaction, when it
    /// reports one.
    pub block: Option<u64>,
    pub confirmed_at: DateTime<Utc>,
}

impl TxReceipt {
    #[must_use]
    pub fn new(tx_hash: TxHash, block: Option<u64>) -> Self {
        Self {
            tx_hash,
            block,
            confirmed_at: Utc::now(),
        }
    }
}

/// What the ledger knows about a reference right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Finalized. Carries the evidence.
    Confirmed(TxReceipt),
    /// Admitted but not yet final.
    Pending,
    /// The ledger has never seen this reference.
    Unknown,
    /// The ledger saw it and discarded it; it will never confirm.
    Dropped,
}

/// Async contract against the external ledger node.
///
/// `submit` returns the instruction's reference once the node **accepted** the
/// instruction for processing; acceptance is not finality. Finality comes from
/// `await_confirmation`, which drives the reference to a terminal answer or a
/// deadline.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Hand the instruction to the ledger node.
    ///
    /// # Errors
    /// - `LedgerRejected` when the node refused it (never auto-retry).
    /// - `LedgerUnreachable` when nothing reached the node (retry with backoff).
    /// - `SubmitOutcomeUnknown` when the request died mid-flight (reconcile
    ///   before any resubmission).
    async fn submit(&self, instruction: &Instruction) -> Result<TxRef>;

    /// Wait until the reference confirms, is dropped, or the configured
    /// deadline passes.
    ///
    /// # Errors
    /// - `LedgerRejected` when the ledger reports the transaction dropped.
    /// - `ConfirmTimeout` at the deadline; the outcome stays unknown.
    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<TxReceipt>;

    /// Read-only status of a reference. The reconciliation primitive.
    async fn transaction_status(&self, tx_ref: &TxRef) -> Result<TxStatus>;

    /// Current holder of a scarce asset.
    async fn holder_of(&self, asset_id: AssetId) -> Result<Address>;
}
