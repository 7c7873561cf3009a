//! # openvend-issuance
//!
//! **Coordination plane**: the claim ledger (exactly-once admission) and the
//! issuance coordinator (the two-leg ledger flow).
//!
//! ## Architecture
//!
//! A verified claim enters through [`IssuanceCoordinator::process`], which:
//! 1. Wins or loses the claim atomically (`ClaimLedger::try_begin_issuance`)
//! 2. Reconciles a prior unknown outcome by reading, never by resubmitting
//! 3. Pre-checks asset ownership before the scarce transfer
//! 4. Runs the transfer leg, then the reward leg, strictly in that order
//! 5. Records exactly one outcome per won claim
//!
//! ## Claim ledgers
//!
//! - [`MemoryClaimLedger`] — in-process, lost on restart
//! - [`JournalClaimLedger`] — append-only JSONL file, replayed on open
//!
//! Both share one check-and-set routine, so their admission semantics are
//! identical; the journal only adds durability.

pub mod claim_ledger;
pub mod coordinator;
pub mod journal;

pub use claim_ledger::{
    BeginIssuance, ClaimLedger, ClaimOutcome, MemoryClaimLedger, RewardResult,
};
pub use coordinator::{IssuanceCoordinator, IssuanceOutcome, IssuanceReceipt, RewardRetryOutcome};
pub use journal::JournalClaimLedger;
