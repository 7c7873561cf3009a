//! Scriptable in-memory ledger for tests. **Never use in production.**
//!
//! Outcomes are scripted per transaction reference as FIFO queues; an
//! unscripted call takes the benign default (submit accepts, confirmation
//! confirms with a synthesized hash, status reads `Unknown`). Call counts and
//! accepted instructions are recorded so tests can assert *exactly how many*
//! ledger effects a flow produced.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use openvend_types::{Address, AssetId, FaultKind, Result, TxHash, TxRef, VendError};

use crate::client::{Instruction, LedgerClient, TxReceipt, TxStatus};

#[derive(Debug, Clone)]
enum ConfirmPlan {
    Hash(TxHash),
    Fail(FaultKind),
}

#[derive(Default)]
struct MockState {
    submit_failures: HashMap<TxRef, VecDeque<FaultKind>>,
    confirm_plans: HashMap<TxRef, VecDeque<ConfirmPlan>>,
    status_plans: HashMap<TxRef, VecDeque<TxStatus>>,
    holders: HashMap<AssetId, Address>,
    submitted: Vec<Instruction>,
    submit_calls: u32,
    confirm_calls: u32,
    status_calls: u32,
    holder_calls: u32,
}

/// Scriptable [`LedgerClient`] double.
pub struct MockLedger {
    issuer: Address,
    state: Mutex<MockState>,
    current_submits: AtomicU32,
    max_concurrent_submits: AtomicU32,
}

impl MockLedger {
    /// A fresh ledger where the issuer holds every asset.
    #[must_use]
    pub fn new(issuer: Address) -> Self {
        Self {
            issuer,
            state: Mutex::new(MockState::default()),
            current_submits: AtomicU32::new(0),
            max_concurrent_submits: AtomicU32::new(0),
        }
    }

    // -- scripting ---------------------------------------------------------

    /// Queue one failing outcome for the next `submit` of this reference.
    pub fn script_submit_failure(&self, tx_ref: TxRef, kind: FaultKind) {
        self.state
            .lock()
            .submit_failures
            .entry(tx_ref)
            .or_default()
            .push_back(kind);
    }

    /// Fix the hash the next confirmation of this reference reports.
    pub fn script_confirm_hash(&self, tx_ref: TxRef, tx_hash: TxHash) {
        self.state
            .lock()
            .confirm_plans
            .entry(tx_ref)
            .or_default()
            .push_back(ConfirmPlan::Hash(tx_hash));
    }

    /// Queue one failing outcome for the next confirmation of this reference.
    pub fn script_confirm_failure(&self, tx_ref: TxRef, kind: FaultKind) {
        self.state
            .lock()
            .confirm_plans
            .entry(tx_ref)
            .or_default()
            .push_back(ConfirmPlan::Fail(kind));
    }

    /// Queue one status answer for this reference.
    pub fn script_status(&self, tx_ref: TxRef, status: TxStatus) {
        self.state
            .lock()
            .status_plans
            .entry(tx_ref)
            .or_default()
            .push_back(status);
    }

    /// Override who holds an asset.
    pub fn set_holder(&self, asset_id: AssetId, holder: Address) {
        self.state.lock().holders.insert(asset_id, holder);
    }

    // -- inspection --------------------------------------------------------

    #[must_use]
    pub fn submit_calls(&self) -> u32 {
        self.state.lock().submit_calls
    }

    #[must_use]
    pub fn confirm_calls(&self) -> u32 {
        self.state.lock().confirm_calls
    }

    #[must_use]
    pub fn status_calls(&self) -> u32 {
        self.state.lock().status_calls
    }

    #[must_use]
    pub fn holder_calls(&self) -> u32 {
        self.state.lock().holder_calls
    }

    /// Every call that crossed the ledger boundary, of any kind.
    #[must_use]
    pub fn total_calls(&self) -> u32 {
        let state = self.state.lock();
        state.submit_calls + state.confirm_calls + state.status_calls + state.holder_calls
    }

    /// Instructions the ledger *accepted* (failed submits are not listed).
    #[must_use]
    pub fn submitted(&self) -> Vec<Instruction> {
        self.state.lock().submitted.clone()
    }

    /// Peak number of submits that were ever in flight at once.
    #[must_use]
    pub fn max_concurrent_submits(&self) -> u32 {
        self.max_concurrent_submits.load(Ordering::SeqCst)
    }

    fn default_confirm_hash(tx_ref: &TxRef) -> TxHash {
        TxHash::new(format!("0x{}", &tx_ref.to_string()[..8]))
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit(&self, instruction: &Instruction) -> Result<TxRef> {
        let in_flight = self.current_submits.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_submits.fetch_max(in_flight, Ordering::SeqCst);
        // Yield so overlapping submits are observable even on a
        // current-thread runtime.
        tokio::task::yield_now().await;

        let outcome = {
            let mut state = self.state.lock();
            state.submit_calls += 1;
            let failure = state
                .submit_failures
                .get_mut(&instruction.tx_ref)
                .and_then(VecDeque::pop_front);
            match failure {
                None => {
                    state.submitted.push(instruction.clone());
                    Ok(instruction.tx_ref)
                }
                Some(FaultKind::Rejected) => Err(VendError::LedgerRejected {
                    reason: "scripted rejection".to_string(),
                }),
                Some(FaultKind::Unreachable) => Err(VendError::LedgerUnreachable {
                    reason: "scripted transport failure".to_string(),
                }),
                Some(FaultKind::Timeout) => Err(VendError::SubmitOutcomeUnknown {
                    tx_ref: instruction.tx_ref,
                }),
            }
        };

        self.current_submits.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<TxReceipt> {
        let mut state = self.state.lock();
        state.confirm_calls += 1;
        let plan = state
            .confirm_plans
            .get_mut(tx_ref)
            .and_then(VecDeque::pop_front);
        match plan {
            None => Ok(TxReceipt::new(Self::default_confirm_hash(tx_ref), Some(1))),
            Some(ConfirmPlan::Hash(tx_hash)) => Ok(TxReceipt::new(tx_hash, Some(1))),
            Some(ConfirmPlan::Fail(FaultKind::Timeout)) => Err(VendError::ConfirmTimeout {
                tx_ref: *tx_ref,
                waited_ms: 120_000,
            }),
            Some(ConfirmPlan::Fail(FaultKind::Rejected)) => Err(VendError::LedgerRejected {
                reason: "transaction dropped".to_string(),
            }),
            Some(ConfirmPlan::Fail(FaultKind::Unreachable)) => Err(VendError::LedgerUnreachable {
                reason: "scripted transport failure".to_string(),
            }),
        }
    }

    async fn transaction_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        let mut state = self.state.lock();
        state.status_calls += 1;
        let status = state
            .status_plans
            .get_mut(tx_ref)
            .and_then(VecDeque::pop_front)
            .unwrap_or(TxStatus::Unknown);
        Ok(status)
    }

    async fn holder_of(&self, asset_id: AssetId) -> Result<Address> {
        let mut state = self.state.lock();
        state.holder_calls += 1;
        Ok(state.holders.get(&asset_id).copied().unwrap_or(self.issuer))
    }
}
