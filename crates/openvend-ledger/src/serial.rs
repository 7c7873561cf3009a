//! Per-account submission serialization.
//!
//! Every instruction spends from the single issuing account, and the ledger
//! orders an account's transactions by sequence number. Two submissions in
//! flight at once can race that sequence and void one another. `SerialLedger`
//! wraps any client and admits one `submit` at a time; reads and confirmation
//! waits pass through untouched so unrelated claims still make progress.
//!
//! This guard is independent of the claim ledger: the claim ledger serializes
//! *claims*, this serializes *account admission*.

use async_trait::async_trait;
use tokio::sync::Mutex;

use openvend_types::{Address, AssetId, Result, TxRef};

use crate::client::{Instruction, LedgerClient, TxReceipt, TxStatus};

/// Decorator holding the account admission gate.
pub struct SerialLedger<C> {
    inner: C,
    gate: Mutex<()>,
}

impl<C: LedgerClient> SerialLedger<C> {
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: LedgerClient> LedgerClient for SerialLedger<C> {
    async fn submit(&self, instruction: &Instruction) -> Result<TxRef> {
        let _admission = self.gate.lock().await;
        self.inner.submit(instruction).await
    }

    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<TxReceipt> {
        self.inner.await_confirmation(tx_ref).await
    }

    async fn transaction_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        self.inner.transaction_status(tx_ref).await
    }

    async fn holder_of(&self, asset_id: AssetId) -> Result<Address> {
        self.inner.holder_of(asset_id).await
    }
}
