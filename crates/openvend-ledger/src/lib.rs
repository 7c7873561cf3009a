//! # openvend-ledger
//!
//! Everything that crosses the wire to the external ledger network. This
//! crate owns the [`LedgerClient`] contract and its production implementation;
//! it deliberately owns **no** idempotency state. Whether an instruction
//! *should* be submitted is the claim ledger's decision upstream — this crate
//! only makes submission honest about its failure modes.
//!
//! ## Layering
//!
//! ```text
//!   IssuanceCoordinator
//!        │  submit / await_confirmation / transaction_status / holder_of
//!        ▼
//!   SerialLedger          one in-flight submit per issuing account
//!        ▼
//!   RpcLedgerClient       JSON-RPC 2.0, fault classification
//!        ▼
//!   ledger node
//! ```
//!
//! [`retry::submit_with_retry`] sits beside the stack: it re-issues a submit
//! only for `Unreachable` faults, with bounded exponential backoff.

pub mod client;
#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;
pub mod retry;
pub mod rpc;
pub mod serial;

pub use client::{Instruction, InstructionKind, LedgerClient, TxReceipt, TxStatus};
#[cfg(any(test, feature = "test-helpers"))]
pub use mock::MockLedger;
pub use retry::{submit_with_retry, RetryPolicy};
pub use rpc::RpcLedgerClient;
pub use serial::SerialLedger;
