//! # openvend-types
//!
//! Shared types, errors, and configuration for the **OpenVend** issuance
//! pipeline.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`AssetId`], [`Address`], [`TxHash`], [`TxRef`], [`Leg`], [`DeliveryId`]
//! - **Claim model**: [`Claim`], [`ClaimKey`], [`ClaimRecord`], [`ClaimStatus`]
//! - **Errors**: [`VendError`] with `OV_ERR_` prefix codes, [`FaultKind`]
//! - **Configuration**: [`VerifierConfig`], [`LedgerConfig`], [`IssuanceConfig`], [`EndpointSecret`]
//! - **Constants**: system-wide limits and defaults

pub mod claim;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;

// Re-export all primary types at crate root for ergonomic imports:
//   use openvend_types::{Claim, ClaimRecord, VendError, ...};

pub use claim::*;
pub use config::*;
pub use error::*;
pub use ids::*;

// Constants are accessed via `openvend_types::constants::FOO`
// (not re-exported to avoid name collisions).
