//! # openvend-gateway
//!
//! **Transport plane**: the axum webhook endpoint, the pipeline-outcome →
//! HTTP status mapping, and the process wiring binary.
//!
//! ## Architecture
//!
//! One `POST /webhook` route receives processor notifications:
//! 1. Raw body bytes and the signature header go to the verifier
//! 2. Actionable claims go to the issuance coordinator
//! 3. The outcome maps to a status code that steers processor redelivery
//!    (see `handlers` for why `Rejected` failures acknowledge with 200)
//!
//! `GET /healthz` serves deployment probes. All configuration is resolved
//! from `OPENVEND_*` environment variables at startup, fallibly.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::GatewayConfig;
pub use router::build_router;
pub use state::AppState;
