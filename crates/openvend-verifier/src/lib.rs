//! # openvend-verifier
//!
//! The trust boundary of the OpenVend pipeline. Everything that decides
//! whether a webhook delivery is *authentic, fresh, relevant, and well-formed*
//! lives here; nothing here performs side effects.
//!
//! ## Architecture
//!
//! ```text
//!   raw body + signature header
//!            │
//!            ▼
//!   ┌──────────────────┐   Err: SignatureMissing / SignatureInvalid / StaleEvent
//!   │ signature module │──────────────────────────────────────────────▶ 4xx
//!   └────────┬─────────┘
//!            ▼
//!   ┌──────────────────┐   Err: MalformedEnvelope / MalformedClaim
//!   │   event module   │──────────────────────────────────────────────▶ 4xx
//!   └────────┬─────────┘
//!            ▼
//!   Disposition::Actionable(Claim) | Disposition::Ignored
//! ```

pub mod event;
pub mod signature;

pub use event::{Disposition, EventVerifier};
