//! System-wide constants for the OpenVend issuance pipeline.

/// Signature freshness window in seconds (two-sided around the header timestamp).
pub const DEFAULT_SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Event type the pipeline acts on when no allow-list is configured.
pub const DEFAULT_ALLOWED_EVENT: &str = "checkout.session.completed";

/// HTTP header carrying the processor's timestamped signature.
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

/// Total submission attempts for transport-level (unreachable) failures.
pub const DEFAULT_SUBMIT_ATTEMPTS: u32 = 3;

/// Base delay for exponential submission backoff, in milliseconds.
pub const DEFAULT_SUBMIT_BACKOFF_BASE_MS: u64 = 2_000;

/// Hard cap on a single backoff sleep, in milliseconds.
pub const SUBMIT_BACKOFF_CAP_MS: u64 = 60_000;

/// Deadline for one leg's confirmation wait, in seconds.
pub const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 120;

/// Interval between confirmation status polls, in milliseconds.
pub const DEFAULT_CONFIRM_POLL_MS: u64 = 2_000;

/// Per-request timeout for ledger RPC calls, in seconds.
pub const DEFAULT_RPC_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default webhook listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Maximum accepted webhook body size in bytes.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const SERVICE_NAME: &str = "OpenVend";
