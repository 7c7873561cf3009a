//! Timestamped HMAC signature verification for webhook deliveries.
//!
//! The processor signs `"{t}.{raw_body}"` with the shared endpoint secret and
//! sends `t=<unix-seconds>,v1=<hex hmac-sha256>` in the signature header.
//! Verification runs over the **exact raw bytes** received on the wire; any
//! re-serialization before this point breaks authentication by design of the
//! scheme.
//!
//! Multiple `v1` elements may appear while the processor rotates secrets; the
//! signature passes if any of them matches. Comparison is constant-time.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use openvend_types::{EndpointSecret, Result, VendError};

type HmacSha256 = Hmac<Sha256>;

/// Parsed form of the signature header.
struct SignatureHeader {
    timestamp: i64,
    candidates: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for element in header.split(',') {
        let Some((key, value)) = element.split_once('=') else {
            continue;
        };
        match key.trim() {
            "t" => {
                timestamp = Some(value.trim().parse::<i64>().map_err(|_| {
                    VendError::SignatureInvalid {
                        reason: "non-numeric timestamp element".to_string(),
                    }
                })?);
            }
            "v1" => {
                // Invalid hex is not an error, it just cannot match.
                if let Ok(bytes) = hex::decode(value.trim()) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }
    let Some(timestamp) = timestamp else {
        return Err(VendError::SignatureInvalid {
            reason: "missing timestamp element".to_string(),
        });
    };
    if candidates.is_empty() {
        return Err(VendError::SignatureInvalid {
            reason: "missing v1 element".to_string(),
        });
    }
    Ok(SignatureHeader { timestamp, candidates })
}

fn expected_mac(secret: &EndpointSecret, timestamp: i64, raw_body: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    mac.finalize().into_bytes().to_vec()
}

/// Verify the signature header against the raw body, then the freshness window.
///
/// The MAC is checked before freshness so an unauthenticated caller learns
/// nothing about the replay window.
///
/// # Errors
/// - [`VendError::SignatureMissing`] when `header` is absent or empty.
/// - [`VendError::SignatureInvalid`] when the header is structurally broken or
///   no `v1` element matches.
/// - [`VendError::StaleEvent`] when the timestamp falls outside the window.
pub fn verify(
    secret: &EndpointSecret,
    raw_body: &[u8],
    header: Option<&str>,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h,
        _ => return Err(VendError::SignatureMissing),
    };
    let parsed = parse_header(header)?;

    let expected = expected_mac(secret, parsed.timestamp, raw_body);
    let matched = parsed
        .candidates
        .iter()
        .any(|candidate| bool::from(candidate.as_slice().ct_eq(expected.as_slice())));
    if !matched {
        return Err(VendError::SignatureInvalid {
            reason: "no v1 element matches the payload".to_string(),
        });
    }

    let age_secs = (now.timestamp() - parsed.timestamp).abs();
    if age_secs > tolerance_secs {
        return Err(VendError::StaleEvent {
            age_secs,
            tolerance_secs,
        });
    }
    Ok(())
}
