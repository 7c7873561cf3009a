//! Identifiers used throughout OpenVend.
//!
//! Wire-facing identifiers (`OrderId`, `TxHash`) stay opaque strings because the
//! payment processor and the ledger node own their formats. Structured identifiers
//! (`Address`, `TxRef`) parse into fixed-width bytes so equality and canonical
//! display are byte-level, not string-level.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, VendError};

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// The payment processor's order / checkout-session identifier.
///
/// Opaque to this pipeline: it is carried for audit and logging, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Numeric identifier of one scarce asset on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte ledger account address.
///
/// Parsed from `0x`-prefixed hex, case-insensitive on input. Display and serde
/// use the lowercase canonical form, so two spellings of the same account always
/// compare equal after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Address(pub [u8; 20]);

impl Address {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Short hex form for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        format!("0x{}..", hex::encode(&self.0[..4]))
    }
}

impl FromStr for Address {
    type Err = VendError;

    fn from_str(s: &str) -> Result<Self> {
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| VendError::InvalidAddress {
                reason: "missing 0x prefix".to_string(),
            })?;
        if stripped.len() != 40 {
            return Err(VendError::InvalidAddress {
                reason: format!("expected 40 hex chars, got {}", stripped.len()),
            });
        }
        let bytes = hex::decode(stripped).map_err(|_| VendError::InvalidAddress {
            reason: "invalid hex".to_string(),
        })?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// Ledger-assigned transaction hash. Opaque: format belongs to the ledger node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl TxHash {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TxRef
// ---------------------------------------------------------------------------

/// The instruction leg a [`TxRef`] is derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    /// Scarce-asset transfer (leg 1).
    Transfer,
    /// Fungible reward payout (leg 2).
    Reward,
}

impl Leg {
    #[must_use]
    fn tag(self) -> &'static [u8] {
        match self {
            Self::Transfer => b"transfer",
            Self::Reward => b"reward",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "TRANSFER"),
            Self::Reward => write!(f, "REWARD"),
        }
    }
}

/// Client-side transaction reference, deterministic per (asset, leg).
///
/// Every retry of the same leg for the same claim derives the **exact same**
/// reference, so a prior attempt whose outcome was lost to a timeout can always
/// be looked up by a read-only status query. The pipeline never depends on the
/// ledger deduplicating by this reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TxRef(pub [u8; 16]);

impl TxRef {
    #[must_use]
    pub fn deterministic(asset_id: AssetId, leg: Leg) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"openvend:txref:v1:");
        hasher.update(asset_id.0.to_le_bytes());
        hasher.update(leg.tag());
        let hash = hasher.finalize();
        let mut out = [0u8; 16];
        out.copy_from_slice(&hash[..16]);
        Self(out)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// DeliveryId
// ---------------------------------------------------------------------------

/// Correlation identifier minted per webhook delivery. Uses UUIDv7 so log
/// streams sort by arrival time. Never persisted into claim records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DeliveryId(pub Uuid);

impl DeliveryId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
