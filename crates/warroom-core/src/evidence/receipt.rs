//! Evidence receipt types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Binary verification status of a receipt or an event.
///
/// `UNVERIFIED` dampens rank scores; rollups across receipts are
/// conservative and never upgrade to `VERIFIED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceGate {
    /// The asserted fact has been verified.
    Verified,

    /// Verification is pending or failed.
    Unverified,
}

impl ConfidenceGate {
    /// Conservative rollup: the combination is `VERIFIED` only if both
    /// sides are.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Verified, Self::Verified) => Self::Verified,
            _ => Self::Unverified,
        }
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::Unverified => "UNVERIFIED",
        }
    }
}

impl std::fmt::Display for ConfidenceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A receipt as it arrives from the external evidence store.
///
/// The capture timestamp is an RFC 3339 string and may be garbage; parsing
/// happens at the synthesis boundary, where unparseable receipts are
/// skipped. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    /// Stable receipt identifier assigned by the evidence store.
    pub receipt_id: String,

    /// Capture time as an RFC 3339 string.
    pub captured_at: String,

    /// Ordered reason codes; the first is dominant.
    pub reason_codes: Vec<String>,

    /// Confidence in the asserted fact, 0.0–1.0.
    pub confidence: f64,

    /// Verification gate.
    pub gate: ConfidenceGate,
}

impl RawReceipt {
    /// Parses the capture timestamp, returning a typed receipt.
    ///
    /// Returns `None` (after a debug log) when the timestamp is
    /// unparseable. Permissive by design: a malformed receipt never aborts
    /// a synthesis pass.
    #[must_use]
    pub fn parse(self) -> Option<EvidenceReceipt> {
        match DateTime::parse_from_rfc3339(&self.captured_at) {
            Ok(captured_at) => Some(EvidenceReceipt {
                receipt_id: self.receipt_id,
                captured_at: captured_at.with_timezone(&Utc),
                reason_codes: self.reason_codes,
                confidence: self.confidence.clamp(0.0, 1.0),
                gate: self.gate,
            }),
            Err(err) => {
                debug!(
                    receipt_id = %self.receipt_id,
                    captured_at = %self.captured_at,
                    %err,
                    "skipping receipt with unparseable timestamp"
                );
                None
            }
        }
    }
}

/// A receipt with a parsed capture timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceReceipt {
    /// Stable receipt identifier.
    pub receipt_id: String,

    /// Capture time.
    pub captured_at: DateTime<Utc>,

    /// Ordered reason codes; the first is dominant.
    pub reason_codes: Vec<String>,

    /// Confidence in the asserted fact, clamped to 0.0–1.0.
    pub confidence: f64,

    /// Verification gate.
    pub gate: ConfidenceGate,
}

impl EvidenceReceipt {
    /// Returns the dominant reason code, if any.
    #[must_use]
    pub fn dominant_reason(&self) -> Option<&str> {
        self.reason_codes.first().map(String::as_str)
    }
}
