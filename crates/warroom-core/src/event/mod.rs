//! Core domain types for War Room events.
//!
//! A [`WarRoomEvent`] is the central synthesized entity: it is created by a
//! synthesis pass or external ingestion, mutated by assignment, ledger
//! transitions, packet actions, and receipt attachment, and never deleted,
//! only transitioned to terminal states.
//!
//! Wire representations use camelCase field names and SCREAMING_SNAKE state
//! strings to match what the dashboards consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evidence::ConfidenceGate;

/// Maximum number of linked receipt ids carried on an event.
pub const MAX_LINKED_RECEIPTS: usize = 12;

/// Maximum number of deduplicated reason codes carried on an event.
pub const MAX_TOP_REASONS: usize = 6;

/// Errors raised when parsing domain enum strings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EventError {
    /// The lane string is not a recognized business lane.
    #[error("invalid lane: {value}")]
    InvalidLane {
        /// The invalid value.
        value: String,
    },

    /// The ledger state string is not recognized.
    #[error("invalid ledger state: {value}")]
    InvalidLedgerState {
        /// The invalid value.
        value: String,
    },

    /// The packet status string is not recognized.
    #[error("invalid packet status: {value}")]
    InvalidPacketStatus {
        /// The invalid value.
        value: String,
    },
}

/// Reason-code taxonomy an event belongs to.
///
/// Categories are derived from the dominant reason code by the scoring
/// classifier and determine which business lane an event lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Evidence integrity: missing evidence, hash mismatches, unscanned
    /// attachments.
    Governance,

    /// Financial exposure signals.
    Financial,

    /// Talent and retention signals.
    Talent,

    /// Confidentiality and policy signals.
    Compliance,

    /// Reason codes that match no known keyword.
    Unknown,
}

impl Category {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Governance => "Governance",
            Self::Financial => "Financial",
            Self::Talent => "Talent",
            Self::Compliance => "Compliance",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns the business lane this category's events are accounted in.
    #[must_use]
    pub const fn lane(&self) -> Lane {
        match self {
            Self::Financial | Self::Talent | Self::Unknown => Lane::Value,
            Self::Governance | Self::Compliance => Lane::Controls,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed business lanes partitioning events and their aggregate amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Verified-savings value pipeline.
    Value,

    /// Fiduciary controls and governance.
    Controls,

    /// Agentic workflow automation.
    Agentic,

    /// Marketplace and vendor surface.
    Marketplace,
}

impl Lane {
    /// Parses a lane from its canonical lowercase string.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidLane` if the string is not a known lane.
    pub fn parse(s: &str) -> Result<Self, EventError> {
        match s.to_lowercase().as_str() {
            "value" => Ok(Self::Value),
            "controls" => Ok(Self::Controls),
            "agentic" => Ok(Self::Agentic),
            "marketplace" => Ok(Self::Marketplace),
            _ => Err(EventError::InvalidLane {
                value: s.to_string(),
            }),
        }
    }

    /// Returns the canonical lowercase string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Controls => "controls",
            Self::Agentic => "agentic",
            Self::Marketplace => "marketplace",
        }
    }

    /// Returns all lanes in declaration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Value, Self::Controls, Self::Agentic, Self::Marketplace]
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger lifecycle state of an event's recognized value.
///
/// The forward path is `IDENTIFIED → APPROVED → REALIZED`; `AT_RISK` is a
/// side state for events whose controls failed. `REALIZED` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerState {
    /// Value identified but not yet approved.
    Identified,

    /// Value approved by the workflow.
    Approved,

    /// Value realized; terminal.
    Realized,

    /// A control failed; the value is at risk.
    AtRisk,
}

impl LedgerState {
    /// Parses a ledger state from its canonical string.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidLedgerState` for unrecognized input.
    pub fn parse(s: &str) -> Result<Self, EventError> {
        match s.to_uppercase().as_str() {
            "IDENTIFIED" => Ok(Self::Identified),
            "APPROVED" => Ok(Self::Approved),
            "REALIZED" => Ok(Self::Realized),
            "AT_RISK" => Ok(Self::AtRisk),
            _ => Err(EventError::InvalidLedgerState {
                value: s.to_string(),
            }),
        }
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Identified => "IDENTIFIED",
            Self::Approved => "APPROVED",
            Self::Realized => "REALIZED",
            Self::AtRisk => "AT_RISK",
        }
    }

    /// Returns whether this state accepts no further ledger transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Realized)
    }
}

impl std::fmt::Display for LedgerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Triage status derived from the rank score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Rank score at or above the open threshold; needs attention now.
    Open,

    /// Rank score in the watch band.
    Watch,

    /// Below the watch band.
    Resolved,
}

impl EventStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Watch => "WATCH",
            Self::Resolved => "RESOLVED",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Governance sign-off lifecycle attached to an event, independent of the
/// ledger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketStatus {
    /// Packet being assembled.
    Draft,

    /// Submitted for sign-off.
    Submitted,

    /// Signed off.
    Approved,

    /// Closed out; terminal.
    Closed,
}

impl PacketStatus {
    /// Parses a packet status from its canonical string.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidPacketStatus` for unrecognized input.
    pub fn parse(s: &str) -> Result<Self, EventError> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "SUBMITTED" => Ok(Self::Submitted),
            "APPROVED" => Ok(Self::Approved),
            "CLOSED" => Ok(Self::Closed),
            _ => Err(EventError::InvalidPacketStatus {
                value: s.to_string(),
            }),
        }
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for PacketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The signing action recorded on a packet signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureAction {
    /// Signed on submission.
    Submit,

    /// Signed on approval.
    Approve,
}

/// A single entry in an event's signature history.
///
/// Signatures are append-only: never edited, never removed. An approval
/// signature is persisted even when policy blocks the approval, so the
/// record shows who attempted to sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketSignature {
    /// Who signed.
    pub signer: String,

    /// The signer's role (e.g. "plan-sponsor", "fiduciary").
    pub role: String,

    /// Which action was signed.
    pub action: SignatureAction,

    /// When the signature was recorded.
    pub at: DateTime<Utc>,
}

/// A ranked, explainable incident event.
///
/// Owned and mutated only by this subsystem. The `version` field is the
/// optimistic-concurrency token: every successful store mutation bumps it,
/// and transitions are compare-and-swapped against it so two concurrent
/// approvals can never both move funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarRoomEvent {
    /// Deterministic id: hash of the synthesis bucket key and its
    /// first/last-seen timestamps.
    pub event_id: String,

    /// Reason-code taxonomy bucket.
    pub category: Category,

    /// Human-readable headline.
    pub title: String,

    /// Business lane the event's amount is accounted in.
    pub lane: Lane,

    /// Signed currency amount in whole units.
    pub amount: i64,

    /// Deduplicated reason codes, capped at [`MAX_TOP_REASONS`].
    pub top_reason_codes: Vec<String>,

    /// Peak risk implied by the reason codes, 0–100.
    pub severity: u8,

    /// Recent signal growth relative to the prior window, 0–100.
    pub velocity: u8,

    /// Mean contributing-receipt confidence, 0.0–1.0.
    pub confidence_score: f64,

    /// Verification gate rolled up conservatively from the receipts.
    pub confidence_gate: ConfidenceGate,

    /// Composite priority score, 0–100.
    pub rank_score: u8,

    /// Triage status derived from the rank score.
    pub status: EventStatus,

    /// Ledger lifecycle state.
    pub state: LedgerState,

    /// Governance packet lifecycle state.
    pub packet_status: PacketStatus,

    /// Append-only signature history.
    pub packet_signatures: Vec<PacketSignature>,

    /// Assigned owner, if any.
    pub owner: Option<String>,

    /// Linked evidence receipt ids, capped at [`MAX_LINKED_RECEIPTS`].
    pub receipts: Vec<String>,

    /// Free-form working notes.
    pub notes: Option<String>,

    /// Attached file references.
    pub attachments: Vec<String>,

    /// Ordered human-readable justifications for the scores. Mandatory for
    /// every scored event.
    pub why: Vec<String>,

    /// Last mutation time.
    pub updated_at: DateTime<Utc>,

    /// Optimistic-concurrency token, bumped on every successful mutation.
    #[serde(default)]
    pub version: u64,
}

impl WarRoomEvent {
    /// Links a receipt id to this event, deduplicating and respecting the
    /// cap. Returns whether the receipt was newly linked.
    pub fn link_receipt(&mut self, receipt_id: &str) -> bool {
        if self.receipts.iter().any(|r| r == receipt_id) {
            return false;
        }
        if self.receipts.len() >= MAX_LINKED_RECEIPTS {
            return false;
        }
        self.receipts.push(receipt_id.to_string());
        true
    }

    /// Appends a signature to the history.
    pub fn record_signature(&mut self, signer: &str, role: &str, action: SignatureAction) {
        self.packet_signatures.push(PacketSignature {
            signer: signer.to_string(),
            role: role.to_string(),
            action,
            at: Utc::now(),
        });
    }
}

/// Per-lane aggregate of amounts at each ledger state.
///
/// Invariant: after every completed write, each bucket equals the sum of
/// event amounts in this lane at the corresponding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneSummary {
    /// The lane this summary covers.
    pub lane: Lane,

    /// Sum of amounts at `IDENTIFIED`.
    pub identified: i64,

    /// Sum of amounts at `APPROVED`.
    pub approved: i64,

    /// Sum of amounts at `REALIZED`.
    pub realized: i64,

    /// Sum of amounts at `AT_RISK`.
    pub at_risk: i64,
}

impl LaneSummary {
    /// Creates an all-zero summary for a lane.
    #[must_use]
    pub const fn new(lane: Lane) -> Self {
        Self {
            lane,
            identified: 0,
            approved: 0,
            realized: 0,
            at_risk: 0,
        }
    }

    /// Returns the amount in the bucket for a ledger state.
    #[must_use]
    pub const fn bucket(&self, state: LedgerState) -> i64 {
        match state {
            LedgerState::Identified => self.identified,
            LedgerState::Approved => self.approved,
            LedgerState::Realized => self.realized,
            LedgerState::AtRisk => self.at_risk,
        }
    }

    /// Mutable access to the bucket for a ledger state.
    pub fn bucket_mut(&mut self, state: LedgerState) -> &mut i64 {
        match state {
            LedgerState::Identified => &mut self.identified,
            LedgerState::Approved => &mut self.approved,
            LedgerState::Realized => &mut self.realized,
            LedgerState::AtRisk => &mut self.at_risk,
        }
    }

    /// Moves `amount` between two buckets. Total across buckets is
    /// unchanged.
    pub fn apply_move(&mut self, from: LedgerState, to: LedgerState, amount: i64) {
        *self.bucket_mut(from) -= amount;
        *self.bucket_mut(to) += amount;
    }

    /// Sum across all buckets.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.identified + self.approved + self.realized + self.at_risk
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_lane_roundtrip() {
        for lane in Lane::all() {
            assert_eq!(Lane::parse(lane.as_str()).unwrap(), *lane);
        }
        assert!(matches!(
            Lane::parse("treasury"),
            Err(EventError::InvalidLane { .. })
        ));
    }

    #[test]
    fn test_ledger_state_roundtrip() {
        for s in ["IDENTIFIED", "APPROVED", "REALIZED", "AT_RISK"] {
            assert_eq!(LedgerState::parse(s).unwrap().as_str(), s);
        }
        assert!(LedgerState::parse("PENDING").is_err());
    }

    #[test]
    fn test_realized_is_terminal() {
        assert!(LedgerState::Realized.is_terminal());
        assert!(!LedgerState::Identified.is_terminal());
        assert!(!LedgerState::AtRisk.is_terminal());
    }

    #[test]
    fn test_category_lane_mapping() {
        assert_eq!(Category::Financial.lane(), Lane::Value);
        assert_eq!(Category::Governance.lane(), Lane::Controls);
        assert_eq!(Category::Compliance.lane(), Lane::Controls);
    }

    #[test]
    fn test_summary_move_preserves_total() {
        let mut summary = LaneSummary::new(Lane::Value);
        summary.identified = 580_000;
        let before = summary.total();

        summary.apply_move(LedgerState::Identified, LedgerState::Approved, 580_000);

        assert_eq!(summary.identified, 0);
        assert_eq!(summary.approved, 580_000);
        assert_eq!(summary.total(), before);
    }

    #[test]
    fn test_link_receipt_dedup_and_cap() {
        let mut event = sample_event();
        assert!(event.link_receipt("rcp-1"));
        assert!(!event.link_receipt("rcp-1"));
        for i in 2..=MAX_LINKED_RECEIPTS {
            assert!(event.link_receipt(&format!("rcp-{i}")));
        }
        assert!(!event.link_receipt("rcp-overflow"));
        assert_eq!(event.receipts.len(), MAX_LINKED_RECEIPTS);
    }

    #[test]
    fn test_event_wire_field_names() {
        let event = sample_event();
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("eventId").is_some());
        assert!(json.get("packetStatus").is_some());
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["state"], "IDENTIFIED");
        assert_eq!(json["lane"], "value");
    }

    fn sample_event() -> WarRoomEvent {
        WarRoomEvent {
            event_id: "evt-0000000000000000".to_string(),
            category: Category::Financial,
            title: "Financial: EBITDA_AT_RISK".to_string(),
            lane: Lane::Value,
            amount: 0,
            top_reason_codes: vec!["EBITDA_AT_RISK".to_string()],
            severity: 85,
            velocity: 50,
            confidence_score: 0.8,
            confidence_gate: ConfidenceGate::Verified,
            rank_score: 75,
            status: EventStatus::Watch,
            state: LedgerState::Identified,
            packet_status: PacketStatus::Draft,
            packet_signatures: Vec::new(),
            owner: None,
            receipts: Vec::new(),
            notes: None,
            attachments: Vec::new(),
            why: vec!["sample".to_string()],
            updated_at: Utc::now(),
            version: 0,
        }
    }
}
