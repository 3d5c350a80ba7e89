//! Append-only audit records.
//!
//! One record is written per attempted action, including failed attempts,
//! which carry `policyOk=false` and the rejection reasons. The audit trail
//! is the primary compliance artifact of the subsystem: records are never
//! overwritten or deleted here (retention is an external concern).
//!
//! Action metadata is a discriminated [`AuditDetail`] union per action
//! kind, so handlers get compile-time exhaustiveness instead of free-form
//! key/value bags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Lane;
use crate::policy::PolicyDecision;

/// The action an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Owner assignment.
    LedgerAssign,

    /// `IDENTIFIED → APPROVED` ledger transition.
    LedgerApprove,

    /// `APPROVED → REALIZED` ledger transition.
    LedgerClose,

    /// Evidence receipt linked to an event.
    ReceiptAttach,

    /// Working notes replaced.
    NotesUpdate,

    /// File reference attached.
    FileAttach,

    /// `DRAFT → SUBMITTED` packet transition.
    PacketSubmit,

    /// `SUBMITTED → APPROVED` packet transition.
    PacketApprove,

    /// `APPROVED → CLOSED` packet transition.
    PacketClose,

    /// Synthesis refresh pass.
    SynthRefresh,
}

impl AuditAction {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LedgerAssign => "LEDGER_ASSIGN",
            Self::LedgerApprove => "LEDGER_APPROVE",
            Self::LedgerClose => "LEDGER_CLOSE",
            Self::ReceiptAttach => "RECEIPT_ATTACH",
            Self::NotesUpdate => "NOTES_UPDATE",
            Self::FileAttach => "FILE_ATTACH",
            Self::PacketSubmit => "PACKET_SUBMIT",
            Self::PacketApprove => "PACKET_APPROVE",
            Self::PacketClose => "PACKET_CLOSE",
            Self::SynthRefresh => "SYNTH_REFRESH",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-action metadata, discriminated by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditDetail {
    /// A gated transition was attempted; the policy outcome lives on the
    /// record itself.
    TransitionAttempt {
        /// The requested target state or status.
        target: String,
    },

    /// A ledger transition was applied and funds moved.
    LedgerApplied {
        /// The amount moved between buckets.
        amount_moved: i64,
        /// The lane whose summary shifted.
        lane: Lane,
    },

    /// A packet transition was applied.
    PacketApplied {
        /// Whether a signature was recorded with the transition.
        signed: bool,
    },

    /// An owner was assigned.
    OwnerAssigned {
        /// The new owner.
        owner: String,
    },

    /// A receipt link was requested.
    ReceiptLinked {
        /// The receipt id.
        receipt_id: String,
        /// False when the receipt was already linked or the cap was hit.
        linked: bool,
    },

    /// Notes were replaced.
    NotesReplaced {
        /// Length of the new notes text.
        length: usize,
    },

    /// A file reference was attached.
    FileAttached {
        /// The attached file reference.
        name: String,
    },

    /// A signature was persisted despite a policy rejection.
    SignatureRecorded {
        /// Who signed.
        signer: String,
        /// The signer's role.
        role: String,
    },

    /// A synthesis pass ran.
    Refresh {
        /// Number of events produced by the pass.
        produced: usize,
    },
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// The action attempted.
    pub action: AuditAction,

    /// Who requested it.
    pub actor: String,

    /// The event acted on (empty for synthesis passes).
    pub event_id: String,

    /// State before the action, where applicable.
    pub prior_state: Option<String>,

    /// State after (or requested), where applicable.
    pub next_state: Option<String>,

    /// Whether policy allowed the action.
    pub policy_ok: bool,

    /// Policy rejection reasons; empty when allowed.
    pub policy_reasons: Vec<String>,

    /// Per-action metadata.
    pub detail: AuditDetail,

    /// When the attempt was recorded.
    pub at: DateTime<Utc>,
}

impl AuditRecord {
    /// Creates a record for an unconditional (always-allowed) action.
    #[must_use]
    pub fn unconditional(
        action: AuditAction,
        actor: impl Into<String>,
        event_id: impl Into<String>,
        detail: AuditDetail,
    ) -> Self {
        Self {
            action,
            actor: actor.into(),
            event_id: event_id.into(),
            prior_state: None,
            next_state: None,
            policy_ok: true,
            policy_reasons: Vec::new(),
            detail,
            at: Utc::now(),
        }
    }

    /// Creates a record carrying a policy decision.
    #[must_use]
    pub fn gated(
        action: AuditAction,
        actor: impl Into<String>,
        event_id: impl Into<String>,
        decision: &PolicyDecision,
        detail: AuditDetail,
    ) -> Self {
        Self {
            action,
            actor: actor.into(),
            event_id: event_id.into(),
            prior_state: None,
            next_state: None,
            policy_ok: decision.ok,
            policy_reasons: decision.reasons.clone(),
            detail,
            at: Utc::now(),
        }
    }

    /// Sets the prior/next state pair (builder pattern).
    #[must_use]
    pub fn with_states(
        mut self,
        prior: impl Into<String>,
        next: impl Into<String>,
    ) -> Self {
        self.prior_state = Some(prior.into());
        self.next_state = Some(next.into());
        self
    }
}
