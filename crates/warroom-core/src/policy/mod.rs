//! Transition policy: pure predicates deciding whether a requested ledger
//! or packet transition is legal.
//!
//! The exact business rule set is an external input (configurable policy);
//! what this module fixes is the contract: predicates are synchronous,
//! pure, side-effect free, and always return structured reasons on
//! rejection so callers can render them to end users.
//!
//! Structural legality (`IDENTIFIED → APPROVED → REALIZED`;
//! `DRAFT → SUBMITTED → APPROVED → CLOSED`) is always enforced. On top of
//! that, [`StandardPolicy`] applies per-stage preconditions loaded from a
//! YAML [`PolicyConfig`].

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{LedgerState, PacketStatus, WarRoomEvent};
use crate::evidence::ConfidenceGate;

/// Errors raised when loading a policy configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// The YAML document could not be parsed.
    #[error("invalid policy document: {0}")]
    InvalidDocument(#[from] serde_yaml::Error),

    /// The policy file could not be read.
    #[error("cannot read policy file: {0}")]
    Io(#[from] std::io::Error),
}

/// The outcome of a policy predicate.
///
/// `ok` is true exactly when `reasons` is empty; a rejection always carries
/// at least one human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Whether the transition is allowed.
    pub ok: bool,

    /// Rejection reasons; empty when allowed.
    pub reasons: Vec<String>,
}

impl PolicyDecision {
    /// An allowing decision.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            ok: true,
            reasons: Vec::new(),
        }
    }

    /// A rejecting decision carrying the given reasons.
    #[must_use]
    pub fn reject(reasons: Vec<String>) -> Self {
        debug_assert!(!reasons.is_empty(), "rejections must carry reasons");
        Self { ok: false, reasons }
    }

    fn from_reasons(reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Self::allow()
        } else {
            Self::reject(reasons)
        }
    }
}

/// Pure transition predicates consulted before every gated operation.
pub trait TransitionPolicy: Send + Sync {
    /// Decides whether `event` may move to the target ledger state.
    fn can_transition(&self, event: &WarRoomEvent, target: LedgerState) -> PolicyDecision;

    /// Decides whether `event`'s packet may move to the target status.
    fn can_transition_packet(
        &self,
        event: &WarRoomEvent,
        target: PacketStatus,
    ) -> PolicyDecision;
}

/// Preconditions applied at one workflow stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StageRules {
    /// Require an assigned owner.
    #[serde(default)]
    pub require_owner: bool,

    /// Require at least one linked evidence receipt.
    #[serde(default)]
    pub require_receipts: bool,

    /// Require the confidence gate to be `VERIFIED`.
    #[serde(default)]
    pub require_verified_gate: bool,
}

/// Preconditions for the ledger transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRules {
    /// Applied to `IDENTIFIED → APPROVED`.
    #[serde(default)]
    pub approve: StageRules,

    /// Applied to `APPROVED → REALIZED`.
    #[serde(default)]
    pub close: StageRules,
}

/// Preconditions for the packet transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRules {
    /// Applied to `DRAFT → SUBMITTED`.
    #[serde(default)]
    pub submit: StageRules,

    /// Applied to `SUBMITTED → APPROVED`.
    #[serde(default)]
    pub approve: StageRules,

    /// Applied to `APPROVED → CLOSED`.
    #[serde(default)]
    pub close: StageRules,
}

/// The configurable policy rule set, loadable from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Semantic version of this policy document.
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable policy name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Ledger-stage preconditions.
    #[serde(default)]
    pub ledger: LedgerRules,

    /// Packet-stage preconditions.
    #[serde(default)]
    pub packet: PacketRules,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_name() -> String {
    "standard".to_string()
}

impl Default for PolicyConfig {
    /// The shipped default: approvals and closes require an owner; packet
    /// submission requires an owner and linked evidence; packet approval
    /// requires an owner.
    fn default() -> Self {
        let owned = StageRules {
            require_owner: true,
            ..StageRules::default()
        };
        Self {
            version: default_version(),
            name: default_name(),
            ledger: LedgerRules {
                approve: owned,
                close: owned,
            },
            packet: PacketRules {
                submit: StageRules {
                    require_owner: true,
                    require_receipts: true,
                    require_verified_gate: false,
                },
                approve: owned,
                close: StageRules::default(),
            },
        }
    }
}

impl PolicyConfig {
    /// A fully permissive rule set: structural legality only.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            version: default_version(),
            name: "permissive".to_string(),
            ledger: LedgerRules::default(),
            packet: PacketRules::default(),
        }
    }

    /// Parses a policy document from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML for this schema.
    pub fn from_yaml(doc: &str) -> Result<Self, PolicyError> {
        Ok(serde_yaml::from_str(doc)?)
    }

    /// Loads a policy document from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, PolicyError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }
}

/// The standard policy engine: structural legality plus configured
/// per-stage preconditions.
#[derive(Debug, Clone, Default)]
pub struct StandardPolicy {
    config: PolicyConfig,
}

impl StandardPolicy {
    /// Builds a policy engine from a rule set.
    #[must_use]
    pub const fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// A policy enforcing structural legality only.
    #[must_use]
    pub fn permissive() -> Self {
        Self::new(PolicyConfig::permissive())
    }

    /// The active rule set.
    #[must_use]
    pub const fn config(&self) -> &PolicyConfig {
        &self.config
    }

    fn apply_stage(rules: StageRules, event: &WarRoomEvent, reasons: &mut Vec<String>) {
        if rules.require_owner && event.owner.is_none() {
            reasons.push("an owner must be assigned before this transition".to_string());
        }
        if rules.require_receipts && event.receipts.is_empty() {
            reasons.push("at least one evidence receipt must be linked".to_string());
        }
        if rules.require_verified_gate && event.confidence_gate != ConfidenceGate::Verified {
            reasons.push("the confidence gate must be VERIFIED".to_string());
        }
    }
}

impl TransitionPolicy for StandardPolicy {
    fn can_transition(&self, event: &WarRoomEvent, target: LedgerState) -> PolicyDecision {
        let mut reasons = Vec::new();

        let stage = match (event.state, target) {
            (LedgerState::Identified, LedgerState::Approved) => Some(self.config.ledger.approve),
            (LedgerState::Approved, LedgerState::Realized) => Some(self.config.ledger.close),
            (from, to) => {
                reasons.push(format!("illegal ledger transition: {from} -> {to}"));
                None
            }
        };

        if let Some(rules) = stage {
            Self::apply_stage(rules, event, &mut reasons);
        }

        PolicyDecision::from_reasons(reasons)
    }

    fn can_transition_packet(
        &self,
        event: &WarRoomEvent,
        target: PacketStatus,
    ) -> PolicyDecision {
        let mut reasons = Vec::new();

        let stage = match (event.packet_status, target) {
            (PacketStatus::Draft, PacketStatus::Submitted) => Some(self.config.packet.submit),
            (PacketStatus::Submitted, PacketStatus::Approved) => Some(self.config.packet.approve),
            (PacketStatus::Approved, PacketStatus::Closed) => Some(self.config.packet.close),
            (from, to) => {
                reasons.push(format!("illegal packet transition: {from} -> {to}"));
                None
            }
        };

        if let Some(rules) = stage {
            Self::apply_stage(rules, event, &mut reasons);
        }

        PolicyDecision::from_reasons(reasons)
    }
}
