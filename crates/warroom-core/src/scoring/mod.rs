//! Pure scoring functions for War Room events.
//!
//! Every scorer is stateless and side-effect free, and returns its numeric
//! result together with human-readable justification strings. The `why`
//! list is a hard requirement of the contract, not optional telemetry:
//! callers render it to end users, so a score without a justification is a
//! bug.
//!
//! # Invariants
//!
//! - `severity` equals the maximum tabulated baseline among the reasons
//!   present, never less.
//! - For fixed severity/velocity/confidence, an `UNVERIFIED` gate never
//!   yields a higher rank than `VERIFIED`.
//! - The rank weighting (severity-dominant: 0.62/0.28/0.10) is preserved
//!   exactly so historical rankings stay reproducible.


use crate::event::{Category, EventStatus};
use crate::evidence::ConfidenceGate;

/// A score together with its mandatory justification.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    /// The numeric result.
    pub value: T,

    /// Human-readable justifications, in presentation order.
    pub why: Vec<String>,
}

/// Baseline severity per known reason code. Unknown codes fall back to
/// [`DEFAULT_SEVERITY`].
const SEVERITY_TABLE: &[(&str, u8)] = &[
    ("CONFIDENTIALITY_BREACH", 90),
    ("HASH_MISMATCH", 88),
    ("EBITDA_AT_RISK", 85),
    ("EVIDENCE_MISSING", 82),
    ("HIPO_FLIGHT_RISK", 76),
    ("ATTACHMENT_UNSCANNED", 70),
    ("TALENT_GAP", 64),
    ("POLICY_DRIFT", 58),
];

/// Baseline severity for reason codes absent from the table.
pub const DEFAULT_SEVERITY: u8 = 45;

/// Rank threshold at or above which an event is `OPEN`.
pub const OPEN_THRESHOLD: u8 = 78;

/// Rank threshold at or above which an event is `WATCH`.
pub const WATCH_THRESHOLD: u8 = 55;

/// Multiplier applied to unverified-gate events.
const UNVERIFIED_GATE_MULT: f64 = 0.65;

fn baseline(reason: &str) -> u8 {
    SEVERITY_TABLE
        .iter()
        .find(|(code, _)| *code == reason)
        .map_or(DEFAULT_SEVERITY, |(_, sev)| *sev)
}

/// Headline severity for a set of reason codes: the maximum tabulated
/// baseline among the reasons present, clamped to 0–100.
///
/// The maximum is used rather than the mean: executives respond to peak
/// risk, not average risk.
#[must_use]
pub fn severity(reasons: &[String]) -> Scored<u8> {
    let (peak_reason, peak) = reasons
        .iter()
        .map(|r| (r.as_str(), baseline(r)))
        .max_by_key(|(_, sev)| *sev)
        .unwrap_or(("none", 0));

    let value = peak.min(100);
    let why = if reasons.is_empty() {
        vec!["severity 0: no reason codes present".to_string()]
    } else {
        vec![format!(
            "severity {value}: {peak_reason} is the peak across {} reason code(s)",
            reasons.len()
        )]
    };

    Scored { value, why }
}

/// Recent signal growth relative to the prior baseline window, 0–100.
///
/// `ratio = recent / max(1, prior)` is mapped through a saturating soft
/// curve centered at ratio 1 → 50, so growth is not linear: ratio 2 → 67,
/// ratio 4 → 80, ratio 8 → 89, approaching 100 asymptotically.
#[must_use]
pub fn velocity(recent_count: u64, prior_count: u64) -> Scored<u8> {
    #[allow(clippy::cast_precision_loss)]
    let ratio = recent_count as f64 / prior_count.max(1) as f64;
    let raw = 100.0 * ratio / (ratio + 1.0);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = raw.round().clamp(0.0, 100.0) as u8;

    Scored {
        value,
        why: vec![format!(
            "velocity {value}: {recent_count} recent vs {prior_count} prior signals (ratio {ratio:.1})"
        )],
    }
}

/// Confidence-gate multiplier applied to the weighted rank base.
///
/// `gate_mult` is 1.0 for `VERIFIED` and 0.65 for `UNVERIFIED`;
/// `score_mult` scales linearly from 0.6 (confidence 0) to 1.0
/// (confidence 1).
#[must_use]
pub fn confidence_multiplier(gate: ConfidenceGate, confidence: f64) -> Scored<f64> {
    let gate_mult = match gate {
        ConfidenceGate::Verified => 1.0,
        ConfidenceGate::Unverified => UNVERIFIED_GATE_MULT,
    };
    let score_mult = 0.6 + 0.4 * confidence.clamp(0.0, 1.0);
    let value = gate_mult * score_mult;

    let mut why = vec![format!(
        "confidence multiplier {value:.2} ({gate} gate, confidence {confidence:.2})"
    )];
    if gate == ConfidenceGate::Unverified {
        why.push("unverified evidence dampens the rank by 35%".to_string());
    }

    Scored { value, why }
}

/// Composite 0–100 priority score.
///
/// Weighted base `0.62·severity + 0.28·velocity + 0.10·(confidence·100)`,
/// then dampened by the confidence multiplier and rounded into 0–100. The
/// severity-dominant weighting is deliberate and must not drift.
#[must_use]
pub fn rank_score(
    severity: u8,
    velocity: u8,
    gate: ConfidenceGate,
    confidence: f64,
) -> Scored<u8> {
    let multiplier = confidence_multiplier(gate, confidence);
    let base = 0.62 * f64::from(severity) + 0.28 * f64::from(velocity)
        + 0.10 * confidence.clamp(0.0, 1.0) * 100.0;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = (base * multiplier.value).clamp(0.0, 100.0).round() as u8;

    let mut why = vec![format!(
        "rank {value}: 62% of severity {severity} + 28% of velocity {velocity} + 10% of confidence, ×{:.2}",
        multiplier.value
    )];
    why.extend(multiplier.why);

    Scored { value, why }
}

/// Classifies a raw reason code into the fixed category taxonomy via
/// keyword substrings.
#[must_use]
pub fn category_from_reason(reason: &str) -> Category {
    let upper = reason.to_uppercase();
    if upper.contains("EVIDENCE") || upper.contains("HASH") || upper.contains("ATTACHMENT") {
        Category::Governance
    } else if upper.contains("EBITDA") {
        Category::Financial
    } else if upper.contains("HIPO") || upper.contains("TALENT") {
        Category::Talent
    } else if upper.contains("CONFIDENTIALITY") || upper.contains("POLICY") {
        Category::Compliance
    } else {
        Category::Unknown
    }
}

/// Derives the triage status from a rank score.
#[must_use]
pub const fn status_for_rank(rank: u8) -> EventStatus {
    if rank >= OPEN_THRESHOLD {
        EventStatus::Open
    } else if rank >= WATCH_THRESHOLD {
        EventStatus::Watch
    } else {
        EventStatus::Resolved
    }
}
