//! Event synthesis: windowed aggregation of evidence receipts into ranked
//! candidate events.
//!
//! A synthesis pass pulls a recent window of receipts, buckets them by
//! `(category, dominant reason)`, and produces one scored [`WarRoomEvent`]
//! per bucket. The pass is a pure function of the receipt window and the
//! clock: identical inputs reproduce identical event ids and identical rank
//! scores, which is what makes re-running synthesis an idempotent upsert
//! against the state store.
//!
//! # Edge policy
//!
//! - A receipt with an unparseable timestamp is silently skipped (logged at
//!   `debug`), never an error.
//! - Empty input yields an empty event list, not an error.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::event::{
    Category, LedgerState, PacketStatus, WarRoomEvent, MAX_LINKED_RECEIPTS, MAX_TOP_REASONS,
};
use crate::evidence::{ConfidenceGate, EvidenceError, EvidenceReceipt, EvidenceSource, RawReceipt};
use crate::scoring;

/// Number of receipts pulled from the evidence store per pass.
const RECEIPT_PULL_LIMIT: usize = 1200;

/// Bounds for [`SynthesisConfig::limit`].
pub const LIMIT_RANGE: (usize, usize) = (1, 50);

/// Bounds for [`SynthesisConfig::recent_window_minutes`] (15 min – 24 h).
pub const RECENT_WINDOW_RANGE: (i64, i64) = (15, 1440);

/// Upper bound for [`SynthesisConfig::prior_window_minutes`] (7 days).
pub const PRIOR_WINDOW_MAX: i64 = 10_080;

const fn default_limit() -> usize {
    15
}

const fn default_recent_window() -> i64 {
    180
}

const fn default_prior_window() -> i64 {
    1440
}

/// Tunable parameters for a synthesis pass.
///
/// Out-of-range values are clamped, not rejected, so a dashboard slider can
/// never break a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisConfig {
    /// Maximum number of events returned (1–50).
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Width of the recent window in minutes (15–1440).
    #[serde(default = "default_recent_window")]
    pub recent_window_minutes: i64,

    /// Width of the prior baseline window in minutes (≥ recent window,
    /// ≤ 7 days). Receipts older than this are discarded.
    #[serde(default = "default_prior_window")]
    pub prior_window_minutes: i64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            recent_window_minutes: default_recent_window(),
            prior_window_minutes: default_prior_window(),
        }
    }
}

impl SynthesisConfig {
    /// Returns a copy with every field forced into its legal range.
    #[must_use]
    pub fn clamped(self) -> Self {
        let limit = self.limit.clamp(LIMIT_RANGE.0, LIMIT_RANGE.1);
        let recent = self
            .recent_window_minutes
            .clamp(RECENT_WINDOW_RANGE.0, RECENT_WINDOW_RANGE.1);
        let prior = self.prior_window_minutes.clamp(recent, PRIOR_WINDOW_MAX);
        Self {
            limit,
            recent_window_minutes: recent,
            prior_window_minutes: prior,
        }
    }
}

/// Transient aggregation bucket, rebuilt on every pass.
struct Bucket {
    receipt_ids: Vec<String>,
    reason_codes: Vec<String>,
    recent_count: u64,
    prior_count: u64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    confidence_sum: f64,
    gate: ConfidenceGate,
}

impl Bucket {
    fn new(seen: DateTime<Utc>) -> Self {
        Self {
            receipt_ids: Vec::new(),
            reason_codes: Vec::new(),
            recent_count: 0,
            prior_count: 0,
            first_seen: seen,
            last_seen: seen,
            confidence_sum: 0.0,
            gate: ConfidenceGate::Verified,
        }
    }

    fn absorb(&mut self, receipt: &EvidenceReceipt, recent_cutoff: DateTime<Utc>) {
        self.receipt_ids.push(receipt.receipt_id.clone());
        for code in &receipt.reason_codes {
            if !self.reason_codes.contains(code) {
                self.reason_codes.push(code.clone());
            }
        }
        if receipt.captured_at >= recent_cutoff {
            self.recent_count += 1;
        } else {
            self.prior_count += 1;
        }
        self.first_seen = self.first_seen.min(receipt.captured_at);
        self.last_seen = self.last_seen.max(receipt.captured_at);
        self.confidence_sum += receipt.confidence;
        // Conservative rollup: one unverified receipt taints the bucket.
        self.gate = self.gate.combine(receipt.gate);
    }

    fn receipt_count(&self) -> u64 {
        self.recent_count + self.prior_count
    }
}

/// Deterministic event identity: SHA-256 over the canonical encoding of the
/// bucket key and its first/last-seen timestamps.
fn event_id(category: Category, reason: &str, bucket: &Bucket) -> String {
    let canonical = format!(
        "{}|{}|{}|{}",
        category.as_str(),
        reason,
        bucket.first_seen.timestamp_millis(),
        bucket.last_seen.timestamp_millis()
    );
    let digest = Sha256::digest(canonical.as_bytes());
    let mut id = String::with_capacity(20);
    id.push_str("evt-");
    for byte in &digest[..8] {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

/// Runs one synthesis pass against the evidence source.
///
/// Pulls the most recent receipts, discards those older than the prior
/// window, buckets the remainder by `(category, dominant reason)`, scores
/// each bucket, and returns events sorted by rank (descending, ties broken
/// by most recent `last_seen`) truncated to the configured limit.
///
/// # Errors
///
/// Returns an error only if the evidence source itself cannot be read.
pub fn synthesize(
    source: &dyn EvidenceSource,
    config: SynthesisConfig,
    now: DateTime<Utc>,
) -> Result<Vec<WarRoomEvent>, EvidenceError> {
    let config = config.clamped();
    let recent_cutoff = now - Duration::minutes(config.recent_window_minutes);
    let prior_cutoff = now - Duration::minutes(config.prior_window_minutes);

    let raw = source.list_recent(RECEIPT_PULL_LIMIT)?;
    let pulled = raw.len();

    let mut buckets: BTreeMap<(String, String), Bucket> = BTreeMap::new();
    let mut in_window = 0usize;

    for receipt in raw.into_iter().filter_map(RawReceipt::parse) {
        if receipt.captured_at < prior_cutoff {
            continue;
        }
        let Some(dominant) = receipt.dominant_reason().map(ToString::to_string) else {
            continue;
        };
        in_window += 1;

        let category = scoring::category_from_reason(&dominant);
        buckets
            .entry((category.as_str().to_string(), dominant))
            .or_insert_with(|| Bucket::new(receipt.captured_at))
            .absorb(&receipt, recent_cutoff);
    }

    debug!(pulled, in_window, buckets = buckets.len(), "synthesis pass");

    let mut ranked: Vec<(WarRoomEvent, DateTime<Utc>)> = buckets
        .into_iter()
        .map(|((_, reason), bucket)| {
            let last_seen = bucket.last_seen;
            (build_event(&reason, &bucket, now), last_seen)
        })
        .collect();

    ranked.sort_by(|(a, a_seen), (b, b_seen)| {
        b.rank_score
            .cmp(&a.rank_score)
            .then_with(|| b_seen.cmp(a_seen))
            .then_with(|| a.event_id.cmp(&b.event_id))
    });

    let mut events: Vec<WarRoomEvent> = ranked.into_iter().map(|(event, _)| event).collect();
    events.truncate(config.limit);
    Ok(events)
}

fn build_event(reason: &str, bucket: &Bucket, now: DateTime<Utc>) -> WarRoomEvent {
    let category = scoring::category_from_reason(reason);

    #[allow(clippy::cast_precision_loss)]
    let confidence = bucket.confidence_sum / bucket.receipt_count().max(1) as f64;

    let severity = scoring::severity(&bucket.reason_codes);
    let velocity = scoring::velocity(bucket.recent_count, bucket.prior_count);
    let rank = scoring::rank_score(severity.value, velocity.value, bucket.gate, confidence);

    let mut why = severity.why;
    why.extend(velocity.why);
    why.extend(rank.why);

    let mut top_reason_codes = bucket.reason_codes.clone();
    top_reason_codes.truncate(MAX_TOP_REASONS);

    let mut receipts = bucket.receipt_ids.clone();
    receipts.truncate(MAX_LINKED_RECEIPTS);

    WarRoomEvent {
        event_id: event_id(category, reason, bucket),
        category,
        title: format!("{category}: {reason}"),
        lane: category.lane(),
        amount: 0,
        top_reason_codes,
        severity: severity.value,
        velocity: velocity.value,
        confidence_score: confidence,
        confidence_gate: bucket.gate,
        rank_score: rank.value,
        status: scoring::status_for_rank(rank.value),
        state: LedgerState::Identified,
        packet_status: PacketStatus::Draft,
        packet_signatures: Vec::new(),
        owner: None,
        receipts,
        notes: None,
        attachments: Vec::new(),
        why,
        updated_at: now,
        version: 0,
    }
}
