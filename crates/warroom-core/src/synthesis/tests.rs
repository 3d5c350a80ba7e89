//! Tests for the synthesis pass.

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::*;
use crate::event::Lane;
use crate::evidence::MemoryEvidenceStore;

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
}

fn receipt_at(
    id: &str,
    minutes_ago: i64,
    reasons: &[&str],
    gate: ConfidenceGate,
) -> RawReceipt {
    RawReceipt {
        receipt_id: id.to_string(),
        captured_at: (fixed_now() - Duration::minutes(minutes_ago)).to_rfc3339(),
        reason_codes: reasons.iter().map(ToString::to_string).collect(),
        confidence: 0.8,
        gate,
    }
}

#[test]
fn test_empty_input_yields_empty_list() {
    let store = MemoryEvidenceStore::new();
    let events = synthesize(&store, SynthesisConfig::default(), fixed_now()).unwrap();
    assert!(events.is_empty());
}

#[test]
fn test_synthesis_is_deterministic() {
    let store = MemoryEvidenceStore::new();
    for i in 0..30 {
        store.push(receipt_at(
            &format!("rcp-{i}"),
            10 + i,
            &["EVIDENCE_MISSING"],
            ConfidenceGate::Verified,
        ));
        store.push(receipt_at(
            &format!("rcp-e-{i}"),
            400 + i,
            &["EBITDA_AT_RISK"],
            ConfidenceGate::Unverified,
        ));
    }

    let now = fixed_now();
    let first = synthesize(&store, SynthesisConfig::default(), now).unwrap();
    let second = synthesize(&store, SynthesisConfig::default(), now).unwrap();

    assert!(!first.is_empty());
    let ids_a: Vec<_> = first.iter().map(|e| e.event_id.clone()).collect();
    let ids_b: Vec<_> = second.iter().map(|e| e.event_id.clone()).collect();
    let ranks_a: Vec<_> = first.iter().map(|e| e.rank_score).collect();
    let ranks_b: Vec<_> = second.iter().map(|e| e.rank_score).collect();
    assert_eq!(ids_a, ids_b);
    assert_eq!(ranks_a, ranks_b);
}

#[test]
fn test_recent_surge_scenario() {
    // 480 receipts in the recent window sharing EVIDENCE_MISSING, 20 in the
    // prior window only with EBITDA_AT_RISK.
    let store = MemoryEvidenceStore::new();
    for i in 0..480 {
        store.push(receipt_at(
            &format!("rcp-ev-{i}"),
            5 + (i % 60),
            &["EVIDENCE_MISSING"],
            ConfidenceGate::Verified,
        ));
    }
    for i in 0..20 {
        store.push(receipt_at(
            &format!("rcp-eb-{i}"),
            300 + i,
            &["EBITDA_AT_RISK"],
            ConfidenceGate::Verified,
        ));
    }

    let events = synthesize(&store, SynthesisConfig::default(), fixed_now()).unwrap();
    assert!(events.len() >= 2);

    let surge = events
        .iter()
        .find(|e| e.top_reason_codes.contains(&"EVIDENCE_MISSING".to_string()))
        .expect("surge event present");
    assert!(surge.velocity >= 89);
    assert!(surge
        .why
        .iter()
        .any(|w| w.contains("480 recent vs 0 prior")));
    assert_eq!(surge.lane, Lane::Controls);

    let baseline = events
        .iter()
        .find(|e| e.top_reason_codes.contains(&"EBITDA_AT_RISK".to_string()))
        .expect("baseline event present");
    // Prior-window-only signals have zero recent growth.
    assert_eq!(baseline.velocity, 0);
    assert_eq!(baseline.lane, Lane::Value);
}

#[test]
fn test_receipts_older_than_prior_window_are_discarded() {
    let store = MemoryEvidenceStore::new();
    store.push(receipt_at(
        "rcp-stale",
        10_000,
        &["TALENT_GAP"],
        ConfidenceGate::Verified,
    ));

    let events = synthesize(&store, SynthesisConfig::default(), fixed_now()).unwrap();
    assert!(events.is_empty());
}

#[test]
fn test_unparseable_timestamps_are_skipped_not_fatal() {
    let store = MemoryEvidenceStore::new();
    store.push(RawReceipt {
        receipt_id: "rcp-bad".to_string(),
        captured_at: "not-a-timestamp".to_string(),
        reason_codes: vec!["EVIDENCE_MISSING".to_string()],
        confidence: 0.9,
        gate: ConfidenceGate::Verified,
    });
    store.push(receipt_at(
        "rcp-good",
        30,
        &["EVIDENCE_MISSING"],
        ConfidenceGate::Verified,
    ));

    let events = synthesize(&store, SynthesisConfig::default(), fixed_now()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].receipts, vec!["rcp-good".to_string()]);
}

#[test]
fn test_gate_rollup_taints_bucket() {
    let store = MemoryEvidenceStore::new();
    store.push(receipt_at(
        "rcp-v",
        20,
        &["HASH_MISMATCH"],
        ConfidenceGate::Verified,
    ));
    store.push(receipt_at(
        "rcp-u",
        25,
        &["HASH_MISMATCH"],
        ConfidenceGate::Unverified,
    ));

    let events = synthesize(&store, SynthesisConfig::default(), fixed_now()).unwrap();
    assert_eq!(events[0].confidence_gate, ConfidenceGate::Unverified);
}

#[test]
fn test_limit_is_clamped_and_applied() {
    let store = MemoryEvidenceStore::new();
    // Four distinct reasons, four buckets.
    for (i, reason) in ["EVIDENCE_MISSING", "EBITDA_AT_RISK", "TALENT_GAP", "POLICY_DRIFT"]
        .iter()
        .enumerate()
    {
        store.push(receipt_at(
            &format!("rcp-{i}"),
            30,
            &[reason],
            ConfidenceGate::Verified,
        ));
    }

    let config = SynthesisConfig {
        limit: 2,
        ..SynthesisConfig::default()
    };
    assert_eq!(synthesize(&store, config, fixed_now()).unwrap().len(), 2);

    // A zero limit clamps up to the floor of one.
    let config = SynthesisConfig {
        limit: 0,
        ..SynthesisConfig::default()
    };
    assert_eq!(synthesize(&store, config, fixed_now()).unwrap().len(), 1);
}

#[test]
fn test_config_clamping_ranges() {
    let config = SynthesisConfig {
        limit: 500,
        recent_window_minutes: 1,
        prior_window_minutes: 1_000_000,
    }
    .clamped();

    assert_eq!(config.limit, LIMIT_RANGE.1);
    assert_eq!(config.recent_window_minutes, RECENT_WINDOW_RANGE.0);
    assert_eq!(config.prior_window_minutes, PRIOR_WINDOW_MAX);

    // The prior window can never be narrower than the recent window.
    let config = SynthesisConfig {
        limit: 10,
        recent_window_minutes: 600,
        prior_window_minutes: 30,
    }
    .clamped();
    assert_eq!(config.prior_window_minutes, 600);
}

#[test]
fn test_event_id_tracks_window_contents() {
    let store = MemoryEvidenceStore::new();
    store.push(receipt_at(
        "rcp-1",
        30,
        &["EVIDENCE_MISSING"],
        ConfidenceGate::Verified,
    ));
    let first = synthesize(&store, SynthesisConfig::default(), fixed_now()).unwrap();

    // A new receipt extends the bucket's seen range, so identity shifts.
    store.push(receipt_at(
        "rcp-2",
        5,
        &["EVIDENCE_MISSING"],
        ConfidenceGate::Verified,
    ));
    let second = synthesize(&store, SynthesisConfig::default(), fixed_now()).unwrap();

    assert_ne!(first[0].event_id, second[0].event_id);
    assert!(first[0].event_id.starts_with("evt-"));
    assert_eq!(first[0].event_id.len(), 20);
}

#[test]
fn test_every_event_carries_why() {
    let store = MemoryEvidenceStore::new();
    store.push(receipt_at(
        "rcp-1",
        30,
        &["POLICY_DRIFT", "CONFIDENTIALITY_BREACH"],
        ConfidenceGate::Unverified,
    ));

    let events = synthesize(&store, SynthesisConfig::default(), fixed_now()).unwrap();
    for event in &events {
        assert!(event.why.len() >= 3, "missing justification: {event:?}");
    }
}
