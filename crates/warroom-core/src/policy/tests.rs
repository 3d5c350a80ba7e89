//! Tests for the transition policy.

use chrono::Utc;

use super::*;
use crate::event::{Category, EventStatus, Lane, PacketSignature};

fn event() -> WarRoomEvent {
    WarRoomEvent {
        event_id: "evt-101".to_string(),
        category: Category::Financial,
        title: "Financial: EBITDA_AT_RISK".to_string(),
        lane: Lane::Value,
        amount: 580_000,
        top_reason_codes: vec!["EBITDA_AT_RISK".to_string()],
        severity: 85,
        velocity: 50,
        confidence_score: 0.8,
        confidence_gate: ConfidenceGate::Verified,
        rank_score: 75,
        status: EventStatus::Watch,
        state: LedgerState::Identified,
        packet_status: PacketStatus::Draft,
        packet_signatures: Vec::<PacketSignature>::new(),
        owner: None,
        receipts: Vec::new(),
        notes: None,
        attachments: Vec::new(),
        why: vec!["sample".to_string()],
        updated_at: Utc::now(),
        version: 0,
    }
}

#[test]
fn test_structural_ledger_legality() {
    let policy = StandardPolicy::permissive();

    assert!(policy.can_transition(&event(), LedgerState::Approved).ok);

    let mut approved = event();
    approved.state = LedgerState::Approved;
    assert!(policy.can_transition(&approved, LedgerState::Realized).ok);

    // Skipping a stage is illegal.
    let skip = policy.can_transition(&event(), LedgerState::Realized);
    assert!(!skip.ok);
    assert!(skip.reasons[0].contains("illegal ledger transition"));

    // Terminal state accepts nothing.
    let mut realized = event();
    realized.state = LedgerState::Realized;
    assert!(!policy.can_transition(&realized, LedgerState::Approved).ok);
}

#[test]
fn test_at_risk_has_no_policy_entry_path() {
    let policy = StandardPolicy::permissive();
    let decision = policy.can_transition(&event(), LedgerState::AtRisk);
    assert!(!decision.ok);
    assert!(!decision.reasons.is_empty());
}

#[test]
fn test_owner_precondition_carries_reason() {
    let policy = StandardPolicy::new(PolicyConfig::default());
    let decision = policy.can_transition(&event(), LedgerState::Approved);
    assert!(!decision.ok);
    assert!(decision.reasons.iter().any(|r| r.contains("owner")));

    let mut owned = event();
    owned.owner = Some("alice".to_string());
    assert!(policy.can_transition(&owned, LedgerState::Approved).ok);
}

#[test]
fn test_packet_preconditions_stack() {
    let policy = StandardPolicy::new(PolicyConfig::default());

    // Default packet submission needs an owner and linked evidence.
    let decision = policy.can_transition_packet(&event(), PacketStatus::Submitted);
    assert!(!decision.ok);
    assert_eq!(decision.reasons.len(), 2);

    let mut ready = event();
    ready.owner = Some("alice".to_string());
    ready.receipts.push("rcp-1".to_string());
    assert!(policy
        .can_transition_packet(&ready, PacketStatus::Submitted)
        .ok);
}

#[test]
fn test_packet_structural_chain() {
    let policy = StandardPolicy::permissive();

    let draft = event();
    assert!(!policy.can_transition_packet(&draft, PacketStatus::Closed).ok);
    assert!(!policy
        .can_transition_packet(&draft, PacketStatus::Approved)
        .ok);

    let mut submitted = event();
    submitted.packet_status = PacketStatus::Submitted;
    assert!(policy
        .can_transition_packet(&submitted, PacketStatus::Approved)
        .ok);
}

#[test]
fn test_verified_gate_precondition() {
    let mut config = PolicyConfig::permissive();
    config.ledger.close.require_verified_gate = true;
    let policy = StandardPolicy::new(config);

    let mut unverified = event();
    unverified.state = LedgerState::Approved;
    unverified.confidence_gate = ConfidenceGate::Unverified;

    let decision = policy.can_transition(&unverified, LedgerState::Realized);
    assert!(!decision.ok);
    assert!(decision.reasons.iter().any(|r| r.contains("VERIFIED")));
}

#[test]
fn test_config_from_yaml() {
    let doc = r"
version: '2.1.0'
name: fiduciary-signoff
ledger:
  approve:
    require_owner: true
    require_receipts: true
packet:
  submit:
    require_owner: true
";
    let config = PolicyConfig::from_yaml(doc).unwrap();
    assert_eq!(config.version, "2.1.0");
    assert_eq!(config.name, "fiduciary-signoff");
    assert!(config.ledger.approve.require_owner);
    assert!(config.ledger.approve.require_receipts);
    assert!(!config.ledger.close.require_owner);
    assert!(config.packet.submit.require_owner);
    assert!(!config.packet.submit.require_receipts);
}

#[test]
fn test_config_rejects_bad_yaml() {
    assert!(PolicyConfig::from_yaml("ledger: [not, a, map]").is_err());
}
