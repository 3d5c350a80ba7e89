//! Backend-agnostic store tests: both implementations run the same suite
//! so their semantics cannot drift.

use chrono::Utc;

use super::*;
use crate::audit::{AuditAction, AuditDetail};
use crate::event::{Category, EventStatus, PacketStatus};
use crate::evidence::ConfidenceGate;

fn event(id: &str, amount: i64) -> WarRoomEvent {
    WarRoomEvent {
        event_id: id.to_string(),
        category: Category::Financial,
        title: "Financial: EBITDA_AT_RISK".to_string(),
        lane: Lane::Value,
        amount,
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

fn with_backends(test: impl Fn(&dyn StateStore)) {
    test(&MemoryStateStore::new());
    test(&SqliteStateStore::in_memory().unwrap());
}

#[test]
fn test_get_missing_event_is_not_found() {
    with_backends(|store| {
        assert!(matches!(
            store.get_event("evt-missing"),
            Err(StoreError::NotFound { .. })
        ));
    });
}

#[test]
fn test_insert_credits_lane_bucket() {
    with_backends(|store| {
        let (_, outcome) = store.upsert_event(&event("evt-101", 580_000)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let summary = store.lane_summary(Lane::Value).unwrap();
        assert_eq!(summary.identified, 580_000);
        assert_eq!(summary.total(), 580_000);
    });
}

#[test]
fn test_upsert_refresh_preserves_lifecycle() {
    with_backends(|store| {
        let mut seeded = event("evt-101", 580_000);
        seeded.owner = Some("alice".to_string());
        seeded.notes = Some("working".to_string());
        seeded.receipts.push("rcp-1".to_string());
        store.upsert_event(&seeded).unwrap();

        // A re-synthesis of the same event id arrives with fresh scores
        // and no lifecycle context.
        let mut fresh = event("evt-101", 0);
        fresh.rank_score = 91;
        fresh.severity = 90;
        fresh.lane = Lane::Controls;
        fresh.receipts = vec!["rcp-2".to_string()];

        let (stored, outcome) = store.upsert_event(&fresh).unwrap();
        assert_eq!(outcome, UpsertOutcome::Refreshed);
        assert_eq!(stored.rank_score, 91);
        assert_eq!(stored.owner.as_deref(), Some("alice"));
        assert_eq!(stored.notes.as_deref(), Some("working"));
        assert_eq!(stored.amount, 580_000);
        // The lane stays where the amount was credited.
        assert_eq!(stored.lane, Lane::Value);
        assert_eq!(stored.receipts, vec!["rcp-1", "rcp-2"]);
        assert_eq!(stored.version, 1);

        // The summary is untouched by a refresh.
        let summary = store.lane_summary(Lane::Value).unwrap();
        assert_eq!(summary.identified, 580_000);
    });
}

#[test]
fn test_transition_moves_amount_atomically() {
    with_backends(|store| {
        store.upsert_event(&event("evt-101", 580_000)).unwrap();

        let (updated, summary) = store
            .apply_ledger_transition("evt-101", 0, LedgerState::Approved)
            .unwrap();

        assert_eq!(updated.state, LedgerState::Approved);
        assert_eq!(updated.version, 1);
        assert_eq!(summary.identified, 0);
        assert_eq!(summary.approved, 580_000);
        assert_eq!(summary.total(), 580_000);
    });
}

#[test]
fn test_transition_conflict_on_stale_version() {
    with_backends(|store| {
        store.upsert_event(&event("evt-101", 580_000)).unwrap();
        store
            .apply_ledger_transition("evt-101", 0, LedgerState::Approved)
            .unwrap();

        // A second writer that also read version 0 must lose.
        let err = store
            .apply_ledger_transition("evt-101", 0, LedgerState::Approved)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: 0,
                found: 1,
                ..
            }
        ));

        // Funds were not double-moved.
        let summary = store.lane_summary(Lane::Value).unwrap();
        assert_eq!(summary.approved, 580_000);
        assert_eq!(summary.total(), 580_000);
    });
}

#[test]
fn test_mutate_event_cas() {
    with_backends(|store| {
        store.upsert_event(&event("evt-101", 0)).unwrap();

        let updated = store
            .mutate_event("evt-101", 0, &mut |event| {
                event.owner = Some("bob".to_string());
            })
            .unwrap();
        assert_eq!(updated.owner.as_deref(), Some("bob"));
        assert_eq!(updated.version, 1);

        assert!(matches!(
            store.mutate_event("evt-101", 0, &mut |_| {}),
            Err(StoreError::Conflict { .. })
        ));
    });
}

#[test]
fn test_list_events_rank_ordered() {
    with_backends(|store| {
        let mut low = event("evt-low", 0);
        low.rank_score = 40;
        let mut high = event("evt-high", 0);
        high.rank_score = 95;

        store.upsert_event(&low).unwrap();
        store.upsert_event(&high).unwrap();

        let listed = store.list_events().unwrap();
        assert_eq!(listed[0].event_id, "evt-high");
        assert_eq!(listed[1].event_id, "evt-low");
    });
}

#[test]
fn test_lane_summaries_cover_all_lanes() {
    with_backends(|store| {
        let summaries = store.lane_summaries().unwrap();
        assert_eq!(summaries.len(), Lane::all().len());
        assert!(summaries.iter().all(|s| s.total() == 0));
    });
}

#[test]
fn test_audit_is_append_only_and_ordered() {
    with_backends(|store| {
        for i in 0..3u64 {
            let record = AuditRecord::unconditional(
                AuditAction::LedgerAssign,
                format!("actor-{i}"),
                "evt-101",
                AuditDetail::OwnerAssigned {
                    owner: format!("owner-{i}"),
                },
            );
            let seq = store.append_audit(&record).unwrap();
            assert_eq!(seq, i + 1);
        }

        let records = store.read_audit(1, 10).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].actor, "actor-0");
        assert_eq!(records[2].actor, "actor-2");

        let tail = store.read_audit(3, 10).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].actor, "actor-2");
    });
}

#[test]
fn test_sqlite_wal_mode_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStateStore::open(dir.path().join("warroom.db")).unwrap();
    assert!(store.verify_wal_mode().unwrap());
}
