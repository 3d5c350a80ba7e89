//! In-memory state store for tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use super::{merge_refresh, StateStore, StoreError, UpsertOutcome};
use crate::audit::AuditRecord;
use crate::event::{Lane, LaneSummary, LedgerState, WarRoomEvent};

#[derive(Default)]
struct Inner {
    events: HashMap<String, WarRoomEvent>,
    summaries: HashMap<Lane, LaneSummary>,
    audit: Vec<AuditRecord>,
}

/// A process-local state store. A single mutex over the whole state gives
/// the same read-modify-write atomicity the `SQLite` backend gets from
/// transactions.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn summary_mut(&mut self, lane: Lane) -> &mut LaneSummary {
        self.summaries
            .entry(lane)
            .or_insert_with(|| LaneSummary::new(lane))
    }
}

impl StateStore for MemoryStateStore {
    fn get_event(&self, event_id: &str) -> Result<WarRoomEvent, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .events
            .get(event_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                event_id: event_id.to_string(),
            })
    }

    fn list_events(&self) -> Result<Vec<WarRoomEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut events: Vec<WarRoomEvent> = inner.events.values().cloned().collect();
        events.sort_by(|a, b| {
            b.rank_score
                .cmp(&a.rank_score)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        Ok(events)
    }

    fn upsert_event(
        &self,
        event: &WarRoomEvent,
    ) -> Result<(WarRoomEvent, UpsertOutcome), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner.events.get_mut(&event.event_id) {
            merge_refresh(existing, event);
            existing.version += 1;
            let stored = existing.clone();
            return Ok((stored, UpsertOutcome::Refreshed));
        }

        if event.amount != 0 {
            *inner.summary_mut(event.lane).bucket_mut(event.state) += event.amount;
        }
        inner
            .events
            .insert(event.event_id.clone(), event.clone());
        Ok((event.clone(), UpsertOutcome::Created))
    }

    fn apply_ledger_transition(
        &self,
        event_id: &str,
        expected_version: u64,
        next_state: LedgerState,
    ) -> Result<(WarRoomEvent, LaneSummary), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let event = inner
            .events
            .get(event_id)
            .ok_or_else(|| StoreError::NotFound {
                event_id: event_id.to_string(),
            })?;
        if event.version != expected_version {
            return Err(StoreError::Conflict {
                event_id: event_id.to_string(),
                expected: expected_version,
                found: event.version,
            });
        }

        let (lane, amount, prior_state) = (event.lane, event.amount, event.state);

        let event = inner.events.get_mut(event_id).expect("checked above");
        event.state = next_state;
        event.version += 1;
        event.updated_at = Utc::now();
        let updated = event.clone();

        let summary = inner.summary_mut(lane);
        summary.apply_move(prior_state, next_state, amount);
        let summary = *summary;

        Ok((updated, summary))
    }

    fn mutate_event(
        &self,
        event_id: &str,
        expected_version: u64,
        mutation: &mut dyn FnMut(&mut WarRoomEvent),
    ) -> Result<WarRoomEvent, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let event = inner
            .events
            .get_mut(event_id)
            .ok_or_else(|| StoreError::NotFound {
                event_id: event_id.to_string(),
            })?;
        if event.version != expected_version {
            return Err(StoreError::Conflict {
                event_id: event_id.to_string(),
                expected: expected_version,
                found: event.version,
            });
        }

        mutation(event);
        event.version += 1;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    fn lane_summary(&self, lane: Lane) -> Result<LaneSummary, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .summaries
            .get(&lane)
            .copied()
            .unwrap_or_else(|| LaneSummary::new(lane)))
    }

    fn lane_summaries(&self) -> Result<Vec<LaneSummary>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(Lane::all()
            .iter()
            .map(|lane| {
                inner
                    .summaries
                    .get(lane)
                    .copied()
                    .unwrap_or_else(|| LaneSummary::new(*lane))
            })
            .collect())
    }

    fn append_audit(&self, record: &AuditRecord) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.audit.push(record.clone());
        Ok(inner.audit.len() as u64)
    }

    fn read_audit(&self, cursor: u64, limit: u64) -> Result<Vec<AuditRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let start = cursor.saturating_sub(1) as usize;
        Ok(inner
            .audit
            .iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
