//! The shared state store: events, lane summaries, and the audit log.
//!
//! The store is the only genuinely shared mutable resource in the
//! subsystem, so its contract is built around two guarantees:
//!
//! - **Per-event optimistic concurrency**: every mutation is a
//!   compare-and-swap on the event's `version` field. Two concurrent
//!   approvals can both read `IDENTIFIED` and both pass policy, but only
//!   one CAS wins; the loser gets [`StoreError::Conflict`] and funds are
//!   never double-moved.
//! - **Atomic amount movement**: a ledger transition mutates the event
//!   state and moves its amount between lane-summary buckets as a single
//!   unit, so a crash can never leave the summary out of step with the
//!   events.
//!
//! The store is constructed once at process start and passed by reference
//! to every component, never reached through ambient global lookup.

mod memory;
mod sqlite;

#[cfg(test)]
mod tests;

pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

use thiserror::Error;

use crate::audit::AuditRecord;
use crate::event::{Lane, LaneSummary, LedgerState, WarRoomEvent};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Event payload could not be (de)serialized.
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No event exists with the given id.
    #[error("event not found: {event_id}")]
    NotFound {
        /// The missing event id.
        event_id: String,
    },

    /// The event was mutated concurrently; the caller should re-read and
    /// retry.
    #[error("concurrent mutation conflict on {event_id}: expected version {expected}, found {found}")]
    Conflict {
        /// The contested event id.
        event_id: String,
        /// The version the caller based its mutation on.
        expected: u64,
        /// The version actually in the store.
        found: u64,
    },
}

/// Outcome of an idempotent upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The event was newly inserted.
    Created,

    /// An existing event was refreshed.
    Refreshed,
}

/// The shared state store contract.
///
/// All methods are blocking from the caller's perspective and safe to call
/// from concurrent request handlers.
pub trait StateStore: Send + Sync {
    /// Reads a single event.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no event has this id.
    fn get_event(&self, event_id: &str) -> Result<WarRoomEvent, StoreError>;

    /// Lists all events, ranked descending (ties broken by most recent
    /// update).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn list_events(&self) -> Result<Vec<WarRoomEvent>, StoreError>;

    /// Idempotently upserts a synthesized or ingested event.
    ///
    /// A new event is inserted as-is and its amount is credited to its
    /// lane-summary bucket. An existing event keeps its lifecycle fields
    /// (state, lane, owner, packet status and signatures, notes,
    /// attachments, amount) while the synthesis-derived fields (scores,
    /// reasons, gate, `why`, title, status) are refreshed; linked receipts
    /// are merged up to the cap, and the version is bumped.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn upsert_event(&self, event: &WarRoomEvent)
        -> Result<(WarRoomEvent, UpsertOutcome), StoreError>;

    /// Applies a ledger transition atomically: compare-and-swap on
    /// `expected_version`, mutate the state, and move the event's amount
    /// from its current state's bucket to `next_state`'s bucket in one
    /// unit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids and `Conflict` when the version
    /// has moved; in both cases nothing is mutated.
    fn apply_ledger_transition(
        &self,
        event_id: &str,
        expected_version: u64,
        next_state: LedgerState,
    ) -> Result<(WarRoomEvent, LaneSummary), StoreError>;

    /// Applies a non-accounting mutation under the same compare-and-swap
    /// discipline. The closure receives the stored event; the store bumps
    /// the version and refreshes `updated_at` afterwards.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids and `Conflict` when the version
    /// has moved.
    fn mutate_event(
        &self,
        event_id: &str,
        expected_version: u64,
        mutation: &mut dyn FnMut(&mut WarRoomEvent),
    ) -> Result<WarRoomEvent, StoreError>;

    /// Reads one lane summary (all-zero if the lane has never been
    /// touched).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn lane_summary(&self, lane: Lane) -> Result<LaneSummary, StoreError>;

    /// Reads the summaries for every lane, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn lane_summaries(&self) -> Result<Vec<LaneSummary>, StoreError>;

    /// Appends an audit record, returning its sequence number. Records are
    /// never overwritten or deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn append_audit(&self, record: &AuditRecord) -> Result<u64, StoreError>;

    /// Reads audit records with sequence numbers `>= cursor`, oldest
    /// first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn read_audit(&self, cursor: u64, limit: u64) -> Result<Vec<AuditRecord>, StoreError>;
}

/// Merges a refreshed synthesis result into a stored event, preserving the
/// lifecycle fields. Shared by both store backends so their upsert
/// semantics cannot drift.
fn merge_refresh(stored: &mut WarRoomEvent, fresh: &WarRoomEvent) {
    stored.category = fresh.category;
    stored.title = fresh.title.clone();
    // The lane is not refreshed: the stored amount was credited to it, and
    // amounts only move between buckets through ledger transitions.
    stored.top_reason_codes = fresh.top_reason_codes.clone();
    stored.severity = fresh.severity;
    stored.velocity = fresh.velocity;
    stored.confidence_score = fresh.confidence_score;
    stored.confidence_gate = fresh.confidence_gate;
    stored.rank_score = fresh.rank_score;
    stored.status = fresh.status;
    stored.why = fresh.why.clone();
    stored.updated_at = fresh.updated_at;
    for receipt_id in &fresh.receipts {
        stored.link_receipt(receipt_id);
    }
}
