//! `SQLite`-backed state store.
//!
//! Uses WAL mode for concurrent reads. Events are stored as JSON payloads
//! with the version and ranking columns lifted out; transitions run inside
//! a single transaction so the compare-and-swap, the state mutation, and
//! the lane-summary move commit or roll back together.

// SQLite returns i64 for row IDs and counts, but they're always
// non-negative here. Mutex poisoning indicates a panic in another thread,
// which is unrecoverable.
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::missing_panics_doc
)]

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};

use super::{merge_refresh, StateStore, StoreError, UpsertOutcome};
use crate::audit::AuditRecord;
use crate::event::{Lane, LaneSummary, LedgerState, WarRoomEvent};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Column name for a ledger state's summary bucket.
const fn bucket_column(state: LedgerState) -> &'static str {
    match state {
        LedgerState::Identified => "identified",
        LedgerState::Approved => "approved",
        LedgerState::Realized => "realized",
        LedgerState::AtRisk => "at_risk",
    }
}

/// The `SQLite`-backed state store.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Opens or creates a store at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Verifies that WAL mode is enabled (always false for in-memory
    /// databases, which use the `memory` journal).
    ///
    /// # Errors
    ///
    /// Returns an error if the journal mode cannot be queried.
    pub fn verify_wal_mode(&self) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode.to_lowercase() == "wal")
    }

    fn load_event(tx: &Transaction<'_>, event_id: &str) -> Result<WarRoomEvent, StoreError> {
        let payload: Option<String> = tx
            .query_row(
                "SELECT payload FROM events WHERE event_id = ?1",
                params![event_id],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Err(StoreError::NotFound {
                event_id: event_id.to_string(),
            }),
        }
    }

    fn write_event(tx: &Transaction<'_>, event: &WarRoomEvent) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO events (event_id, version, rank_score, updated_at_ns, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(event_id) DO UPDATE SET
                 version = excluded.version,
                 rank_score = excluded.rank_score,
                 updated_at_ns = excluded.updated_at_ns,
                 payload = excluded.payload",
            params![
                event.event_id,
                event.version as i64,
                i64::from(event.rank_score),
                event.updated_at.timestamp_nanos_opt().unwrap_or(0),
                serde_json::to_string(event)?,
            ],
        )?;
        Ok(())
    }

    fn ensure_summary_row(tx: &Transaction<'_>, lane: Lane) -> Result<(), StoreError> {
        tx.execute(
            "INSERT OR IGNORE INTO lane_summaries (lane) VALUES (?1)",
            params![lane.as_str()],
        )?;
        Ok(())
    }

    fn credit_bucket(
        tx: &Transaction<'_>,
        lane: Lane,
        state: LedgerState,
        amount: i64,
    ) -> Result<(), StoreError> {
        Self::ensure_summary_row(tx, lane)?;
        let column = bucket_column(state);
        tx.execute(
            &format!("UPDATE lane_summaries SET {column} = {column} + ?1 WHERE lane = ?2"),
            params![amount, lane.as_str()],
        )?;
        Ok(())
    }

    fn read_summary(conn: &Connection, lane: Lane) -> Result<LaneSummary, StoreError> {
        let summary = conn
            .query_row(
                "SELECT identified, approved, realized, at_risk
                 FROM lane_summaries WHERE lane = ?1",
                params![lane.as_str()],
                |row| {
                    Ok(LaneSummary {
                        lane,
                        identified: row.get(0)?,
                        approved: row.get(1)?,
                        realized: row.get(2)?,
                        at_risk: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(summary.unwrap_or_else(|| LaneSummary::new(lane)))
    }
}

impl StateStore for SqliteStateStore {
    fn get_event(&self, event_id: &str) -> Result<WarRoomEvent, StoreError> {
        let conn = self.conn.lock().unwrap();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM events WHERE event_id = ?1",
                params![event_id],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Err(StoreError::NotFound {
                event_id: event_id.to_string(),
            }),
        }
    }

    fn list_events(&self) -> Result<Vec<WarRoomEvent>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT payload FROM events
             ORDER BY rank_score DESC, updated_at_ns DESC, event_id ASC",
        )?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StoreError::from))
            .collect()
    }

    fn upsert_event(
        &self,
        event: &WarRoomEvent,
    ) -> Result<(WarRoomEvent, UpsertOutcome), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let (stored, outcome) = match Self::load_event(&tx, &event.event_id) {
            Ok(mut existing) => {
                merge_refresh(&mut existing, event);
                existing.version += 1;
                (existing, UpsertOutcome::Refreshed)
            }
            Err(StoreError::NotFound { .. }) => {
                if event.amount != 0 {
                    Self::credit_bucket(&tx, event.lane, event.state, event.amount)?;
                }
                (event.clone(), UpsertOutcome::Created)
            }
            Err(err) => return Err(err),
        };

        Self::write_event(&tx, &stored)?;
        tx.commit()?;
        Ok((stored, outcome))
    }

    fn apply_ledger_transition(
        &self,
        event_id: &str,
        expected_version: u64,
        next_state: LedgerState,
    ) -> Result<(WarRoomEvent, LaneSummary), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut event = Self::load_event(&tx, event_id)?;
        if event.version != expected_version {
            return Err(StoreError::Conflict {
                event_id: event_id.to_string(),
                expected: expected_version,
                found: event.version,
            });
        }

        let prior_state = event.state;
        event.state = next_state;
        event.version += 1;
        event.updated_at = Utc::now();

        Self::write_event(&tx, &event)?;
        Self::credit_bucket(&tx, event.lane, prior_state, -event.amount)?;
        Self::credit_bucket(&tx, event.lane, next_state, event.amount)?;

        let summary = Self::read_summary(&tx, event.lane)?;
        tx.commit()?;
        Ok((event, summary))
    }

    fn mutate_event(
        &self,
        event_id: &str,
        expected_version: u64,
        mutation: &mut dyn FnMut(&mut WarRoomEvent),
    ) -> Result<WarRoomEvent, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut event = Self::load_event(&tx, event_id)?;
        if event.version != expected_version {
            return Err(StoreError::Conflict {
                event_id: event_id.to_string(),
                expected: expected_version,
                found: event.version,
            });
        }

        mutation(&mut event);
        event.version += 1;
        event.updated_at = Utc::now();

        Self::write_event(&tx, &event)?;
        tx.commit()?;
        Ok(event)
    }

    fn lane_summary(&self, lane: Lane) -> Result<LaneSummary, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::read_summary(&conn, lane)
    }

    fn lane_summaries(&self) -> Result<Vec<LaneSummary>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Lane::all()
            .iter()
            .map(|lane| Self::read_summary(&conn, *lane))
            .collect()
    }

    fn append_audit(&self, record: &AuditRecord) -> Result<u64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audit_log (at_ns, payload) VALUES (?1, ?2)",
            params![
                record.at.timestamp_nanos_opt().unwrap_or(0),
                serde_json::to_string(record)?,
            ],
        )?;
        Ok(conn.last_insert_rowid() as u64)
    }

    fn read_audit(&self, cursor: u64, limit: u64) -> Result<Vec<AuditRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT payload FROM audit_log WHERE seq >= ?1 ORDER BY seq ASC LIMIT ?2",
        )?;
        let payloads = stmt
            .query_map(params![cursor as i64, limit as i64], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(StoreError::from))
            .collect()
    }
}
