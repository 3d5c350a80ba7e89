//! Command protocol between clients and the daemon.
//!
//! Requests map 1:1 to engine operations. Every command carries an
//! explicit `actor` (packet actions carry a `role` as well), and a gated
//! command either returns the updated event or a structured rejection with
//! the policy's reasons.

use serde::{Deserialize, Serialize};
use warroom_core::{LaneSummary, WarRoomEvent};

/// A command from a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandRequest {
    /// Ping the daemon.
    Ping,

    /// Assign an owner to an event.
    Assign {
        /// Target event.
        event_id: String,
        /// New owner.
        owner: String,
        /// Who is asking.
        actor: String,
    },

    /// Approve an event (`IDENTIFIED → APPROVED`).
    Approve {
        /// Target event.
        event_id: String,
        /// Who is asking.
        actor: String,
    },

    /// Close an event (`APPROVED → REALIZED`).
    Close {
        /// Target event.
        event_id: String,
        /// Who is asking.
        actor: String,
    },

    /// Link an evidence receipt to an event.
    AttachReceipt {
        /// Target event.
        event_id: String,
        /// Receipt to link.
        receipt_id: String,
        /// Who is asking.
        actor: String,
    },

    /// Replace the working notes on an event.
    UpdateNotes {
        /// Target event.
        event_id: String,
        /// New notes text.
        notes: String,
        /// Who is asking.
        actor: String,
    },

    /// Attach a file reference to an event.
    AttachFile {
        /// Target event.
        event_id: String,
        /// File reference.
        name: String,
        /// Who is asking.
        actor: String,
    },

    /// Submit the governance packet (`DRAFT → SUBMITTED`).
    SubmitPacket {
        /// Target event.
        event_id: String,
        /// Who signs the submission.
        actor: String,
        /// The signer's role.
        role: String,
    },

    /// Approve the governance packet (`SUBMITTED → APPROVED`).
    ApprovePacket {
        /// Target event.
        event_id: String,
        /// Who signs the approval.
        actor: String,
        /// The signer's role.
        role: String,
    },

    /// Close the governance packet (`APPROVED → CLOSED`).
    ClosePacket {
        /// Target event.
        event_id: String,
        /// Who is asking.
        actor: String,
    },

    /// Run a synthesis refresh pass.
    Refresh {
        /// Who is asking.
        actor: String,
        /// Override the result limit.
        #[serde(default)]
        limit: Option<usize>,
        /// Override the recent window, in minutes.
        #[serde(default)]
        recent_window_minutes: Option<i64>,
        /// Override the prior window, in minutes.
        #[serde(default)]
        prior_window_minutes: Option<i64>,
    },

    /// Read the full current state.
    Snapshot,

    /// Request daemon shutdown.
    Shutdown,
}

/// The daemon's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResponse {
    /// Pong.
    Pong {
        /// Daemon version.
        version: String,
        /// Daemon uptime in seconds.
        uptime_secs: u64,
    },

    /// The updated event after a successful command.
    Event {
        /// The event.
        event: WarRoomEvent,
    },

    /// Ranked events after a refresh.
    Events {
        /// The events.
        events: Vec<WarRoomEvent>,
    },

    /// The full current state.
    Snapshot {
        /// Ranked events.
        events: Vec<WarRoomEvent>,
        /// One summary per lane.
        summaries: Vec<LaneSummary>,
    },

    /// Policy rejected the command; the reasons are actionable.
    Rejected {
        /// Rejection reasons, never empty.
        policy_reasons: Vec<String>,
    },

    /// The command failed for a non-policy reason (not found, conflict,
    /// store failure, malformed request).
    Error {
        /// Terse description.
        message: String,
    },

    /// Shutdown acknowledged.
    ShuttingDown,
}
