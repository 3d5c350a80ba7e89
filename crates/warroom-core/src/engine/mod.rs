//! The workflow engine: the command surface over events, the ledger, and
//! the packet lifecycle.
//!
//! Every gated operation follows the same contract:
//!
//! 1. Read the event (`NotFound` if absent).
//! 2. Consult the policy engine.
//! 3. Audit the attempt before the outcome is acted on, so failed
//!    attempts land in the trail with their rejection reasons.
//! 4. On rejection, raise [`EngineError::PolicyRejected`] without touching
//!    state or lane summaries.
//! 5. On success, apply the mutation through the store's compare-and-swap
//!    primitive (ledger transitions move the amount atomically with the
//!    state change), audit the applied action, and broadcast the change.
//!
//! Concurrent writers racing on the same event are serialized by the CAS:
//! the loser gets [`EngineError::Conflict`] and retries; funds are never
//! double-moved.
//!
//! One observed asymmetry is preserved deliberately: packet approval
//! persists its signature even when policy rejects, so the record shows
//! who attempted to sign before the policy blocked progress. Submission
//! signs only on success; closes never sign.


use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditDetail, AuditRecord};
use crate::event::{LaneSummary, LedgerState, PacketStatus, SignatureAction, WarRoomEvent};
use crate::evidence::{EvidenceError, EvidenceSource};
use crate::policy::TransitionPolicy;
use crate::store::{StateStore, StoreError, UpsertOutcome};
use crate::stream::{StreamMessage, StreamPublisher};
use crate::synthesis::{synthesize, SynthesisConfig};

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The referenced event has no backing record. Fatal to the request;
    /// no retry.
    #[error("event not found: {event_id}")]
    NotFound {
        /// The missing event id.
        event_id: String,
    },

    /// Policy disallowed the transition. Not a system fault; the reasons
    /// are actionable and rendered to end users.
    #[error("transition rejected by policy: {}", .reasons.join("; "))]
    PolicyRejected {
        /// Human-readable rejection reasons, never empty.
        reasons: Vec<String>,
    },

    /// The event was mutated concurrently; re-read and retry.
    #[error("concurrent mutation conflict on {event_id}")]
    Conflict {
        /// The contested event id.
        event_id: String,
    },

    /// The state store failed.
    #[error(transparent)]
    Store(StoreError),

    /// The evidence source failed during a refresh.
    #[error(transparent)]
    Evidence(#[from] EvidenceError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { event_id } => Self::NotFound { event_id },
            StoreError::Conflict { event_id, .. } => Self::Conflict { event_id },
            other => Self::Store(other),
        }
    }
}

/// The War Room workflow engine.
///
/// Owns the injected collaborators (state store, transition policy,
/// evidence source, stream publisher) and exposes the command
/// surface. All dependencies are constructed once at process start and
/// passed in; nothing is reached through ambient globals.
pub struct WarRoomEngine {
    store: Arc<dyn StateStore>,
    policy: Arc<dyn TransitionPolicy>,
    evidence: Arc<dyn EvidenceSource>,
    publisher: StreamPublisher,
}

impl WarRoomEngine {
    /// Assembles an engine from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        policy: Arc<dyn TransitionPolicy>,
        evidence: Arc<dyn EvidenceSource>,
        publisher: StreamPublisher,
    ) -> Self {
        Self {
            store,
            policy,
            evidence,
            publisher,
        }
    }

    /// The stream publisher, for registering dashboard subscribers.
    #[must_use]
    pub const fn publisher(&self) -> &StreamPublisher {
        &self.publisher
    }

    /// The state store, for read-side queries.
    #[must_use]
    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    /// Assigns an owner. Unconditional: always allowed, always audited,
    /// moves no ledger amounts.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown events or `Conflict` on a concurrent
    /// mutation.
    pub fn assign(
        &self,
        event_id: &str,
        owner: &str,
        actor: &str,
    ) -> Result<WarRoomEvent, EngineError> {
        let event = self.store.get_event(event_id)?;
        let updated = self.store.mutate_event(event_id, event.version, &mut |e| {
            e.owner = Some(owner.to_string());
        })?;

        self.store.append_audit(&AuditRecord::unconditional(
            AuditAction::LedgerAssign,
            actor,
            event_id,
            AuditDetail::OwnerAssigned {
                owner: owner.to_string(),
            },
        ))?;

        info!(event_id, owner, actor, "owner assigned");
        self.publisher.publish(StreamMessage::EventUpsert {
            event: updated.clone(),
        });
        Ok(updated)
    }

    /// Approves an event: `IDENTIFIED → APPROVED`, moving its amount from
    /// the lane's `identified` bucket to `approved`.
    ///
    /// # Errors
    ///
    /// Returns `PolicyRejected` (with reasons) when policy disallows the
    /// transition, `NotFound` for unknown events, or `Conflict` when a
    /// concurrent writer got there first.
    pub fn approve(&self, event_id: &str, actor: &str) -> Result<WarRoomEvent, EngineError> {
        self.ledger_transition(event_id, actor, LedgerState::Approved, AuditAction::LedgerApprove)
    }

    /// Closes an event: `APPROVED → REALIZED`, moving its amount from
    /// `approved` to `realized`.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::approve`].
    pub fn close(&self, event_id: &str, actor: &str) -> Result<WarRoomEvent, EngineError> {
        self.ledger_transition(event_id, actor, LedgerState::Realized, AuditAction::LedgerClose)
    }

    fn ledger_transition(
        &self,
        event_id: &str,
        actor: &str,
        target: LedgerState,
        action: AuditAction,
    ) -> Result<WarRoomEvent, EngineError> {
        let event = self.store.get_event(event_id)?;
        let decision = self.policy.can_transition(&event, target);

        self.store.append_audit(
            &AuditRecord::gated(
                action,
                actor,
                event_id,
                &decision,
                AuditDetail::TransitionAttempt {
                    target: target.to_string(),
                },
            )
            .with_states(event.state.to_string(), target.to_string()),
        )?;

        if !decision.ok {
            warn!(event_id, actor, %target, reasons = ?decision.reasons, "ledger transition rejected");
            return Err(EngineError::PolicyRejected {
                reasons: decision.reasons,
            });
        }

        let (updated, summary) =
            self.store
                .apply_ledger_transition(event_id, event.version, target)?;

        self.store.append_audit(
            &AuditRecord::gated(
                action,
                actor,
                event_id,
                &decision,
                AuditDetail::LedgerApplied {
                    amount_moved: updated.amount,
                    lane: updated.lane,
                },
            )
            .with_states(event.state.to_string(), target.to_string()),
        )?;

        info!(event_id, actor, %target, amount = updated.amount, "ledger transition applied");
        self.publish_ledger_change(&updated, summary);
        Ok(updated)
    }

    /// Submits the governance packet: `DRAFT → SUBMITTED`, signing on
    /// success.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::approve`], against the packet policy.
    pub fn submit_packet(
        &self,
        event_id: &str,
        signer: &str,
        role: &str,
    ) -> Result<WarRoomEvent, EngineError> {
        self.packet_transition(
            event_id,
            signer,
            role,
            PacketStatus::Submitted,
            AuditAction::PacketSubmit,
            Some(SignatureAction::Submit),
            false,
        )
    }

    /// Approves the governance packet: `SUBMITTED → APPROVED`.
    ///
    /// The approval signature is persisted even when policy rejects, so
    /// the record shows who attempted to sign.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::approve`], against the packet policy.
    pub fn approve_packet(
        &self,
        event_id: &str,
        signer: &str,
        role: &str,
    ) -> Result<WarRoomEvent, EngineError> {
        self.packet_transition(
            event_id,
            signer,
            role,
            PacketStatus::Approved,
            AuditAction::PacketApprove,
            Some(SignatureAction::Approve),
            true,
        )
    }

    /// Closes the governance packet: `APPROVED → CLOSED`. No signature.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::approve`], against the packet policy.
    pub fn close_packet(&self, event_id: &str, actor: &str) -> Result<WarRoomEvent, EngineError> {
        self.packet_transition(
            event_id,
            actor,
            "",
            PacketStatus::Closed,
            AuditAction::PacketClose,
            None,
            false,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn packet_transition(
        &self,
        event_id: &str,
        signer: &str,
        role: &str,
        target: PacketStatus,
        action: AuditAction,
        signature: Option<SignatureAction>,
        sign_on_reject: bool,
    ) -> Result<WarRoomEvent, EngineError> {
        let event = self.store.get_event(event_id)?;
        let decision = self.policy.can_transition_packet(&event, target);

        self.store.append_audit(
            &AuditRecord::gated(
                action,
                signer,
                event_id,
                &decision,
                AuditDetail::TransitionAttempt {
                    target: target.to_string(),
                },
            )
            .with_states(event.packet_status.to_string(), target.to_string()),
        )?;

        if !decision.ok {
            if sign_on_reject {
                if let Some(sig_action) = signature {
                    let updated =
                        self.store.mutate_event(event_id, event.version, &mut |e| {
                            e.record_signature(signer, role, sig_action);
                        })?;
                    self.store.append_audit(&AuditRecord::gated(
                        action,
                        signer,
                        event_id,
                        &decision,
                        AuditDetail::SignatureRecorded {
                            signer: signer.to_string(),
                            role: role.to_string(),
                        },
                    ))?;
                    self.publisher
                        .publish(StreamMessage::EventUpsert { event: updated });
                }
            }
            warn!(event_id, signer, %target, reasons = ?decision.reasons, "packet transition rejected");
            return Err(EngineError::PolicyRejected {
                reasons: decision.reasons,
            });
        }

        let updated = self.store.mutate_event(event_id, event.version, &mut |e| {
            e.packet_status = target;
            if let Some(sig_action) = signature {
                e.record_signature(signer, role, sig_action);
            }
        })?;

        self.store.append_audit(
            &AuditRecord::gated(
                action,
                signer,
                event_id,
                &decision,
                AuditDetail::PacketApplied {
                    signed: signature.is_some(),
                },
            )
            .with_states(event.packet_status.to_string(), target.to_string()),
        )?;

        info!(event_id, signer, %target, "packet transition applied");
        self.publisher.publish(StreamMessage::EventUpsert {
            event: updated.clone(),
        });
        Ok(updated)
    }

    /// Links an evidence receipt to an event. Unconditional and audited;
    /// duplicates and over-cap links are recorded as no-ops.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown events or `Conflict` on a concurrent
    /// mutation.
    pub fn attach_receipt(
        &self,
        event_id: &str,
        receipt_id: &str,
        actor: &str,
    ) -> Result<WarRoomEvent, EngineError> {
        let event = self.store.get_event(event_id)?;
        let mut linked = false;
        let updated = self.store.mutate_event(event_id, event.version, &mut |e| {
            linked = e.link_receipt(receipt_id);
        })?;

        self.store.append_audit(&AuditRecord::unconditional(
            AuditAction::ReceiptAttach,
            actor,
            event_id,
            AuditDetail::ReceiptLinked {
                receipt_id: receipt_id.to_string(),
                linked,
            },
        ))?;

        self.publisher.publish(StreamMessage::EventUpsert {
            event: updated.clone(),
        });
        Ok(updated)
    }

    /// Replaces the working notes on an event.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown events or `Conflict` on a concurrent
    /// mutation.
    pub fn update_notes(
        &self,
        event_id: &str,
        notes: &str,
        actor: &str,
    ) -> Result<WarRoomEvent, EngineError> {
        let event = self.store.get_event(event_id)?;
        let updated = self.store.mutate_event(event_id, event.version, &mut |e| {
            e.notes = Some(notes.to_string());
        })?;

        self.store.append_audit(&AuditRecord::unconditional(
            AuditAction::NotesUpdate,
            actor,
            event_id,
            AuditDetail::NotesReplaced {
                length: notes.len(),
            },
        ))?;

        self.publisher.publish(StreamMessage::EventUpsert {
            event: updated.clone(),
        });
        Ok(updated)
    }

    /// Attaches a file reference to an event.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown events or `Conflict` on a concurrent
    /// mutation.
    pub fn attach_file(
        &self,
        event_id: &str,
        name: &str,
        actor: &str,
    ) -> Result<WarRoomEvent, EngineError> {
        let event = self.store.get_event(event_id)?;
        let updated = self.store.mutate_event(event_id, event.version, &mut |e| {
            e.attachments.push(name.to_string());
        })?;

        self.store.append_audit(&AuditRecord::unconditional(
            AuditAction::FileAttach,
            actor,
            event_id,
            AuditDetail::FileAttached {
                name: name.to_string(),
            },
        ))?;

        self.publisher.publish(StreamMessage::EventUpsert {
            event: updated.clone(),
        });
        Ok(updated)
    }

    /// Ingests an externally constructed event (seed data, upstream
    /// feeds). New events credit their amount to the lane summary; known
    /// events are refreshed with lifecycle fields preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn ingest(&self, event: WarRoomEvent) -> Result<WarRoomEvent, EngineError> {
        let (stored, outcome) = self.store.upsert_event(&event)?;

        self.publisher.publish(StreamMessage::EventUpsert {
            event: stored.clone(),
        });
        if outcome == UpsertOutcome::Created && stored.amount != 0 {
            let summary = self.store.lane_summary(stored.lane)?;
            self.publisher
                .publish(StreamMessage::SummaryUpsert { summary });
        }
        Ok(stored)
    }

    /// Runs a synthesis pass and upserts the results: the idempotent
    /// bridge from raw receipts to ranked events. Publishes a full
    /// snapshot afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the evidence source or the store fails.
    pub fn refresh(
        &self,
        config: SynthesisConfig,
        actor: &str,
    ) -> Result<Vec<WarRoomEvent>, EngineError> {
        let synthesized = synthesize(self.evidence.as_ref(), config, Utc::now())?;
        let produced = synthesized.len();

        let mut stored = Vec::with_capacity(produced);
        for event in synthesized {
            let (event, _) = self.store.upsert_event(&event)?;
            stored.push(event);
        }

        self.store.append_audit(&AuditRecord::unconditional(
            AuditAction::SynthRefresh,
            actor,
            "",
            AuditDetail::Refresh { produced },
        ))?;

        info!(produced, actor, "synthesis refresh complete");
        self.publish_snapshot()?;
        Ok(stored)
    }

    /// Current full state: ranked events plus one summary per lane.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn snapshot(&self) -> Result<(Vec<WarRoomEvent>, Vec<LaneSummary>), EngineError> {
        Ok((self.store.list_events()?, self.store.lane_summaries()?))
    }

    fn publish_snapshot(&self) -> Result<(), EngineError> {
        let (events, summaries) = self.snapshot()?;
        self.publisher
            .publish(StreamMessage::Snapshot { events, summaries });
        Ok(())
    }

    fn publish_ledger_change(&self, event: &WarRoomEvent, summary: LaneSummary) {
        self.publisher.publish(StreamMessage::EventUpsert {
            event: event.clone(),
        });
        self.publisher
            .publish(StreamMessage::SummaryUpsert { summary });
    }
}
