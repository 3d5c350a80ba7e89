//! Transport-free command dispatch.
//!
//! Maps a [`CommandRequest`] onto the engine and folds the result into a
//! [`CommandResponse`]. Policy rejections become structured `rejected`
//! responses so clients can render the reasons; everything else
//! (not-found, conflict, store failures) surfaces as a terse error.

use warroom_core::{EngineError, SynthesisConfig, WarRoomEvent};

use crate::protocol::{CommandRequest, CommandResponse};
use crate::state::DaemonStateHandle;

fn fold(result: Result<WarRoomEvent, EngineError>) -> CommandResponse {
    match result {
        Ok(event) => CommandResponse::Event { event },
        Err(EngineError::PolicyRejected { reasons }) => CommandResponse::Rejected {
            policy_reasons: reasons,
        },
        Err(err) => CommandResponse::Error {
            message: err.to_string(),
        },
    }
}

/// Handles one command against the shared daemon state.
pub async fn dispatch(state: &DaemonStateHandle, request: CommandRequest) -> CommandResponse {
    let engine = state.engine();

    match request {
        CommandRequest::Ping => CommandResponse::Pong {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.uptime_secs(),
        },

        CommandRequest::Assign {
            event_id,
            owner,
            actor,
        } => fold(engine.assign(&event_id, &owner, &actor)),

        CommandRequest::Approve { event_id, actor } => fold(engine.approve(&event_id, &actor)),

        CommandRequest::Close { event_id, actor } => fold(engine.close(&event_id, &actor)),

        CommandRequest::AttachReceipt {
            event_id,
            receipt_id,
            actor,
        } => fold(engine.attach_receipt(&event_id, &receipt_id, &actor)),

        CommandRequest::UpdateNotes {
            event_id,
            notes,
            actor,
        } => fold(engine.update_notes(&event_id, &notes, &actor)),

        CommandRequest::AttachFile {
            event_id,
            name,
            actor,
        } => fold(engine.attach_file(&event_id, &name, &actor)),

        CommandRequest::SubmitPacket {
            event_id,
            actor,
            role,
        } => fold(engine.submit_packet(&event_id, &actor, &role)),

        CommandRequest::ApprovePacket {
            event_id,
            actor,
            role,
        } => fold(engine.approve_packet(&event_id, &actor, &role)),

        CommandRequest::ClosePacket { event_id, actor } => {
            fold(engine.close_packet(&event_id, &actor))
        }

        CommandRequest::Refresh {
            actor,
            limit,
            recent_window_minutes,
            prior_window_minutes,
        } => {
            let defaults = state.synthesis_config().await;
            let config = SynthesisConfig {
                limit: limit.unwrap_or(defaults.limit),
                recent_window_minutes: recent_window_minutes
                    .unwrap_or(defaults.recent_window_minutes),
                prior_window_minutes: prior_window_minutes
                    .unwrap_or(defaults.prior_window_minutes),
            };
            match engine.refresh(config, &actor) {
                Ok(events) => CommandResponse::Events { events },
                Err(err) => CommandResponse::Error {
                    message: err.to_string(),
                },
            }
        }

        CommandRequest::Snapshot => match engine.snapshot() {
            Ok((events, summaries)) => CommandResponse::Snapshot { events, summaries },
            Err(err) => CommandResponse::Error {
                message: err.to_string(),
            },
        },

        CommandRequest::Shutdown => {
            state.request_shutdown();
            CommandResponse::ShuttingDown
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use warroom_core::event::Category;
    use warroom_core::{
        ConfidenceGate, EventStatus, Lane, LedgerState, MemoryEvidenceStore, MemoryStateStore,
        PacketStatus, PolicyConfig, StandardPolicy, StreamPublisher, WarRoomEngine, WarRoomEvent,
    };

    use super::*;
    use crate::state::DaemonStateHandle;

    fn state_with(config: PolicyConfig) -> DaemonStateHandle {
        let engine = Arc::new(WarRoomEngine::new(
            Arc::new(MemoryStateStore::new()),
            Arc::new(StandardPolicy::new(config)),
            Arc::new(MemoryEvidenceStore::new()),
            StreamPublisher::default(),
        ));
        DaemonStateHandle::new(engine, SynthesisConfig::default())
    }

    fn seed(state: &DaemonStateHandle, id: &str, amount: i64) {
        state
            .engine()
            .ingest(WarRoomEvent {
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
                why: vec!["seeded".to_string()],
                updated_at: Utc::now(),
                version: 0,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_approve_round_trip() {
        let state = state_with(PolicyConfig::permissive());
        seed(&state, "evt-101", 580_000);

        let response = dispatch(
            &state,
            CommandRequest::Approve {
                event_id: "evt-101".to_string(),
                actor: "alice".to_string(),
            },
        )
        .await;

        match response {
            CommandResponse::Event { event } => {
                assert_eq!(event.state, LedgerState::Approved);
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejection_carries_policy_reasons() {
        let state = state_with(PolicyConfig::default());
        seed(&state, "evt-101", 580_000);

        let response = dispatch(
            &state,
            CommandRequest::Approve {
                event_id: "evt-101".to_string(),
                actor: "alice".to_string(),
            },
        )
        .await;

        match response {
            CommandResponse::Rejected { policy_reasons } => {
                assert!(policy_reasons.iter().any(|r| r.contains("owner")));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_not_found_is_terse_error() {
        let state = state_with(PolicyConfig::permissive());

        let response = dispatch(
            &state,
            CommandRequest::Approve {
                event_id: "evt-ghost".to_string(),
                actor: "alice".to_string(),
            },
        )
        .await;

        assert!(matches!(response, CommandResponse::Error { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_covers_all_lanes() {
        let state = state_with(PolicyConfig::permissive());
        seed(&state, "evt-101", 580_000);

        let response = dispatch(&state, CommandRequest::Snapshot).await;
        match response {
            CommandResponse::Snapshot { events, summaries } => {
                assert_eq!(events.len(), 1);
                assert_eq!(summaries.len(), Lane::all().len());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_flips_flag() {
        let state = state_with(PolicyConfig::permissive());
        assert!(!state.is_shutdown_requested());

        let response = dispatch(&state, CommandRequest::Shutdown).await;
        assert!(matches!(response, CommandResponse::ShuttingDown));
        assert!(state.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_wire_round_trip() {
        let request = r#"{"type":"assign","event_id":"evt-101","owner":"bob","actor":"ops"}"#;
        let parsed: CommandRequest = serde_json::from_str(request).unwrap();
        assert!(matches!(parsed, CommandRequest::Assign { .. }));

        let state = state_with(PolicyConfig::permissive());
        seed(&state, "evt-101", 0);
        let response = dispatch(&state, parsed).await;
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["owner"], "bob");
    }
}
