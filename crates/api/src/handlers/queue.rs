//! Handlers for queue admission and liveness.
//!
//! Enqueue and cancel are the only writes a participant makes before being
//! placed; heartbeat keeps whichever record they currently occupy alive.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tandem_core::error::CoreError;
use tandem_core::matching::{normalize_exclusions, validate_preferences};
use tandem_core::types::{DbId, Timestamp};
use tandem_db::models::queue_entry::{Enqueue, EnqueueOutcome};
use tandem_db::models::room::EndReason;
use tandem_db::repositories::{ParticipantRepo, QueueRepo, RoomRepo};
use tandem_events::LifecycleEvent;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Response for POST /heartbeat.
#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    /// `"room"` or `"queue"`, whichever record was refreshed.
    pub target: &'static str,
    pub room_id: Option<DbId>,
    pub at: Timestamp,
}

// ---------------------------------------------------------------------------
// Enqueue / cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/queue
///
/// Create or refresh the caller's queue entry and wake the matchmaker.
pub async fn enqueue(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<Enqueue>,
) -> AppResult<impl IntoResponse> {
    validate_preferences(&input.gender, &input.want_gender)?;
    let input = Enqueue {
        exclusions: normalize_exclusions(auth.participant_id, &input.exclusions)?,
        ..input
    };

    ParticipantRepo::ensure(&state.pool, auth.participant_id).await?;

    let entry = match QueueRepo::enqueue(&state.pool, auth.participant_id, &input, Utc::now())
        .await?
    {
        EnqueueOutcome::Queued(entry) => entry,
        EnqueueOutcome::AlreadyPlaced { room_id } => {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "Participant is already placed in room {room_id}"
            ))));
        }
    };

    state
        .event_bus
        .publish(LifecycleEvent::entry_waiting(auth.participant_id));

    tracing::info!(
        participant_id = auth.participant_id,
        gender = %input.gender,
        want_gender = %input.want_gender,
        exclusions = input.exclusions.len(),
        "Participant enqueued",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: entry })))
}

/// DELETE /api/v1/queue
///
/// Withdraw from pairing. Tears the caller's room down if they were already
/// placed. Always succeeds; a second call reports nothing to undo.
pub async fn cancel(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let outcome = QueueRepo::cancel(&state.pool, auth.participant_id, Utc::now()).await?;

    if let (Some(room_id), Some(partner_id)) = (outcome.terminated_room_id, outcome.partner_id) {
        state.event_bus.publish(LifecycleEvent::room_ended(
            room_id,
            [auth.participant_id, partner_id],
            EndReason::Cancelled.as_str(),
        ));
    }

    tracing::info!(
        participant_id = auth.participant_id,
        dequeued = outcome.dequeued,
        terminated_room_id = ?outcome.terminated_room_id,
        "Queue cancel processed",
    );

    Ok(Json(DataResponse { data: outcome }))
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// POST /api/v1/heartbeat
///
/// Refresh the caller's room heartbeat if they are placed, otherwise their
/// queue entry's. 404 if they occupy neither.
pub async fn heartbeat(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let room_id = ParticipantRepo::find_by_id(&state.pool, auth.participant_id)
        .await?
        .and_then(|p| p.active_room_id);

    if let Some(room_id) = room_id {
        if RoomRepo::touch_heartbeat(&state.pool, room_id, auth.participant_id, now).await? {
            return Ok(Json(DataResponse {
                data: HeartbeatResponse {
                    target: "room",
                    room_id: Some(room_id),
                    at: now,
                },
            }));
        }
    }

    if QueueRepo::touch_heartbeat(&state.pool, auth.participant_id, now).await? {
        return Ok(Json(DataResponse {
            data: HeartbeatResponse {
                target: "queue",
                room_id: None,
                at: now,
            },
        }));
    }

    Err(AppError::Core(CoreError::NotFound {
        entity: "QueueEntry",
        id: auth.participant_id,
    }))
}
