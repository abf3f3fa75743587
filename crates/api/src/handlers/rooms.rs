//! Handlers for the room lifecycle: inspect, enter, extend, end, and the
//! voice-channel credential.
//!
//! Every endpoint is restricted to the room's two members.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tandem_core::error::CoreError;
use tandem_core::types::DbId;
use tandem_db::models::call_session::{CallSession, ExtendOutcome, ExtendSession, SessionExtension};
use tandem_db::models::room::{
    EndReason, EnterOutcome, Room, RoomDetail, TerminateIf, TerminationOutcome,
};
use tandem_db::models::status::RoomStatus;
use tandem_db::repositories::{CallSessionRepo, RoomRepo};
use tandem_events::bus::event_types;
use tandem_events::LifecycleEvent;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Response for GET /rooms/{id}.
#[derive(Debug, Serialize)]
pub struct RoomView {
    #[serde(flatten)]
    pub detail: RoomDetail,
    /// Extension history, oldest first.
    pub extensions: Vec<SessionExtension>,
}

/// Response for POST /rooms/{id}/extend.
#[derive(Debug, Serialize)]
pub struct ExtendResponse {
    pub session: CallSession,
    pub extension: SessionExtension,
}

/// Response for POST /rooms/{id}/end.
#[derive(Debug, Serialize)]
pub struct EndResponse {
    pub room_id: DbId,
    /// False when the room had already been removed by another path.
    pub terminated: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn room_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "Room", id })
}

fn not_a_member() -> AppError {
    AppError::Core(CoreError::Forbidden("Not a member of this room".into()))
}

/// Load a room the caller belongs to.
async fn find_member_room(state: &AppState, id: DbId, participant_id: DbId) -> AppResult<Room> {
    let room = RoomRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| room_not_found(id))?;
    if !room.is_member(participant_id) {
        return Err(not_a_member());
    }
    Ok(room)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/rooms/{id}
///
/// The room, its call session and the extension history. 404 once the
/// room has been removed.
pub async fn get_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let detail = RoomRepo::find_detail(&state.pool, id)
        .await?
        .ok_or_else(|| room_not_found(id))?;
    if !detail.room.is_member(auth.participant_id) {
        return Err(not_a_member());
    }
    let extensions = CallSessionRepo::list_extensions(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: RoomView { detail, extensions },
    }))
}

/// POST /api/v1/rooms/{id}/enter
///
/// Activate a pending room and start its call session. Re-entering an
/// active room only refreshes the caller's heartbeat.
pub async fn enter_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let outcome = RoomRepo::enter(
        &state.pool,
        id,
        auth.participant_id,
        &state.config.session,
        Utc::now(),
    )
    .await?;

    let (room, session, activated) = match outcome {
        EnterOutcome::Entered {
            room,
            session,
            activated,
        } => (room, session, activated),
        EnterOutcome::NotFound => return Err(room_not_found(id)),
        EnterOutcome::NotMember => return Err(not_a_member()),
    };

    if activated {
        state.event_bus.publish(
            LifecycleEvent::new(event_types::ROOM_ACTIVATED)
                .with_room(room.id)
                .with_participants(room.members())
                .with_payload(serde_json::json!({ "ends_at": session.ends_at })),
        );
        tracing::info!(
            room_id = room.id,
            participant_id = auth.participant_id,
            ends_at = %session.ends_at,
            "Room activated",
        );
    }

    Ok(Json(DataResponse {
        data: RoomDetail {
            room,
            session: Some(session),
        },
    }))
}

/// POST /api/v1/rooms/{id}/extend
///
/// Push the session deadline back by one of the permitted steps.
pub async fn extend_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ExtendSession>,
) -> AppResult<impl IntoResponse> {
    let outcome = CallSessionRepo::extend(
        &state.pool,
        id,
        auth.participant_id,
        input.increment_secs,
        &state.config.session,
        Utc::now(),
    )
    .await?;

    let (session, extension) = match outcome {
        ExtendOutcome::Extended { session, extension } => (session, extension),
        ExtendOutcome::RoomNotFound => return Err(room_not_found(id)),
        ExtendOutcome::NotMember => return Err(not_a_member()),
        ExtendOutcome::NotActive => {
            return Err(AppError::Core(CoreError::Conflict(
                "Room has no active session".into(),
            )))
        }
        ExtendOutcome::Rejected(err) => return Err(AppError::Core(err)),
    };

    state.event_bus.publish(
        LifecycleEvent::new(event_types::SESSION_EXTENDED)
            .with_room(id)
            .with_participants([auth.participant_id])
            .with_payload(serde_json::json!({
                "seconds_added": extension.seconds_added,
                "ends_at": session.ends_at,
            })),
    );

    tracing::info!(
        room_id = id,
        participant_id = auth.participant_id,
        seconds_added = extension.seconds_added,
        ends_at = %session.ends_at,
        "Session extended",
    );

    Ok(Json(DataResponse {
        data: ExtendResponse { session, extension },
    }))
}

/// POST /api/v1/rooms/{id}/end
///
/// Explicit termination. Succeeds with `terminated: false` if the room is
/// already gone; a leftover session is left for the expiry sweep.
pub async fn end_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let outcome = RoomRepo::terminate(
        &state.pool,
        id,
        EndReason::Ended,
        TerminateIf::Member(auth.participant_id),
        Utc::now(),
    )
    .await?;

    let terminated = match &outcome {
        TerminationOutcome::Terminated { room, .. } => {
            state.event_bus.publish(LifecycleEvent::room_ended(
                room.id,
                room.members(),
                EndReason::Ended.as_str(),
            ));
            tracing::info!(
                room_id = id,
                participant_id = auth.participant_id,
                "Session ended by participant",
            );
            true
        }
        TerminationOutcome::AlreadyGone { .. } => false,
        TerminationOutcome::Declined => return Err(not_a_member()),
    };

    Ok(Json(DataResponse {
        data: EndResponse {
            room_id: id,
            terminated,
        },
    }))
}

/// GET /api/v1/rooms/{id}/voice-token
///
/// Credential for the voice provider. Only issued for active rooms.
pub async fn voice_token(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let room = find_member_room(&state, id, auth.participant_id).await?;
    if room.status_id != RoomStatus::Active.id() {
        return Err(AppError::Core(CoreError::Conflict(
            "Room is not active yet".into(),
        )));
    }

    let token = state.voice.issue(room.id, auth.participant_id, Utc::now());
    tracing::debug!(room_id = room.id, participant_id = auth.participant_id, "Voice token issued");

    Ok(Json(DataResponse { data: token }))
}
