//! Caller presence lookup, used by clients recovering after a reconnect.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tandem_core::types::DbId;
use tandem_db::models::queue_entry::QueueEntry;
use tandem_db::models::status::MatchPhase;
use tandem_db::repositories::{ParticipantRepo, QueueRepo};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response for GET /me/presence.
#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub participant_id: DbId,
    pub active_room_id: Option<DbId>,
    /// `"idle"` or `"matched"`.
    pub match_phase: &'static str,
    pub queue_entry: Option<QueueEntry>,
}

/// GET /api/v1/me/presence
pub async fn get_presence(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let participant = ParticipantRepo::find_by_id(&state.pool, auth.participant_id).await?;
    let queue_entry = QueueRepo::find(&state.pool, auth.participant_id).await?;

    let (active_room_id, phase) = match participant {
        Some(p) => (
            p.active_room_id,
            MatchPhase::from_id(p.match_phase_id).unwrap_or(MatchPhase::Idle),
        ),
        None => (None, MatchPhase::Idle),
    };

    Ok(Json(DataResponse {
        data: PresenceResponse {
            participant_id: auth.participant_id,
            active_room_id,
            match_phase: phase.label(),
            queue_entry,
        },
    }))
}
