//! Operational endpoints (admin role).

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tandem_core::types::DbId;
use tandem_worker::matchmaker::{self, MAX_ROOMS_PER_DRAIN};

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response for POST /admin/match/drain.
#[derive(Debug, Serialize)]
pub struct DrainResponse {
    pub rooms_created: usize,
    pub room_ids: Vec<DbId>,
}

/// POST /api/v1/admin/match/drain
///
/// Run the pairing transaction out-of-band until it stops producing rooms.
pub async fn force_match(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let rooms = matchmaker::drain(
        &state.pool,
        &state.event_bus,
        &state.config.jobs.pairing,
        MAX_ROOMS_PER_DRAIN,
        Utc::now(),
    )
    .await?;

    tracing::info!(
        admin_id = admin.participant_id,
        rooms_created = rooms.len(),
        "Forced match drain",
    );

    Ok(Json(DataResponse {
        data: DrainResponse {
            rooms_created: rooms.len(),
            room_ids: rooms.iter().map(|r| r.id).collect(),
        },
    }))
}
