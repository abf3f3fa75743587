//! Handlers for the caller's block registry.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use tandem_core::error::CoreError;
use tandem_core::types::DbId;
use tandem_db::models::block::CreateBlock;
use tandem_db::repositories::{BlockRepo, ParticipantRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/blocks
///
/// Block another participant. Re-blocking reactivates a revoked record.
pub async fn create_block(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateBlock>,
) -> AppResult<impl IntoResponse> {
    if input.blocked_id == auth.participant_id {
        return Err(AppError::Core(CoreError::Validation(
            "Cannot block yourself".into(),
        )));
    }

    ParticipantRepo::ensure(&state.pool, auth.participant_id).await?;
    ParticipantRepo::ensure(&state.pool, input.blocked_id).await?;

    let block = BlockRepo::create(&state.pool, auth.participant_id, input.blocked_id, Utc::now())
        .await?;

    tracing::info!(
        blocker_id = auth.participant_id,
        blocked_id = input.blocked_id,
        "Participant blocked",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: block })))
}

/// DELETE /api/v1/blocks/{blocked_id}
pub async fn revoke_block(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(blocked_id): Path<DbId>,
) -> AppResult<StatusCode> {
    let revoked = BlockRepo::revoke(&state.pool, auth.participant_id, blocked_id, Utc::now())
        .await?;
    if !revoked {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Block",
            id: blocked_id,
        }));
    }

    tracing::info!(
        blocker_id = auth.participant_id,
        blocked_id,
        "Block revoked",
    );

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/blocks
pub async fn list_blocks(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let blocks = BlockRepo::list_by_blocker(&state.pool, auth.participant_id).await?;
    Ok(Json(DataResponse { data: blocks }))
}
