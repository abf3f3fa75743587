//! Route definitions for rooms and their call sessions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::rooms;
use crate::state::AppState;

/// Routes mounted at `/rooms`.
///
/// ```text
/// GET  /{id}              -> get_room
/// POST /{id}/enter        -> enter_room
/// POST /{id}/extend       -> extend_session
/// POST /{id}/end          -> end_session
/// GET  /{id}/voice-token  -> voice_token
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(rooms::get_room))
        .route("/{id}/enter", post(rooms::enter_room))
        .route("/{id}/extend", post(rooms::extend_session))
        .route("/{id}/end", post(rooms::end_session))
        .route("/{id}/voice-token", get(rooms::voice_token))
}
