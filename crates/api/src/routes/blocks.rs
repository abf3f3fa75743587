use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::blocks;
use crate::state::AppState;

/// Routes mounted at `/blocks`.
///
/// ```text
/// GET    /              -> list_blocks
/// POST   /              -> create_block
/// DELETE /{blocked_id}  -> revoke_block
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(blocks::list_blocks).post(blocks::create_block))
        .route("/{blocked_id}", delete(blocks::revoke_block))
}
