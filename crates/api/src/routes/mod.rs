pub mod admin;
pub mod blocks;
pub mod health;
pub mod me;
pub mod queue;
pub mod rooms;

use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /queue                          enqueue (POST), cancel (DELETE)
/// /heartbeat                      refresh room or queue liveness (POST)
///
/// /rooms/{id}                     get room and session
/// /rooms/{id}/enter               activate / re-enter (POST)
/// /rooms/{id}/extend              extend session (POST)
/// /rooms/{id}/end                 end session (POST)
/// /rooms/{id}/voice-token         voice credential (GET)
///
/// /blocks                         list, create
/// /blocks/{blocked_id}            revoke (DELETE)
///
/// /me/presence                    caller presence (GET)
///
/// /admin/match/drain              forced pairing drain (POST, admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/queue", queue::router())
        .route("/heartbeat", post(handlers::queue::heartbeat))
        .nest("/rooms", rooms::router())
        .nest("/blocks", blocks::router())
        .nest("/me", me::router())
        .nest("/admin", admin::router())
}
