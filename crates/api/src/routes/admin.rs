//! Admin-only operational routes. Handlers enforce the role via `RequireAdmin`.

use axum::routing::post;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// POST /match/drain -> force_match
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/match/drain", post(admin::force_match))
}
