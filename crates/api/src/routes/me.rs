use axum::routing::get;
use axum::Router;

use crate::handlers::presence;
use crate::state::AppState;

/// Routes mounted at `/me`.
///
/// ```text
/// GET /presence -> get_presence
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/presence", get(presence::get_presence))
}
