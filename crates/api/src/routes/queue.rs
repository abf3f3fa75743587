//! Route definitions for queue admission.

use axum::routing::post;
use axum::Router;

use crate::handlers::queue;
use crate::state::AppState;

/// Routes mounted at `/queue`.
///
/// ```text
/// POST   /  -> enqueue
/// DELETE /  -> cancel
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(queue::enqueue).delete(queue::cancel))
}
