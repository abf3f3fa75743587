use std::sync::Arc;

use tandem_events::EventBus;

use crate::config::ServerConfig;
use crate::voice::VoiceTokenIssuer;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: tandem_db::DbPool,
    /// Server configuration (JWT secret, session policy, job settings).
    pub config: Arc<ServerConfig>,
    /// Lifecycle event bus shared with the matchmaker, sweeps and relay.
    pub event_bus: Arc<EventBus>,
    /// Issues credentials for the external voice provider.
    pub voice: Arc<dyn VoiceTokenIssuer>,
}
