//! Timed call sessions and their append-only extension history.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tandem_core::error::CoreError;
use tandem_core::types::{DbId, Timestamp};

use super::status::{CallSessionStatus, StatusId};

/// A row from the `call_sessions` table, keyed by its room's id.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CallSession {
    pub room_id: DbId,
    pub status_id: StatusId,
    pub started_at: Timestamp,
    pub ends_at: Timestamp,
    pub max_minutes_cap: i32,
    pub ended_at: Option<Timestamp>,
    pub end_reason: Option<String>,
}

impl CallSession {
    /// Active with a deadline at or before `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status_id == CallSessionStatus::Active.id() && self.ends_at <= now
    }
}

/// A row from the `session_extensions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionExtension {
    pub id: DbId,
    pub room_id: DbId,
    pub actor_id: DbId,
    pub seconds_added: i32,
    pub ends_at_after: Timestamp,
    pub created_at: Timestamp,
}

/// DTO for `POST /api/v1/rooms/{id}/extend`.
#[derive(Debug, Deserialize)]
pub struct ExtendSession {
    pub increment_secs: i64,
}

/// Result of an extension request.
#[derive(Debug)]
pub enum ExtendOutcome {
    Extended {
        session: CallSession,
        extension: SessionExtension,
    },
    RoomNotFound,
    NotMember,
    /// The room is still pending or its session has already ended.
    NotActive,
    /// The request broke the session policy.
    Rejected(CoreError),
}
