//! Participant presence: the subset of the profile record this service owns.

use serde::Serialize;
use sqlx::FromRow;
use tandem_core::types::{DbId, Timestamp};

use super::status::{MatchPhase, StatusId};

/// A row from the `participants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Participant {
    pub id: DbId,
    /// Non-null exactly while the participant belongs to a live room.
    pub active_room_id: Option<DbId>,
    pub match_phase_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Participant {
    pub fn is_idle(&self) -> bool {
        self.active_room_id.is_none() && self.match_phase_id == MatchPhase::Idle.id()
    }
}
