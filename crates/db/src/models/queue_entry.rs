//! Queue entry models: one row per participant waiting to be paired.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tandem_core::matching::Candidate;
use tandem_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `queue_entries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueEntry {
    pub participant_id: DbId,
    pub status_id: StatusId,
    pub gender: Option<String>,
    pub want_gender: Option<String>,
    pub exclusions: Vec<DbId>,
    pub enqueued_at: Timestamp,
    pub last_heartbeat_at: Timestamp,
}

impl QueueEntry {
    /// View this entry through the pairing rules.
    ///
    /// `None` means the entry is malformed and must not be paired.
    pub fn as_candidate(&self) -> Option<Candidate<'_>> {
        Candidate::from_parts(
            self.participant_id,
            self.gender.as_deref(),
            self.want_gender.as_deref(),
            &self.exclusions,
        )
    }
}

/// DTO for `POST /api/v1/queue`.
#[derive(Debug, Clone, Deserialize)]
pub struct Enqueue {
    pub gender: String,
    pub want_gender: String,
    #[serde(default)]
    pub exclusions: Vec<DbId>,
}

/// Result of an enqueue attempt.
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// The entry was created or refreshed and is `waiting`.
    Queued(QueueEntry),
    /// The participant is already placed in a room; nothing was written.
    AlreadyPlaced { room_id: DbId },
}

/// Result of a cancel request. Both fields false means there was nothing
/// to undo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CancelOutcome {
    pub dequeued: bool,
    pub terminated_room_id: Option<DbId>,
    /// The other member of the terminated room.
    pub partner_id: Option<DbId>,
}
