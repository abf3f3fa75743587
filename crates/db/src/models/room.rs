//! Room models: one paired unit of exactly two participants.

use serde::Serialize;
use sqlx::FromRow;
use tandem_core::liveness::{room_expired, LivenessPolicy, RoomPhase};
use tandem_core::types::{DbId, Timestamp};

use super::call_session::CallSession;
use super::status::{RoomStatus, StatusId};

/// A row from the `rooms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Room {
    pub id: DbId,
    pub participant_a_id: DbId,
    pub participant_b_id: DbId,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub participant_a_heartbeat_at: Option<Timestamp>,
    pub participant_b_heartbeat_at: Option<Timestamp>,
}

impl Room {
    pub fn members(&self) -> [DbId; 2] {
        [self.participant_a_id, self.participant_b_id]
    }

    pub fn is_member(&self, participant_id: DbId) -> bool {
        self.members().contains(&participant_id)
    }

    /// The other member, or `None` if `participant_id` is not in the room.
    pub fn partner_of(&self, participant_id: DbId) -> Option<DbId> {
        if participant_id == self.participant_a_id {
            Some(self.participant_b_id)
        } else if participant_id == self.participant_b_id {
            Some(self.participant_a_id)
        } else {
            None
        }
    }

    pub fn heartbeats(&self) -> [Option<Timestamp>; 2] {
        [self.participant_a_heartbeat_at, self.participant_b_heartbeat_at]
    }

    /// Liveness phase for the sweep; `None` for an unknown or ended status.
    pub fn phase(&self) -> Option<RoomPhase> {
        match RoomStatus::from_id(self.status_id)? {
            RoomStatus::Pending => Some(RoomPhase::Pending),
            RoomStatus::Active => Some(RoomPhase::Active),
            RoomStatus::Ended => None,
        }
    }

    /// Whether the room counts as abandoned at `now`.
    pub fn is_abandoned(&self, now: Timestamp, policy: &LivenessPolicy) -> bool {
        self.phase().is_some_and(|phase| {
            room_expired(phase, self.created_at, self.heartbeats(), now, policy)
        })
    }
}

/// A room together with its call session, if one has started.
#[derive(Debug, Clone, Serialize)]
pub struct RoomDetail {
    pub room: Room,
    pub session: Option<CallSession>,
}

/// Why a room was torn down. Stored on the call session as `end_reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// A member asked to end the session.
    Ended,
    /// A member cancelled while placed.
    Cancelled,
    /// The session deadline passed.
    Expired,
    /// Heartbeats went stale.
    Abandoned,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::Ended => "ended",
            EndReason::Cancelled => "cancelled",
            EndReason::Expired => "expired",
            EndReason::Abandoned => "abandoned",
        }
    }
}

/// Condition re-checked on the locked rows before a room is torn down.
///
/// Callers that decided from an earlier read pass the condition they saw so
/// a concurrent extension, entry or heartbeat turns the teardown into a
/// no-op.
#[derive(Debug, Clone, Copy)]
pub enum TerminateIf {
    /// Unconditional. The caller already holds the locks it relies on.
    Always,
    /// The actor must be a member of the room. A missing room leaves any
    /// orphaned session untouched.
    Member(DbId),
    /// The bound session is still active and its deadline has passed.
    SessionDue,
    /// The room is still abandoned under the policy.
    Abandoned(LivenessPolicy),
}

/// Result of running the shared room cleanup.
#[derive(Debug)]
pub enum TerminationOutcome {
    /// The room existed and has been removed along with its members'
    /// presence pointers and queue residue.
    Terminated { room: Room, session_ended: bool },
    /// The room was already gone. `session_ended` reports whether a
    /// still-active session bound to it was closed by this call.
    AlreadyGone { session_ended: bool },
    /// The condition no longer held under lock. Nothing was changed.
    Declined,
}

impl TerminationOutcome {
    pub fn terminated_room(&self) -> Option<&Room> {
        match self {
            TerminationOutcome::Terminated { room, .. } => Some(room),
            TerminationOutcome::AlreadyGone { .. } | TerminationOutcome::Declined => None,
        }
    }
}

/// Result of an `enter room` request.
#[derive(Debug)]
pub enum EnterOutcome {
    Entered {
        room: Room,
        session: CallSession,
        /// True if this call moved the room from pending to active.
        activated: bool,
    },
    NotFound,
    NotMember,
}
