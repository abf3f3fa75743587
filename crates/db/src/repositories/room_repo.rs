//! Repository for the `rooms` table and the room lifecycle transitions.
//!
//! `terminate_in` is the single cleanup path shared by explicit end,
//! cancellation, natural expiry and the sweeps. It is idempotent: running it
//! twice, or concurrently from two callers, leaves the same terminal state.
//! Each caller's [`TerminateIf`] is evaluated against the locked rows, so a
//! decision taken from an older read never overrides a newer write.

use sqlx::{PgConnection, PgPool};
use tandem_core::session::SessionPolicy;
use tandem_core::types::{DbId, Timestamp};

use crate::models::room::{
    EndReason, EnterOutcome, Room, RoomDetail, TerminateIf, TerminationOutcome,
};
use crate::models::status::RoomStatus;
use crate::repositories::{CallSessionRepo, ParticipantRepo, QueueRepo};
use crate::retry::should_retry;

/// Column list for `rooms` queries.
pub(crate) const COLUMNS: &str = "\
    id, participant_a_id, participant_b_id, status_id, created_at, \
    participant_a_heartbeat_at, participant_b_heartbeat_at";

/// Provides room lookups and lifecycle transitions.
pub struct RoomRepo;

impl RoomRepo {
    /// Insert a pending room for two participants.
    ///
    /// Only called from inside the pairing transaction.
    pub async fn create_in(
        conn: &mut PgConnection,
        participant_a_id: DbId,
        participant_b_id: DbId,
        now: Timestamp,
    ) -> Result<Room, sqlx::Error> {
        let query = format!(
            "INSERT INTO rooms (participant_a_id, participant_b_id, status_id, created_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Room>(&query)
            .bind(participant_a_id)
            .bind(participant_b_id)
            .bind(RoomStatus::Pending.id())
            .bind(now)
            .fetch_one(conn)
            .await
    }

    /// Find a room by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Room>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rooms WHERE id = $1");
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a room together with its call session.
    pub async fn find_detail(pool: &PgPool, id: DbId) -> Result<Option<RoomDetail>, sqlx::Error> {
        let Some(room) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let session = CallSessionRepo::find(pool, id).await?;
        Ok(Some(RoomDetail { room, session }))
    }

    /// List every room, oldest first. Used by the stale-room sweep.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Room>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rooms ORDER BY created_at ASC");
        sqlx::query_as::<_, Room>(&query).fetch_all(pool).await
    }

    async fn lock_in(conn: &mut PgConnection, id: DbId) -> Result<Option<Room>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rooms WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Room>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// A member enters the room.
    ///
    /// Activates a pending room, records the member's heartbeat and creates
    /// the call session on first entry. Entering an already active room only
    /// refreshes the heartbeat.
    pub async fn enter(
        pool: &PgPool,
        room_id: DbId,
        participant_id: DbId,
        policy: &SessionPolicy,
        now: Timestamp,
    ) -> Result<EnterOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(room) = Self::lock_in(&mut tx, room_id).await? else {
            return Ok(EnterOutcome::NotFound);
        };
        if !room.is_member(participant_id) {
            return Ok(EnterOutcome::NotMember);
        }
        let activated = room.status_id == RoomStatus::Pending.id();

        let query = format!(
            "UPDATE rooms SET \
                 status_id = $3, \
                 participant_a_heartbeat_at = CASE WHEN participant_a_id = $2 \
                     THEN $4 ELSE participant_a_heartbeat_at END, \
                 participant_b_heartbeat_at = CASE WHEN participant_b_id = $2 \
                     THEN $4 ELSE participant_b_heartbeat_at END \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let room = sqlx::query_as::<_, Room>(&query)
            .bind(room_id)
            .bind(participant_id)
            .bind(RoomStatus::Active.id())
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let session = CallSessionRepo::start_in(&mut tx, room_id, policy, now).await?;

        tx.commit().await?;
        Ok(EnterOutcome::Entered {
            room,
            session,
            activated,
        })
    }

    /// Refresh a member's heartbeat on their room.
    ///
    /// Returns `false` if the room is gone or the caller is not a member.
    pub async fn touch_heartbeat(
        pool: &PgPool,
        room_id: DbId,
        participant_id: DbId,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rooms SET \
                 participant_a_heartbeat_at = CASE WHEN participant_a_id = $2 \
                     THEN $3 ELSE participant_a_heartbeat_at END, \
                 participant_b_heartbeat_at = CASE WHEN participant_b_id = $2 \
                     THEN $3 ELSE participant_b_heartbeat_at END \
             WHERE id = $1 AND (participant_a_id = $2 OR participant_b_id = $2)",
        )
        .bind(room_id)
        .bind(participant_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Tear a room down in its own transaction.
    pub async fn terminate(
        pool: &PgPool,
        room_id: DbId,
        reason: EndReason,
        guard: TerminateIf,
        now: Timestamp,
    ) -> Result<TerminationOutcome, sqlx::Error> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = async {
                let mut tx = pool.begin().await?;
                let outcome = Self::terminate_in(&mut tx, room_id, reason, guard, now).await?;
                tx.commit().await?;
                Ok::<_, sqlx::Error>(outcome)
            }
            .await;
            match result {
                Err(e) if should_retry(&e, attempt, "terminate_room") => continue,
                other => return other,
            }
        }
    }

    /// Shared cleanup, inside the caller's transaction.
    ///
    /// 0. Lock the room and re-check `guard`; return `Declined` if it no
    ///    longer holds.
    /// 1. Close the bound call session if it is still active.
    /// 2. Clear both members' presence pointers (only if they still point
    ///    here) and reset them to idle.
    /// 3. Remove any leftover queue entry of either member.
    /// 4. Delete the room, so watchers see an explicit removal.
    pub async fn terminate_in(
        conn: &mut PgConnection,
        room_id: DbId,
        reason: EndReason,
        guard: TerminateIf,
        now: Timestamp,
    ) -> Result<TerminationOutcome, sqlx::Error> {
        let room = Self::lock_in(&mut *conn, room_id).await?;

        match (guard, &room) {
            (TerminateIf::Always, _) => {}
            (TerminateIf::Member(_) | TerminateIf::Abandoned(_), None) => {
                return Ok(TerminationOutcome::AlreadyGone {
                    session_ended: false,
                });
            }
            (TerminateIf::Member(actor_id), Some(room)) => {
                if !room.is_member(actor_id) {
                    return Ok(TerminationOutcome::Declined);
                }
            }
            (TerminateIf::Abandoned(policy), Some(room)) => {
                if !room.is_abandoned(now, &policy) {
                    tracing::debug!(room_id, "Room no longer abandoned, keeping it");
                    return Ok(TerminationOutcome::Declined);
                }
            }
            (TerminateIf::SessionDue, _) => {
                let session = CallSessionRepo::lock_in(&mut *conn, room_id).await?;
                if !session.is_some_and(|s| s.is_due(now)) {
                    tracing::debug!(room_id, "Session no longer due, keeping it");
                    return Ok(TerminationOutcome::Declined);
                }
            }
        }

        let session_ended = CallSessionRepo::mark_ended_in(&mut *conn, room_id, reason, now).await?;

        let Some(room) = room else {
            return Ok(TerminationOutcome::AlreadyGone { session_ended });
        };

        let members = room.members();
        ParticipantRepo::release_in(&mut *conn, &members, room_id).await?;
        QueueRepo::delete_in(&mut *conn, &members).await?;
        sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&mut *conn)
            .await?;

        tracing::debug!(room_id, reason = reason.as_str(), "Room terminated");
        Ok(TerminationOutcome::Terminated {
            room,
            session_ended,
        })
    }
}
