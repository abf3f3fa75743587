//! Repository for `call_sessions` and `session_extensions`.

use sqlx::{PgConnection, PgPool};
use tandem_core::session::{extend_deadline, SessionPolicy};
use tandem_core::types::{DbId, Timestamp};

use crate::models::call_session::{CallSession, ExtendOutcome, SessionExtension};
use crate::models::room::{EndReason, Room};
use crate::models::status::{CallSessionStatus, RoomStatus};
use crate::repositories::room_repo::COLUMNS as ROOM_COLUMNS;

/// Column list for `call_sessions` queries.
const COLUMNS: &str = "\
    room_id, status_id, started_at, ends_at, max_minutes_cap, ended_at, end_reason";

/// Column list for `session_extensions` queries.
const EXTENSION_COLUMNS: &str = "\
    id, room_id, actor_id, seconds_added, ends_at_after, created_at";

/// Provides timed-session operations.
pub struct CallSessionRepo;

impl CallSessionRepo {
    /// Create the session for a room if it does not exist yet, and return it.
    pub async fn start_in(
        conn: &mut PgConnection,
        room_id: DbId,
        policy: &SessionPolicy,
        now: Timestamp,
    ) -> Result<CallSession, sqlx::Error> {
        sqlx::query(
            "INSERT INTO call_sessions (room_id, status_id, started_at, ends_at, max_minutes_cap) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (room_id) DO NOTHING",
        )
        .bind(room_id)
        .bind(CallSessionStatus::Active.id())
        .bind(now)
        .bind(policy.initial_deadline(now))
        .bind(policy.max_minutes_cap)
        .execute(&mut *conn)
        .await?;

        let query = format!("SELECT {COLUMNS} FROM call_sessions WHERE room_id = $1");
        sqlx::query_as::<_, CallSession>(&query)
            .bind(room_id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Find the session bound to a room.
    pub async fn find(pool: &PgPool, room_id: DbId) -> Result<Option<CallSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM call_sessions WHERE room_id = $1");
        sqlx::query_as::<_, CallSession>(&query)
            .bind(room_id)
            .fetch_optional(pool)
            .await
    }

    /// Lock the session row of a room. Callers lock the room first.
    pub(crate) async fn lock_in(
        conn: &mut PgConnection,
        room_id: DbId,
    ) -> Result<Option<CallSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM call_sessions WHERE room_id = $1 FOR UPDATE");
        sqlx::query_as::<_, CallSession>(&query)
            .bind(room_id)
            .fetch_optional(conn)
            .await
    }

    /// Active sessions whose deadline has passed.
    pub async fn list_expired(
        pool: &PgPool,
        now: Timestamp,
    ) -> Result<Vec<CallSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM call_sessions \
             WHERE status_id = $1 AND ends_at <= $2 \
             ORDER BY ends_at ASC"
        );
        sqlx::query_as::<_, CallSession>(&query)
            .bind(CallSessionStatus::Active.id())
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Mark a session ended if it is still active.
    ///
    /// Returns `true` if this call performed the transition.
    pub async fn mark_ended_in(
        conn: &mut PgConnection,
        room_id: DbId,
        reason: EndReason,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE call_sessions SET status_id = $2, ended_at = $3, end_reason = $4 \
             WHERE room_id = $1 AND status_id = $5",
        )
        .bind(room_id)
        .bind(CallSessionStatus::Ended.id())
        .bind(now)
        .bind(reason.as_str())
        .bind(CallSessionStatus::Active.id())
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Extend an active session by one of the permitted steps.
    ///
    /// Runs in a transaction holding the session row lock, so concurrent
    /// extensions serialize and each one builds on the previous deadline.
    /// Every accepted extension appends one history row.
    pub async fn extend(
        pool: &PgPool,
        room_id: DbId,
        actor_id: DbId,
        increment_secs: i64,
        policy: &SessionPolicy,
        now: Timestamp,
    ) -> Result<ExtendOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let room_query = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 FOR SHARE");
        let Some(room) = sqlx::query_as::<_, Room>(&room_query)
            .bind(room_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(ExtendOutcome::RoomNotFound);
        };
        if !room.is_member(actor_id) {
            return Ok(ExtendOutcome::NotMember);
        }
        if room.status_id != RoomStatus::Active.id() {
            return Ok(ExtendOutcome::NotActive);
        }

        let Some(session) = Self::lock_in(&mut tx, room_id).await? else {
            return Ok(ExtendOutcome::NotActive);
        };
        if session.status_id != CallSessionStatus::Active.id() {
            return Ok(ExtendOutcome::NotActive);
        }

        let new_ends_at = match extend_deadline(
            policy,
            session.started_at,
            session.ends_at,
            session.max_minutes_cap,
            now,
            increment_secs,
        ) {
            Ok(ends_at) => ends_at,
            Err(err) => return Ok(ExtendOutcome::Rejected(err)),
        };

        let query = format!(
            "UPDATE call_sessions SET ends_at = $2 WHERE room_id = $1 RETURNING {COLUMNS}"
        );
        let session = sqlx::query_as::<_, CallSession>(&query)
            .bind(room_id)
            .bind(new_ends_at)
            .fetch_one(&mut *tx)
            .await?;

        // Steps are validated against the policy, which keeps them small.
        let seconds_added = i32::try_from(increment_secs).unwrap_or(i32::MAX);
        let query = format!(
            "INSERT INTO session_extensions (room_id, actor_id, seconds_added, ends_at_after, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {EXTENSION_COLUMNS}"
        );
        let extension = sqlx::query_as::<_, SessionExtension>(&query)
            .bind(room_id)
            .bind(actor_id)
            .bind(seconds_added)
            .bind(new_ends_at)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ExtendOutcome::Extended { session, extension })
    }

    /// Extension history of a session, oldest first.
    pub async fn list_extensions(
        pool: &PgPool,
        room_id: DbId,
    ) -> Result<Vec<SessionExtension>, sqlx::Error> {
        let query = format!(
            "SELECT {EXTENSION_COLUMNS} FROM session_extensions \
             WHERE room_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, SessionExtension>(&query)
            .bind(room_id)
            .fetch_all(pool)
            .await
    }
}
