//! Repository for the `queue_entries` table.
//!
//! Uses `QueueEntryStatus` from `models::status` for every status literal.

use sqlx::{PgConnection, PgPool};
use tandem_core::types::{DbId, Timestamp};

use crate::models::queue_entry::{CancelOutcome, Enqueue, EnqueueOutcome, QueueEntry};
use crate::models::room::{EndReason, TerminateIf};
use crate::models::status::QueueEntryStatus;
use crate::repositories::{ParticipantRepo, RoomRepo};
use crate::retry::should_retry;

/// Column list for `queue_entries` queries.
pub(crate) const COLUMNS: &str = "\
    participant_id, status_id, gender, want_gender, exclusions, \
    enqueued_at, last_heartbeat_at";

/// Provides queue admission and housekeeping.
pub struct QueueRepo;

impl QueueRepo {
    /// Create or refresh the caller's queue entry.
    ///
    /// A refresh overwrites preferences, resets the status to `waiting` and
    /// bumps the heartbeat, but keeps `enqueued_at` so the participant does
    /// not lose their place. Nothing is written if the participant is
    /// already placed in a room. `input` must already be validated.
    ///
    /// Locks follow the pairing order: the existing queue row first, then
    /// the participant.
    pub async fn enqueue(
        pool: &PgPool,
        participant_id: DbId,
        input: &Enqueue,
        now: Timestamp,
    ) -> Result<EnqueueOutcome, sqlx::Error> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::try_enqueue(pool, participant_id, input, now).await {
                Err(e) if should_retry(&e, attempt, "enqueue") => continue,
                other => return other,
            }
        }
    }

    async fn try_enqueue(
        pool: &PgPool,
        participant_id: DbId,
        input: &Enqueue,
        now: Timestamp,
    ) -> Result<EnqueueOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT participant_id FROM queue_entries WHERE participant_id = $1 FOR UPDATE")
            .bind(participant_id)
            .fetch_optional(&mut *tx)
            .await?;

        let participant = ParticipantRepo::lock_in(&mut tx, participant_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        if let Some(room_id) = participant.active_room_id {
            tx.rollback().await?;
            return Ok(EnqueueOutcome::AlreadyPlaced { room_id });
        }

        let query = format!(
            "INSERT INTO queue_entries \
                 (participant_id, status_id, gender, want_gender, exclusions, \
                  enqueued_at, last_heartbeat_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (participant_id) DO UPDATE SET \
                 status_id = EXCLUDED.status_id, \
                 gender = EXCLUDED.gender, \
                 want_gender = EXCLUDED.want_gender, \
                 exclusions = EXCLUDED.exclusions, \
                 last_heartbeat_at = EXCLUDED.last_heartbeat_at \
             RETURNING {COLUMNS}"
        );
        let entry = sqlx::query_as::<_, QueueEntry>(&query)
            .bind(participant_id)
            .bind(QueueEntryStatus::Waiting.id())
            .bind(&input.gender)
            .bind(&input.want_gender)
            .bind(&input.exclusions)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(EnqueueOutcome::Queued(entry))
    }

    /// Find the queue entry of a participant.
    pub async fn find(
        pool: &PgPool,
        participant_id: DbId,
    ) -> Result<Option<QueueEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM queue_entries WHERE participant_id = $1");
        sqlx::query_as::<_, QueueEntry>(&query)
            .bind(participant_id)
            .fetch_optional(pool)
            .await
    }

    /// Refresh the liveness timestamp of a queue entry.
    ///
    /// Returns `true` if the participant had an entry.
    pub async fn touch_heartbeat(
        pool: &PgPool,
        participant_id: DbId,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE queue_entries SET last_heartbeat_at = $2 WHERE participant_id = $1",
        )
        .bind(participant_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flag an entry whose preferences are incomplete so it stops being
    /// selected.
    pub async fn mark_error_in(
        conn: &mut PgConnection,
        participant_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE queue_entries SET status_id = $2 WHERE participant_id = $1")
            .bind(participant_id)
            .bind(QueueEntryStatus::Error.id())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Delete the queue entries of the given participants, if any.
    pub async fn delete_in(
        conn: &mut PgConnection,
        participant_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM queue_entries WHERE participant_id = ANY($1)")
            .bind(participant_ids)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete ghost entries whose last heartbeat is before `cutoff`.
    ///
    /// Returns the affected participant ids.
    pub async fn delete_stale(pool: &PgPool, cutoff: Timestamp) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "DELETE FROM queue_entries WHERE last_heartbeat_at < $1 RETURNING participant_id",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Withdraw a participant from pairing.
    ///
    /// Removes the caller's queue entry. If the caller has already been
    /// placed, the room is torn down with the shared cleanup so both members
    /// end up idle. Calling it again is a harmless no-op.
    pub async fn cancel(
        pool: &PgPool,
        participant_id: DbId,
        now: Timestamp,
    ) -> Result<CancelOutcome, sqlx::Error> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::try_cancel(pool, participant_id, now).await {
                Err(e) if should_retry(&e, attempt, "cancel") => continue,
                other => return other,
            }
        }
    }

    async fn try_cancel(
        pool: &PgPool,
        participant_id: DbId,
        now: Timestamp,
    ) -> Result<CancelOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let dequeued = Self::delete_in(&mut tx, &[participant_id]).await? > 0;

        let mut outcome = CancelOutcome {
            dequeued,
            terminated_room_id: None,
            partner_id: None,
        };

        let room_id = ParticipantRepo::lock_in(&mut tx, participant_id)
            .await?
            .and_then(|p| p.active_room_id);

        if let Some(room_id) = room_id {
            let terminated = RoomRepo::terminate_in(
                &mut tx,
                room_id,
                EndReason::Cancelled,
                TerminateIf::Member(participant_id),
                now,
            )
            .await?;
            if let Some(room) = terminated.terminated_room() {
                outcome.terminated_room_id = Some(room_id);
                outcome.partner_id = room.partner_of(participant_id);
            } else {
                // Room vanished under us; heal our own pointer.
                ParticipantRepo::release_in(&mut tx, &[participant_id], room_id).await?;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}
