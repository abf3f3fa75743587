//! Repository for the `participants` table (presence pointers).

use sqlx::{PgConnection, PgPool};
use tandem_core::types::DbId;

use crate::models::participant::Participant;
use crate::models::status::MatchPhase;

/// Column list for participant queries.
const COLUMNS: &str = "id, active_room_id, match_phase_id, created_at, updated_at";

/// Provides presence operations for participants.
pub struct ParticipantRepo;

impl ParticipantRepo {
    /// Make sure a presence row exists for an identity issued elsewhere.
    ///
    /// Existing rows are left untouched.
    pub async fn ensure(pool: &PgPool, id: DbId) -> Result<Participant, sqlx::Error> {
        sqlx::query("INSERT INTO participants (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .execute(pool)
            .await?;
        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Find a participant by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Participant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM participants WHERE id = $1");
        sqlx::query_as::<_, Participant>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock a participant row for the rest of the transaction.
    pub async fn lock_in(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Participant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM participants WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Participant>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Lock several participant rows in ascending id order and return their
    /// current room pointers.
    pub async fn lock_pointers_in(
        conn: &mut PgConnection,
        ids: &[DbId],
    ) -> Result<Vec<(DbId, Option<DbId>)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, active_room_id FROM participants
             WHERE id = ANY($1)
             ORDER BY id
             FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(conn)
        .await
    }

    /// Point both members at their new room and mark them matched.
    pub async fn place_in(
        conn: &mut PgConnection,
        ids: &[DbId],
        room_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE participants SET active_room_id = $1, match_phase_id = $2 WHERE id = ANY($3)",
        )
        .bind(room_id)
        .bind(MatchPhase::Matched.id())
        .bind(ids)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Reset members of `room_id` to idle.
    ///
    /// Only pointers that still reference `room_id` are cleared, so a late
    /// cleanup never undoes a newer placement.
    pub async fn release_in(
        conn: &mut PgConnection,
        ids: &[DbId],
        room_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE participants SET active_room_id = NULL, match_phase_id = $1
             WHERE id = ANY($2) AND active_room_id = $3",
        )
        .bind(MatchPhase::Idle.id())
        .bind(ids)
        .bind(room_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Heal participants whose room pointer references a room that no
    /// longer exists. Returns the healed participant ids.
    pub async fn heal_dangling_pointers(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "UPDATE participants p
             SET active_room_id = NULL, match_phase_id = $1
             WHERE p.active_room_id IS NOT NULL
               AND NOT EXISTS (SELECT 1 FROM rooms r WHERE r.id = p.active_room_id)
             RETURNING p.id",
        )
        .bind(MatchPhase::Idle.id())
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
