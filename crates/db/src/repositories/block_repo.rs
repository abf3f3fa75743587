//! Repository for the `blocks` table.

use sqlx::{PgConnection, PgPool};
use tandem_core::types::{DbId, Timestamp};

use crate::models::block::Block;

/// Column list for `blocks` queries.
const COLUMNS: &str = "id, blocker_id, blocked_id, is_active, created_at, revoked_at";

/// Provides block registry operations.
pub struct BlockRepo;

impl BlockRepo {
    /// Record that `blocker_id` blocks `blocked_id`.
    ///
    /// Re-blocking after a revoke reactivates the existing row.
    pub async fn create(
        pool: &PgPool,
        blocker_id: DbId,
        blocked_id: DbId,
        now: Timestamp,
    ) -> Result<Block, sqlx::Error> {
        let query = format!(
            "INSERT INTO blocks (blocker_id, blocked_id, is_active, created_at) \
             VALUES ($1, $2, true, $3) \
             ON CONFLICT ON CONSTRAINT uq_blocks_pair DO UPDATE SET \
                 is_active = true, \
                 revoked_at = NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Block>(&query)
            .bind(blocker_id)
            .bind(blocked_id)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Revoke an active block. Returns `true` if one was revoked.
    pub async fn revoke(
        pool: &PgPool,
        blocker_id: DbId,
        blocked_id: DbId,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE blocks SET is_active = false, revoked_at = $3 \
             WHERE blocker_id = $1 AND blocked_id = $2 AND is_active",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active blocks created by a participant, newest first.
    pub async fn list_by_blocker(
        pool: &PgPool,
        blocker_id: DbId,
    ) -> Result<Vec<Block>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM blocks \
             WHERE blocker_id = $1 AND is_active \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Block>(&query)
            .bind(blocker_id)
            .fetch_all(pool)
            .await
    }

    /// Active `(blocker, blocked)` pairs between `participant_id` and any of
    /// `others`, in either direction.
    pub async fn active_between_in(
        conn: &mut PgConnection,
        participant_id: DbId,
        others: &[DbId],
    ) -> Result<Vec<(DbId, DbId)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT blocker_id, blocked_id FROM blocks \
             WHERE is_active \
               AND ((blocker_id = $1 AND blocked_id = ANY($2)) \
                 OR (blocked_id = $1 AND blocker_id = ANY($2)))",
        )
        .bind(participant_id)
        .bind(others)
        .fetch_all(conn)
        .await
    }
}
