//! Directional block records.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tandem_core::types::{DbId, Timestamp};

/// A row from the `blocks` table. Revoked blocks keep their row with
/// `is_active = false`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Block {
    pub id: DbId,
    pub blocker_id: DbId,
    pub blocked_id: DbId,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

/// DTO for `POST /api/v1/blocks`.
#[derive(Debug, Deserialize)]
pub struct CreateBlock {
    pub blocked_id: DbId,
}
