//! The Pairing Transaction.
//!
//! Turns two compatible, mutually unblocked queue entries into one pending
//! room. Everything between claiming the rows and deleting the entries runs
//! in one transaction, so an attempt either produces a room with both
//! presence pointers set and both entries gone, or changes nothing (apart
//! from flagging malformed entries it encountered).

use sqlx::{PgConnection, PgPool};
use tandem_core::matching::{first_eligible, BlockSet, Candidate, DEFAULT_CANDIDATE_POOL_SIZE, WANT_ANY};
use tandem_core::types::{DbId, Timestamp};

use crate::models::queue_entry::QueueEntry;
use crate::models::room::Room;
use crate::models::status::QueueEntryStatus;
use crate::repositories::{BlockRepo, ParticipantRepo, QueueRepo, RoomRepo};
use crate::retry::should_retry;

/// Default number of oldest waiting entries tried as seeker per attempt.
pub const DEFAULT_SEEKER_WINDOW: i64 = 5;

/// Tuning knobs for one pairing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingOptions {
    /// Upper bound on compatible entries read as candidate pool.
    pub pool_size: i64,
    /// How many of the oldest waiting entries are tried as seeker, in FIFO
    /// order, before the attempt gives up. `1` tries only the head of the
    /// queue.
    pub seeker_window: i64,
}

impl Default for PairingOptions {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_CANDIDATE_POOL_SIZE,
            seeker_window: DEFAULT_SEEKER_WINDOW,
        }
    }
}

/// Result of one pairing attempt. None of these are errors.
#[derive(Debug)]
pub enum PairingOutcome {
    /// A room was created for two entries.
    Paired(Room),
    /// Seekers were examined but none could be paired yet.
    NoMatch {
        examined: usize,
        flagged_malformed: Vec<DbId>,
    },
    /// No unplaced entry is waiting.
    QueueEmpty,
}

/// Qualified column list; the seeker query joins `participants`.
const Q_COLUMNS: &str = "\
    q.participant_id, q.status_id, q.gender, q.want_gender, q.exclusions, \
    q.enqueued_at, q.last_heartbeat_at";

/// Runs the Pairing Transaction.
pub struct PairingRepo;

impl PairingRepo {
    /// Attempt to create one room from the queue.
    ///
    /// Conflict aborts are re-executed from the top; the caller only sees
    /// the final outcome.
    pub async fn pair_next(
        pool: &PgPool,
        opts: &PairingOptions,
        now: Timestamp,
    ) -> Result<PairingOutcome, sqlx::Error> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::try_pair_next(pool, opts, now).await {
                Err(e) if should_retry(&e, attempt, "pair_next") => continue,
                other => return other,
            }
        }
    }

    /// Run the pairing transaction until it stops producing rooms, at most
    /// `max_rooms` times. Returns the rooms created.
    pub async fn drain(
        pool: &PgPool,
        opts: &PairingOptions,
        max_rooms: usize,
        now: Timestamp,
    ) -> Result<Vec<Room>, sqlx::Error> {
        let mut rooms = Vec::new();
        while rooms.len() < max_rooms {
            match Self::pair_next(pool, opts, now).await? {
                PairingOutcome::Paired(room) => rooms.push(room),
                PairingOutcome::NoMatch { .. } | PairingOutcome::QueueEmpty => break,
            }
        }
        Ok(rooms)
    }

    async fn try_pair_next(
        pool: &PgPool,
        opts: &PairingOptions,
        now: Timestamp,
    ) -> Result<PairingOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let seekers = Self::claim_seekers_in(&mut tx, opts.seeker_window.max(1)).await?;
        if seekers.is_empty() {
            tx.rollback().await?;
            return Ok(PairingOutcome::QueueEmpty);
        }

        let mut flagged_malformed = Vec::new();
        let mut examined = 0;

        for entry in &seekers {
            examined += 1;

            let Some(seeker) = entry.as_candidate() else {
                QueueRepo::mark_error_in(&mut tx, entry.participant_id).await?;
                tracing::warn!(
                    participant_id = entry.participant_id,
                    "Queue entry missing preferences, flagged as error",
                );
                flagged_malformed.push(entry.participant_id);
                continue;
            };

            // Entries flagged earlier in this attempt are excluded by status.
            let pool_entries = Self::candidate_pool_in(&mut tx, &seeker, opts.pool_size).await?;
            let candidates: Vec<Candidate<'_>> =
                pool_entries.iter().filter_map(QueueEntry::as_candidate).collect();
            if candidates.is_empty() {
                continue;
            }

            let pool_ids: Vec<DbId> = candidates.iter().map(|c| c.participant_id).collect();
            let blocks = BlockSet::from_directed(
                BlockRepo::active_between_in(&mut tx, seeker.participant_id, &pool_ids).await?,
            );

            let Some(partner) = first_eligible(&seeker, &candidates, &blocks) else {
                continue;
            };
            let members = [seeker.participant_id, partner.participant_id];

            // Re-check placement under the participant row locks.
            let pointers = ParticipantRepo::lock_pointers_in(&mut tx, &members).await?;
            if pointers.len() != 2 || pointers.iter().any(|(_, room)| room.is_some()) {
                tracing::debug!(
                    seeker_id = seeker.participant_id,
                    partner_id = partner.participant_id,
                    "Pairing skipped, a member is already placed",
                );
                continue;
            }

            let room = Self::place_pair_in(&mut tx, members, now).await?;
            tx.commit().await?;

            tracing::info!(
                room_id = room.id,
                participant_a_id = room.participant_a_id,
                participant_b_id = room.participant_b_id,
                "Room created",
            );
            return Ok(PairingOutcome::Paired(room));
        }

        // Keep any error flags written above.
        tx.commit().await?;
        Ok(PairingOutcome::NoMatch {
            examined,
            flagged_malformed,
        })
    }

    /// Lock the oldest waiting entries whose participant is not placed.
    async fn claim_seekers_in(
        conn: &mut PgConnection,
        limit: i64,
    ) -> Result<Vec<QueueEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {Q_COLUMNS} \
             FROM queue_entries q \
             JOIN participants p ON p.id = q.participant_id \
             WHERE q.status_id = $1 AND p.active_room_id IS NULL \
             ORDER BY q.enqueued_at ASC, q.participant_id ASC \
             LIMIT $2 \
             FOR UPDATE OF q SKIP LOCKED"
        );
        sqlx::query_as::<_, QueueEntry>(&query)
            .bind(QueueEntryStatus::Waiting.id())
            .bind(limit)
            .fetch_all(conn)
            .await
    }

    /// Read up to `limit` gender-compatible waiting entries, oldest first.
    ///
    /// Exclusions and blocks are applied afterwards, so a pool that is all
    /// excluded yields no match rather than a wider search.
    async fn candidate_pool_in(
        conn: &mut PgConnection,
        seeker: &Candidate<'_>,
        limit: i64,
    ) -> Result<Vec<QueueEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {Q_COLUMNS} \
             FROM queue_entries q \
             JOIN participants p ON p.id = q.participant_id \
             WHERE q.status_id = $1 \
               AND q.participant_id <> $2 \
               AND p.active_room_id IS NULL \
               AND q.gender IS NOT NULL AND q.want_gender IS NOT NULL \
               AND ($3 = $5 OR q.gender = $3) \
               AND (q.want_gender = $5 OR q.want_gender = $4) \
             ORDER BY q.enqueued_at ASC, q.participant_id ASC \
             LIMIT $6 \
             FOR UPDATE OF q SKIP LOCKED"
        );
        sqlx::query_as::<_, QueueEntry>(&query)
            .bind(QueueEntryStatus::Waiting.id())
            .bind(seeker.participant_id)
            .bind(seeker.want_gender)
            .bind(seeker.gender)
            .bind(WANT_ANY)
            .bind(limit)
            .fetch_all(conn)
            .await
    }

    /// Flip both entries to `locking`, create the room, point both members
    /// at it and remove the entries.
    async fn place_pair_in(
        conn: &mut PgConnection,
        members: [DbId; 2],
        now: Timestamp,
    ) -> Result<Room, sqlx::Error> {
        sqlx::query("UPDATE queue_entries SET status_id = $1 WHERE participant_id = ANY($2)")
            .bind(QueueEntryStatus::Locking.id())
            .bind(&members[..])
            .execute(&mut *conn)
            .await?;

        let room = RoomRepo::create_in(&mut *conn, members[0], members[1], now).await?;
        ParticipantRepo::place_in(&mut *conn, &members, room.id).await?;
        QueueRepo::delete_in(&mut *conn, &members).await?;
        Ok(room)
    }
}
