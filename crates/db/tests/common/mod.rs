//! Shared fixtures for the repository integration tests.

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;
use tandem_core::types::{DbId, Timestamp};
use tandem_db::models::participant::Participant;
use tandem_db::models::queue_entry::{Enqueue, EnqueueOutcome, QueueEntry};
use tandem_db::models::room::Room;
use tandem_db::repositories::{PairingOptions, PairingOutcome, PairingRepo, ParticipantRepo, QueueRepo};

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

pub fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

/// Enqueue a participant, creating their presence row first.
pub async fn enqueue(
    pool: &PgPool,
    participant_id: DbId,
    gender: &str,
    want_gender: &str,
    exclusions: &[DbId],
    at: Timestamp,
) -> QueueEntry {
    ParticipantRepo::ensure(pool, participant_id).await.unwrap();
    let input = Enqueue {
        gender: gender.to_string(),
        want_gender: want_gender.to_string(),
        exclusions: exclusions.to_vec(),
    };
    match QueueRepo::enqueue(pool, participant_id, &input, at).await.unwrap() {
        EnqueueOutcome::Queued(entry) => entry,
        other => panic!("expected Queued, got {other:?}"),
    }
}

/// Enqueue two compatible participants and pair them.
pub async fn paired_room(pool: &PgPool, a: DbId, b: DbId, at: Timestamp) -> Room {
    enqueue(pool, a, "m", "any", &[], at).await;
    enqueue(pool, b, "f", "any", &[], at + secs(1)).await;
    match PairingRepo::pair_next(pool, &PairingOptions::default(), at + secs(2))
        .await
        .unwrap()
    {
        PairingOutcome::Paired(room) => room,
        other => panic!("expected Paired, got {other:?}"),
    }
}

pub async fn participant(pool: &PgPool, id: DbId) -> Participant {
    ParticipantRepo::find_by_id(pool, id)
        .await
        .unwrap()
        .expect("participant should exist")
}

pub async fn room_count(pool: &PgPool) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rooms")
        .fetch_one(pool)
        .await
        .unwrap();
    count
}
