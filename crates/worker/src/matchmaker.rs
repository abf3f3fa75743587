//! Matchmaker: dispatches the Pairing Transaction.
//!
//! Woken by `queue.entry_waiting` events on the bus and, as a fallback, on
//! a fixed interval so entries whose event was missed or lagged are still
//! retried. Each wake-up drains the queue: pairing runs until an attempt
//! produces no room.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tandem_core::types::Timestamp;
use tandem_db::models::room::Room;
use tandem_db::repositories::{PairingOptions, PairingRepo};
use tandem_events::bus::{event_types, EventBus, LifecycleEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::JobConfig;

/// Upper bound on rooms created per drain, so one wake-up cannot run
/// unbounded.
pub const MAX_ROOMS_PER_DRAIN: usize = 64;

/// Run the pairing transaction until it stops producing rooms and announce
/// every room created.
pub async fn drain(
    pool: &PgPool,
    bus: &EventBus,
    opts: &PairingOptions,
    max_rooms: usize,
    now: Timestamp,
) -> Result<Vec<Room>, sqlx::Error> {
    let rooms = PairingRepo::drain(pool, opts, max_rooms, now).await?;
    for room in &rooms {
        bus.publish(room_created(room));
    }
    Ok(rooms)
}

fn room_created(room: &Room) -> LifecycleEvent {
    LifecycleEvent::new(event_types::ROOM_CREATED)
        .with_room(room.id)
        .with_participants(room.members())
}

/// Run the matchmaker loop until `cancel` is triggered.
pub async fn run(pool: PgPool, bus: Arc<EventBus>, config: JobConfig, cancel: CancellationToken) {
    tracing::info!(
        pool_size = config.pairing.pool_size,
        seeker_window = config.pairing.seeker_window,
        fallback_secs = config.match_fallback.as_secs(),
        "Matchmaker started"
    );

    let mut events = bus.subscribe();
    let mut fallback = tokio::time::interval(config.match_fallback);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Matchmaker stopping");
                break;
            }
            received = events.recv() => match received {
                Ok(event) if event.event_type == event_types::QUEUE_ENTRY_WAITING => {
                    pass(&pool, &bus, &config.pairing, "event").await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Matchmaker lagged, draining now");
                    pass(&pool, &bus, &config.pairing, "lagged").await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, matchmaker stopping");
                    break;
                }
            },
            _ = fallback.tick() => {
                pass(&pool, &bus, &config.pairing, "interval").await;
            }
        }
    }
}

async fn pass(pool: &PgPool, bus: &EventBus, opts: &PairingOptions, trigger: &'static str) {
    match drain(pool, bus, opts, MAX_ROOMS_PER_DRAIN, Utc::now()).await {
        Ok(rooms) if !rooms.is_empty() => {
            tracing::info!(trigger, rooms = rooms.len(), "Matchmaker: rooms created");
        }
        Ok(_) => {
            tracing::trace!(trigger, "Matchmaker: no match yet");
        }
        Err(e) => {
            tracing::error!(trigger, error = %e, "Matchmaker: pairing failed");
        }
    }
}
