//! Stale-room sweep.
//!
//! Terminates rooms whose members stopped sending heartbeats, then heals
//! presence pointers that reference rooms which no longer exist.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tandem_core::liveness::LivenessPolicy;
use tandem_core::types::Timestamp;
use tandem_db::models::room::{EndReason, TerminateIf, TerminationOutcome};
use tandem_db::repositories::{ParticipantRepo, RoomRepo};
use tandem_events::{EventBus, LifecycleEvent};
use tokio_util::sync::CancellationToken;

use crate::config::JobConfig;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StaleRoomReport {
    /// Rooms torn down by this pass.
    pub terminated: usize,
    /// Participants whose dangling pointer was cleared.
    pub healed: usize,
}

/// One sweep pass at `now`.
///
/// A failure on one room is logged and the pass moves on to the next.
pub async fn run_once(
    pool: &PgPool,
    bus: &EventBus,
    policy: &LivenessPolicy,
    now: Timestamp,
) -> Result<StaleRoomReport, sqlx::Error> {
    let mut report = StaleRoomReport::default();

    for room in RoomRepo::list_all(pool).await? {
        let Some(phase) = room.phase() else {
            continue;
        };
        if !room.is_abandoned(now, policy) {
            continue;
        }

        let outcome = RoomRepo::terminate(
            pool,
            room.id,
            EndReason::Abandoned,
            TerminateIf::Abandoned(*policy),
            now,
        )
        .await;
        match outcome {
            Ok(TerminationOutcome::Terminated { room, .. }) => {
                tracing::info!(room_id = room.id, ?phase, "Stale room terminated");
                bus.publish(LifecycleEvent::room_ended(
                    room.id,
                    room.members(),
                    EndReason::Abandoned.as_str(),
                ));
                report.terminated += 1;
            }
            Ok(TerminationOutcome::AlreadyGone { .. } | TerminationOutcome::Declined) => {}
            Err(e) => {
                tracing::error!(room_id = room.id, error = %e, "Stale room termination failed");
            }
        }
    }

    let healed = ParticipantRepo::heal_dangling_pointers(pool).await?;
    if !healed.is_empty() {
        tracing::info!(participant_ids = ?healed, "Healed dangling presence pointers");
    }
    report.healed = healed.len();

    Ok(report)
}

/// Run the stale-room sweep until `cancel` is triggered.
pub async fn run(pool: PgPool, bus: Arc<EventBus>, config: JobConfig, cancel: CancellationToken) {
    let policy = config.liveness;
    super::every("stale_rooms", config.sweep_interval, cancel, || {
        let pool = &pool;
        let bus = &bus;
        async move {
            match run_once(pool, bus, &policy, Utc::now()).await {
                Ok(report) if report != StaleRoomReport::default() => {
                    tracing::info!(
                        terminated = report.terminated,
                        healed = report.healed,
                        "Stale-room sweep pass complete"
                    );
                }
                Ok(_) => tracing::debug!("Stale-room sweep: nothing to do"),
                Err(e) => tracing::error!(error = %e, "Stale-room sweep failed"),
            }
        }
    })
    .await;
}
