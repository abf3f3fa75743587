//! Session-expiry sweep.
//!
//! Ends call sessions whose deadline has passed, tearing down their room
//! when it still exists. A session whose room was already removed by
//! another path is still marked ended. A session extended after the
//! listing is left alone.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tandem_core::types::Timestamp;
use tandem_db::models::room::{EndReason, TerminateIf, TerminationOutcome};
use tandem_db::repositories::{CallSessionRepo, RoomRepo};
use tandem_events::{EventBus, LifecycleEvent};
use tokio_util::sync::CancellationToken;

use crate::config::JobConfig;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionExpiryReport {
    /// Rooms torn down because their session expired.
    pub terminated: usize,
    /// Sessions closed whose room was already gone.
    pub orphans_closed: usize,
}

/// One sweep pass at `now`.
pub async fn run_once(
    pool: &PgPool,
    bus: &EventBus,
    now: Timestamp,
) -> Result<SessionExpiryReport, sqlx::Error> {
    let mut report = SessionExpiryReport::default();

    for session in CallSessionRepo::list_expired(pool, now).await? {
        let outcome = RoomRepo::terminate(
            pool,
            session.room_id,
            EndReason::Expired,
            TerminateIf::SessionDue,
            now,
        )
        .await;
        match outcome {
            Ok(TerminationOutcome::Terminated { room, .. }) => {
                tracing::info!(room_id = room.id, ends_at = %session.ends_at, "Session expired");
                bus.publish(LifecycleEvent::room_ended(
                    room.id,
                    room.members(),
                    EndReason::Expired.as_str(),
                ));
                report.terminated += 1;
            }
            Ok(TerminationOutcome::AlreadyGone { session_ended: true }) => {
                tracing::info!(room_id = session.room_id, "Orphaned session closed");
                report.orphans_closed += 1;
            }
            Ok(TerminationOutcome::AlreadyGone { session_ended: false })
            | Ok(TerminationOutcome::Declined) => {}
            Err(e) => {
                tracing::error!(room_id = session.room_id, error = %e, "Session expiry failed");
            }
        }
    }

    Ok(report)
}

/// Run the session-expiry sweep until `cancel` is triggered.
pub async fn run(pool: PgPool, bus: Arc<EventBus>, config: JobConfig, cancel: CancellationToken) {
    super::every("session_expiry", config.sweep_interval, cancel, || {
        let pool = &pool;
        let bus = &bus;
        async move {
            match run_once(pool, bus, Utc::now()).await {
                Ok(report) if report != SessionExpiryReport::default() => {
                    tracing::info!(
                        terminated = report.terminated,
                        orphans_closed = report.orphans_closed,
                        "Session-expiry sweep pass complete"
                    );
                }
                Ok(_) => tracing::debug!("Session-expiry sweep: nothing to do"),
                Err(e) => tracing::error!(error = %e, "Session-expiry sweep failed"),
            }
        }
    })
    .await;
}
