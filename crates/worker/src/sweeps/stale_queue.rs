//! Stale-queue sweep: deletes ghost queue entries.

use chrono::Utc;
use sqlx::PgPool;
use tandem_core::liveness::LivenessPolicy;
use tandem_core::types::{DbId, Timestamp};
use tandem_db::repositories::QueueRepo;
use tokio_util::sync::CancellationToken;

use crate::config::JobConfig;

/// One sweep pass at `now`. Returns the participants whose entry was
/// removed.
pub async fn run_once(
    pool: &PgPool,
    policy: &LivenessPolicy,
    now: Timestamp,
) -> Result<Vec<DbId>, sqlx::Error> {
    QueueRepo::delete_stale(pool, policy.waiting_cutoff(now)).await
}

/// Run the stale-queue sweep until `cancel` is triggered.
pub async fn run(pool: PgPool, config: JobConfig, cancel: CancellationToken) {
    let policy = config.liveness;
    super::every("stale_queue", config.sweep_interval, cancel, || {
        let pool = &pool;
        async move {
            match run_once(pool, &policy, Utc::now()).await {
                Ok(removed) if !removed.is_empty() => {
                    tracing::info!(
                        removed = removed.len(),
                        participant_ids = ?removed,
                        "Stale queue entries removed"
                    );
                }
                Ok(_) => tracing::debug!("Stale-queue sweep: nothing to do"),
                Err(e) => tracing::error!(error = %e, "Stale-queue sweep failed"),
            }
        }
    })
    .await;
}
