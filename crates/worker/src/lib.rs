//! Long-running jobs: the matchmaker and the reconciliation sweeps.
//!
//! Each job is an async function intended to be spawned via `tokio::spawn`
//! and stopped through a [`CancellationToken`]. The API server spawns them
//! in-process by default; the `tandem-worker` binary runs them standalone.

use std::sync::Arc;

use sqlx::PgPool;
use tandem_events::EventBus;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod matchmaker;
pub mod sweeps;

pub use config::JobConfig;

/// Spawn the matchmaker and all three sweeps.
pub fn spawn_all(
    pool: PgPool,
    bus: Arc<EventBus>,
    config: JobConfig,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(matchmaker::run(
            pool.clone(),
            Arc::clone(&bus),
            config.clone(),
            cancel.clone(),
        )),
        tokio::spawn(sweeps::stale_rooms::run(
            pool.clone(),
            Arc::clone(&bus),
            config.clone(),
            cancel.clone(),
        )),
        tokio::spawn(sweeps::stale_queue::run(
            pool.clone(),
            config.clone(),
            cancel.clone(),
        )),
        tokio::spawn(sweeps::session_expiry::run(pool, bus, config, cancel)),
    ]
}
