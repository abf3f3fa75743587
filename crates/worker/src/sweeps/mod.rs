//! Reconciliation sweeps.
//!
//! Three independent, idempotent jobs that run on the same cadence and are
//! safe alongside live traffic. Each exposes `run_once` (one pass at a given
//! instant, used directly by tests) and `run` (the periodic loop).

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub mod session_expiry;
pub mod stale_queue;
pub mod stale_rooms;

/// Call `pass` every `period` until `cancel` is triggered.
async fn every<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut pass: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    tracing::info!(sweep = name, interval_secs = period.as_secs(), "Sweep started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(sweep = name, "Sweep stopping");
                break;
            }
            _ = interval.tick() => pass().await,
        }
    }
}
