use std::sync::Arc;

use tandem_events::{EventBus, NotificationRelay};
use tandem_worker::JobConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem_worker=debug,tandem_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = tandem_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tandem_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tandem_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    let config = JobConfig::from_env();
    let bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();

    if let Ok(url) = std::env::var("NOTIFY_WEBHOOK_URL") {
        match NotificationRelay::new(url) {
            Ok(relay) => {
                tokio::spawn(relay.run(bus.subscribe()));
            }
            Err(e) => tracing::error!(error = %e, "Notification relay disabled"),
        }
    }

    let handles = tandem_worker::spawn_all(pool, Arc::clone(&bus), config, cancel.clone());
    tracing::info!(jobs = handles.len(), "Worker running");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, stopping jobs");
    cancel.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Job task panicked");
        }
    }
    tracing::info!("Worker stopped");
}
