use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tandem_api::config::ServerConfig;
use tandem_api::router::build_app_router;
use tandem_api::state::AppState;
use tandem_api::voice::HmacVoiceTokenIssuer;
use tandem_events::{EventBus, NotificationRelay};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem_api=debug,tandem_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = tandem_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    tandem_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    tandem_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    let relay_handle = config.notify_webhook_url.as_ref().and_then(|url| {
        match NotificationRelay::new(url.clone()) {
            Ok(relay) => Some(tokio::spawn(relay.run(event_bus.subscribe()))),
            Err(e) => {
                tracing::error!(error = %e, "Notification relay disabled");
                None
            }
        }
    });

    // --- Background jobs ---
    let jobs_cancel = CancellationToken::new();
    let job_handles = if config.run_jobs_in_process {
        let handles = tandem_worker::spawn_all(
            pool.clone(),
            Arc::clone(&event_bus),
            config.jobs.clone(),
            jobs_cancel.clone(),
        );
        tracing::info!(jobs = handles.len(), "Matchmaker and sweeps started in-process");
        handles
    } else {
        tracing::info!("In-process jobs disabled, expecting a standalone worker");
        Vec::new()
    };

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
        voice: Arc::new(HmacVoiceTokenIssuer::new(config.voice.clone())),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    jobs_cancel.cancel();
    for handle in job_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    tracing::info!("Background jobs stopped");

    // Dropping the last sender closes the channel and ends the relay loop.
    drop(event_bus);
    if let Some(handle) = relay_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
