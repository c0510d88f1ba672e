use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telemetry_service::{
    api::{self, AppState},
    config::Config,
    db::{self, store::PgReadingStore},
    notifier::WebhookNotifier,
    reading_cache,
    telemetry::TelemetryService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; variables may also come from the environment
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Connect to DB and run migrations
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    let cache = reading_cache::connect(&config.cache_url).await?;

    // One store, cache and notifier per process, shared by every request
    let service = TelemetryService::new(
        Arc::new(PgReadingStore::new(pool)),
        cache,
        Arc::new(WebhookNotifier::new(
            config.alert_webhook_url.clone(),
            config.alert_timeout(),
        )?),
        config.thresholds,
    );

    if config.ingest_token.is_some() {
        info!("Bearer token required for ingestion");
    }

    let state = AppState {
        service,
        ingest_token: config.ingest_token.clone(),
    };

    // Start HTTP server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
