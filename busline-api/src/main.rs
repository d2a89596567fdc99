use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use busline_api::{app, AppState};
use busline_booking::TripReaper;
use busline_core::{BookingPolicy, Clock, SystemClock};
use busline_store::{app_config::Config, DbClient, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "busline_api=debug,busline_booking=debug,busline_store=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Busline API on port {}", config.server.port);

    let tz = BookingPolicy::parse_timezone(&config.booking.timezone)?;
    let policy = BookingPolicy::new(tz, config.booking.grace_minutes, config.booking.history_window_minutes)?;

    // Database Connection
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let store = Arc::new(PgStore::new(db.pool.clone(), &config.database));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Trip Expiry Reaper
    let reaper = if config.reaper.enabled {
        let reaper = Arc::new(TripReaper::new(store.clone(), store.clone(), clock.clone(), policy));
        Some(reaper.spawn(Duration::from_secs(config.reaper.interval_seconds)))
    } else {
        tracing::warn!("Trip reaper disabled; seats of departed trips will not be released");
        None
    };

    let app_state = AppState::new(store.clone(), store, clock, policy);
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = reaper {
        handle.stop().await;
    }
    db.pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
