// SPDX-License-Identifier: MIT

//! Training log API server.
//!
//! Tracks training sessions across swimming, cycling and running,
//! imports activities from Strava and detects which municipalities
//! each route passes through.

use std::sync::Arc;
use std::time::Duration;

use training_log::{
    config::Config,
    db::{create_pool, run_migrations, Database},
    services::RegionService,
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting training log API");

    let pool = create_pool(&config.database_url).expect("Failed to open database");
    run_migrations(&pool).expect("Failed to run migrations");
    let db = Database::new(pool);

    tracing::info!(path = %config.boundaries_path, "Loading municipality boundaries");
    let regions = RegionService::load_from_file(&config.boundaries_path)
        .expect("Failed to load municipality boundaries");

    let state = Arc::new(AppState::new(config.clone(), db, regions));

    if config.sync_interval_minutes > 0 {
        spawn_auto_sync(state.clone());
    }

    let app = training_log::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Background loop that periodically imports new Strava activities for
/// users with auto-import enabled.
fn spawn_auto_sync(state: Arc<AppState>) {
    let interval_minutes = state.config.sync_interval_minutes;
    let pages = state.config.sync_page_count;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval_minutes, "Auto-sync loop started");
        loop {
            interval.tick().await;
            state.import.auto_sync_all(pages).await;
        }
    });
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("training_log=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
