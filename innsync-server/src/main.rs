//! InnSync Server
//!
//! Inventory and pricing consistency engine for a single hotel property:
//! availability, rate resolution, booking lifecycle, and cross-channel
//! synchronization.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use innsync_core::events::{EventSenders, stay_event_channel};
use innsync_core::lifecycle::StayService;
use innsync_core::processors::{ChannelSyncWorker, FeedPoller};
use server::{build_router, run_server};
use shutdown::shutdown_signal;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// InnSync - hotel inventory and channel synchronization engine
#[derive(Parser, Debug)]
#[command(name = "innsync-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./innsync-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting innsync-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Event channel from the stay lifecycle to the sync worker, and the
    // shutdown broadcast for every background processor.
    let (stay_tx, stay_rx) = stay_event_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let service = StayService::new(
        db_pool.clone(),
        EventSenders::new(stay_tx),
        config.property.booking_ref_prefix.clone(),
    );

    let sync_worker = ChannelSyncWorker::new(
        db_pool.clone(),
        stay_rx,
        shutdown_rx.clone(),
        config.sync.max_attempts,
    );
    let sync_handle = tokio::spawn(sync_worker.run());

    let feed_poller = FeedPoller::new(
        service.clone(),
        shutdown_rx,
        std::time::Duration::from_secs(config.sync.poll_interval_secs),
    );
    let poller_handle = tokio::spawn(feed_poller.run());

    let state = AppState::new(db_pool.clone(), service, Arc::new(config));
    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_signal(shutdown_tx)).await;

    // Wait for the processors to drain before closing the pool.
    let _ = sync_handle.await;
    let _ = poller_handle.await;

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
