//! Debris API Server
//!
//! Main entry point: files over HTTP, bytes in a Discord guild, metadata in Postgres.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sea_orm_migration::MigratorTrait;
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use debris_api::{AppState, create_router};
use debris_core::{
    access::AccessLedger,
    file::FileService,
    identity::{DiscordIdentityProvider, IdentityResolver},
    storage::{self, BlobStore, StorageConfig},
};
use debris_db::{AccessRepository, FileRepository, Migrator, UserRepository, connect_with};
use debris_shared::AppConfig;

/// How often foreign containers are looked for after startup.
const RECONCILE_INTERVAL: Duration = Duration::from_secs(600);

/// Ceiling for the delay between failed storage handshakes.
const MAX_OPEN_BACKOFF: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debris=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Connect to database
    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    if config.database.run_migrations {
        Migrator::up(&db, None).await?;
        info!("Migrations applied");
    }

    // Storage adapter, opened in the background; requests fail until it is ready
    let storage = storage::from_config(StorageConfig::from_settings(&config.storage)?)?;
    let maintenance = spawn_storage_maintenance(storage.clone());

    let files = FileService::new(storage.clone(), Arc::new(FileRepository::new(db.clone())))
        .with_public_base(config.public.base_url());

    let provider = DiscordIdentityProvider::new(
        &config.identity.api_base,
        Duration::from_secs(config.identity.request_timeout_secs),
    )?;
    let identity = IdentityResolver::new(
        Arc::new(provider),
        Arc::new(UserRepository::new(db.clone())),
        Duration::from_secs(config.identity.cache_ttl_secs),
    )
    .with_ledger(AccessLedger::new(Arc::new(AccessRepository::new(db))));

    let state = AppState::new(files, identity)
        .with_body_limit(config.server.max_body_bytes)
        .with_trusted_proxy(config.server.trust_forwarded_for);
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for shutdown signal");
        }
        info!("Received Ctrl+C, shutting down");
    })
    .await?;

    maintenance.abort();
    storage.close().await;
    info!("Storage closed");

    Ok(())
}

/// Opens the adapter with capped exponential backoff, then reconciles it periodically.
fn spawn_storage_maintenance(storage: Arc<dyn BlobStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = Duration::from_secs(1);
        while let Err(err) = storage.open().await {
            warn!(error = %err, retry_in = ?backoff, "Storage handshake failed");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_OPEN_BACKOFF);
        }

        let mut ticker = tokio::time::interval(RECONCILE_INTERVAL);
        // The first tick completes immediately and open() just reconciled.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = storage.reconcile().await {
                warn!(error = %err, "Storage reconciliation failed");
            }
        }
    })
}
