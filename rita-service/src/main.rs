use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

mod api;
mod auth;
mod config;
mod db;
mod error;
mod extraction;
mod openai;
mod search;
mod service;
mod storage;

use crate::config::{RuntimeConfig, StaticConfig};
use crate::db::Database;
use crate::service::RitaService;

// Re-export config crate types to avoid namespace collision
use ::config::{Config as ConfigBuilder, Environment, File};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("Starting Rita service v{}", env!("CARGO_PKG_VERSION"));

    // Load static configuration (server binding, storage path)
    // We need to load this first to know where the database is
    let static_config: StaticConfig = ConfigBuilder::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("RITA")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    info!(
        host = %static_config.server.host,
        port = static_config.server.port,
        "Static configuration loaded"
    );

    // Ensure data directory exists
    std::fs::create_dir_all(&static_config.storage.data_dir)?;

    // Initialize database
    let db_path = static_config.storage.data_dir.join("rita.db");
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    // Load runtime config (static + dynamic with DB overrides)
    let runtime_config = Arc::new(RuntimeConfig::load(&db)?);
    info!("Runtime configuration loaded with DB settings");

    // Initialize the service
    let service = Arc::new(RitaService::new(db, runtime_config.clone())?);

    // Release extraction leases orphaned by a previous crash
    match service.recover_interrupted_extractions() {
        Ok(count) if count > 0 => info!(count, "Recovered interrupted extractions"),
        Err(e) => tracing::warn!(error = %e, "Extraction recovery sweep failed"),
        _ => {}
    }

    service.verify_external_services().await;

    // Build the router
    let app = api::router(service, &runtime_config);

    // Start the server
    let addr = format!(
        "{}:{}",
        runtime_config.static_config.server.host, runtime_config.static_config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rita_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
