use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod auth;
mod config;
mod db;
mod error;
mod i18n;
mod pdf;
mod service;
mod storage;

use crate::config::load_config;
use crate::db::Database;
use crate::service::FolioService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting Folio service v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(load_config()?);
    info!(
        host = %config.server.host,
        port = config.server.port,
        upload_dir = %config.storage.upload_dir.display(),
        "Configuration loaded"
    );

    // Initialize database
    let db_path = config.storage.data_dir.join("folio.db");
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    // A missing recorder only costs the /metrics output
    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder; /metrics will be empty");
            None
        }
    };

    // Initialize the service
    let service = Arc::new(FolioService::new(config.clone(), db).await?);

    // Build the router
    let app = api::router(service, metrics);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
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
        .unwrap_or_else(|_| EnvFilter::new("folio_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
