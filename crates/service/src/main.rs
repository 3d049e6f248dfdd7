//! Estato service - house-price prediction over HTTP
//!
//! Loads the artifact bundle once at startup and serves predictions until
//! interrupted. A missing or invalid bundle does not stop the process; it
//! starts degraded and answers predictions with 503.

use anyhow::Result;
use estato_service::{api, config::ServiceConfig};
use estimator_lib::{ArtifactStore, PredictionService, StructuredLogger};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServiceConfig::load()?;
    info!(
        artifact_dir = %config.artifact_dir.display(),
        port = config.port,
        "Service configured"
    );

    let logger = StructuredLogger::new(&config.service_name);
    let store = ArtifactStore::new(&config.artifact_dir);
    let service: api::AppState = Arc::new(PredictionService::load(&store, logger.clone()));

    let router = api::create_router(service, config.static_dir.as_deref());
    logger.log_startup(SERVICE_VERSION, config.port);

    let shutdown_logger = logger.clone();
    api::serve(&config.bind_addr(), router, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        shutdown_logger.log_shutdown("SIGINT received");
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
