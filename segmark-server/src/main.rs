//! segmark-server - Segmentation Labeling Backend
//!
//! Turns prompts plus an external inference engine into durable labeling
//! artifacts: interactive segment/refine flows, unattended batch jobs over
//! a folder, and mask/overlay/COCO exports.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use segmark_common::ServiceConfig;
use segmark_server::engine::HttpInferenceEngine;
use segmark_server::services::StorageService;
use segmark_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::resolve();

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting segmark-server (Segmentation Labeling Backend)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Data folder: {}", config.data_folder.display());
    info!("Inference engine: {}", config.engine_url);

    config.ensure_data_folder()?;

    let engine = Arc::new(HttpInferenceEngine::new(&config.engine_url)?);
    let storage = Arc::new(StorageService::new(&config.data_folder)?);
    let state = AppState::new(engine, storage);

    let app = segmark_server::build_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Listening on http://{}:{}", config.host, config.port);
    info!("Health check: http://{}:{}/health", config.host, config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
