//! segmark-server library interface
//!
//! Backend of an interactive + batch instance-segmentation labeling tool.
//! The segmentation model is an external collaborator reached through the
//! `engine::InferenceEngine` contract; this crate owns session state, batch
//! orchestration, and the mask export pipeline.

pub mod api;
pub mod engine;
pub mod error;
pub mod export;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::InferenceEngine;
use crate::services::{BatchEngine, SessionStore, StorageService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// External segmentation engine
    pub engine: Arc<dyn InferenceEngine>,
    /// Per-entity inference context cache
    pub sessions: Arc<SessionStore>,
    /// Upload/output storage
    pub storage: Arc<StorageService>,
    /// Batch job engine
    pub batch: Arc<BatchEngine>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<dyn InferenceEngine>, storage: Arc<StorageService>) -> Self {
        let sessions = Arc::new(SessionStore::new(engine.clone()));
        let batch = Arc::new(BatchEngine::new(
            engine.clone(),
            sessions.clone(),
            storage.clone(),
        ));
        Self {
            engine,
            sessions,
            storage,
            batch,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::segmentation_routes())
        .merge(api::batch_routes())
        .merge(api::export_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
