//! Batch processing API handlers
//!
//! POST /api/batch/process, GET /api/batch/status/{job_id}

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{BatchRequest, JobSnapshot};
use crate::AppState;

/// POST /api/batch/process response
#[derive(Debug, Serialize)]
pub struct CreateBatchResponse {
    pub job_id: Uuid,
    pub message: String,
}

/// POST /api/batch/process
///
/// Create a batch job and spawn its worker. Returns the job id immediately;
/// progress is observed by polling the status endpoint.
pub async fn create_batch_job(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<CreateBatchResponse>> {
    let job_id = state.batch.create_job(&request).await?;
    state.batch.spawn_worker(job_id).await;

    Ok(Json(CreateBatchResponse {
        job_id,
        message: "Batch processing started".to_string(),
    }))
}

/// GET /api/batch/status/{job_id}
///
/// Immutable status snapshot. 404 for ids not returned by job creation.
pub async fn get_batch_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobSnapshot>> {
    let snapshot = state.batch.get_job_status(job_id).await?;
    Ok(Json(snapshot))
}

/// Build batch routes
pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/api/batch/process", post(create_batch_job))
        .route("/api/batch/status/:job_id", get(get_batch_status))
}
