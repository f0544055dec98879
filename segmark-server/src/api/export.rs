//! Export API handlers
//!
//! POST /api/export/annotations, GET /api/export/download/{job_id}

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::export;
use crate::models::{ExportRequest, ExportSink, JobState};
use crate::AppState;

/// File-sink export response
#[derive(Debug, Serialize)]
pub struct ExportFilesResponse {
    pub output_folder: String,
    pub files: Vec<String>,
}

/// POST /api/export/annotations
///
/// Run the export pipeline for the supplied instances against an uploaded
/// image. The artifact set is written under an output directory or streamed
/// back as one zip archive, depending on the requested sink.
pub async fn export_annotations(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> ApiResult<Response> {
    let path = state.storage.require_upload(&request.image_id)?;
    let source = image::open(&path)
        .map_err(|e| ApiError::BadRequest(format!("File is not a decodable image: {}", e)))?
        .to_rgba8();
    let (width, height) = source.dimensions();

    let instances = export::normalize_instances(&request.instances, width, height);
    let artifacts = export::render(&source, &instances, &request.image_id, request.prompt.as_deref());

    tracing::info!(
        image_id = %request.image_id,
        instances = instances.len(),
        sink = ?request.sink,
        "Export requested"
    );

    match request.sink {
        ExportSink::Files => {
            let folder_name = format!(
                "export_{}_{}",
                request.image_id,
                Utc::now().format("%Y%m%d_%H%M%S")
            );
            let dir = state.storage.create_output_folder(&folder_name)?;
            let files = export::write_to_dir(&artifacts, &dir)?;

            Ok(Json(ExportFilesResponse {
                output_folder: dir.display().to_string(),
                files: files.iter().map(|p| p.display().to_string()).collect(),
            })
            .into_response())
        }
        ExportSink::Archive => {
            let bytes = export::to_archive(&artifacts)?;
            let headers = [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}_export.zip\"", request.image_id),
                ),
            ];
            Ok((headers, bytes).into_response())
        }
    }
}

/// GET /api/export/download/{job_id}
///
/// Download a completed batch job's output folder as one zip archive.
pub async fn download_batch_results(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Response> {
    let (output_folder, job_state) = state.batch.job_output(job_id).await?;
    if job_state != JobState::Completed {
        return Err(ApiError::BadRequest(format!(
            "Job {} is not completed (status: {:?})",
            job_id, job_state
        )));
    }

    let bytes = export::zip_directory(&output_folder)?;
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"batch_{}.zip\"", job_id),
        ),
    ];
    Ok((headers, bytes).into_response())
}

/// Build export routes
pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/api/export/annotations", post(export_annotations))
        .route("/api/export/download/:job_id", get(download_batch_results))
}
