//! Interactive segmentation API handlers
//!
//! POST /api/segment/upload, /image/text, /image/refine, /video/text,
//! DELETE /api/segment/clear/{file_id}

use axum::{
    extract::{Multipart, Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{Instance, RefineRequest, TextPromptRequest, VideoPromptRequest};
use crate::services::EntityState;
use crate::AppState;

/// POST /api/segment/upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub file_path: String,
    pub file_type: String,
    pub filename: String,
}

/// Segmentation result: masks as nested 0/1 grids, corner-form boxes,
/// confidence scores
#[derive(Debug, Serialize)]
pub struct SegmentationResponse {
    pub masks: Vec<Vec<Vec<u8>>>,
    pub boxes: Vec<crate::models::BBox>,
    pub scores: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl SegmentationResponse {
    fn from_instances(instances: &[Instance], with_labels: bool) -> Self {
        Self {
            masks: instances.iter().map(|i| i.mask.to_rows_u8()).collect(),
            boxes: instances.iter().map(|i| i.bbox).collect(),
            scores: instances.iter().map(|i| i.score).collect(),
            labels: with_labels
                .then(|| instances.iter().map(|i| i.label.clone()).collect()),
        }
    }
}

/// POST /api/segment/video/text response
#[derive(Debug, Serialize)]
pub struct VideoSegmentationResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub result: SegmentationResponse,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

/// POST /api/segment/upload
///
/// Store an uploaded image or video and return its generated file id.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.file_name().is_none() && field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        if content.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
        }

        let file_type = if infer::is_image(&content) {
            "image"
        } else if infer::is_video(&content) {
            "video"
        } else {
            return Err(ApiError::BadRequest(
                "Unsupported file type; expected an image or video".to_string(),
            ));
        };

        let (file_id, path) = state.storage.save_upload(&content, &filename)?;
        tracing::info!(file_id = %file_id, file_type, "File uploaded");

        return Ok(Json(UploadResponse {
            file_id,
            file_path: path.display().to_string(),
            file_type: file_type.to_string(),
            filename,
        }));
    }

    Err(ApiError::BadRequest("Missing file field".to_string()))
}

/// POST /api/segment/image/text
///
/// Segment an uploaded image with a text prompt. Caches the engine state for
/// later refinement; re-segmenting silently replaces the cached state.
pub async fn segment_image_with_text(
    State(state): State<AppState>,
    Json(request): Json<TextPromptRequest>,
) -> ApiResult<Json<SegmentationResponse>> {
    request.validate()?;

    let path = state.storage.require_upload(&request.image_id)?;
    let bytes = std::fs::read(&path)?;
    let (width, height) = image::image_dimensions(&path)
        .map_err(|e| ApiError::BadRequest(format!("File is not a decodable image: {}", e)))?;

    let outputs = state
        .engine
        .segment_with_text(&bytes, &request.prompt, request.confidence_threshold)
        .await?;

    if let Some(handle) = outputs.state.clone() {
        state
            .sessions
            .put(&request.image_id, EntityState::Image(handle))
            .await;
    }

    let instances = outputs.to_instances(&request.prompt, width, height);
    tracing::info!(
        image_id = %request.image_id,
        prompt = %request.prompt,
        instances = instances.len(),
        "Text segmentation completed"
    );

    Ok(Json(SegmentationResponse::from_instances(&instances, true)))
}

/// POST /api/segment/image/refine
///
/// Refine a prior segmentation with point or box prompts. Fails with 404
/// when no prior state exists for the image.
pub async fn refine_segmentation(
    State(state): State<AppState>,
    Json(request): Json<RefineRequest>,
) -> ApiResult<Json<SegmentationResponse>> {
    request.validate()?;

    let handle = match state.sessions.get(&request.image_id).await? {
        EntityState::Image(handle) => handle,
        EntityState::Video { .. } => {
            return Err(ApiError::BadRequest(
                "Refinement applies to image entities only".to_string(),
            ));
        }
    };

    let path = state.storage.require_upload(&request.image_id)?;
    let (width, height) = image::image_dimensions(&path)
        .map_err(|e| ApiError::BadRequest(format!("File is not a decodable image: {}", e)))?;

    let outputs = match request.points.as_deref().filter(|p| !p.is_empty()) {
        Some(points) => state.engine.refine_with_points(&handle, points).await?,
        // validate() guarantees a box is present when points are not
        None => {
            let bbox = request.boxes.as_ref().and_then(|b| b.first()).copied().ok_or_else(
                || ApiError::BadRequest("must provide points or boxes".to_string()),
            )?;
            state.engine.refine_with_box(&handle, bbox).await?
        }
    };

    let instances = outputs.to_instances("", width, height);
    Ok(Json(SegmentationResponse::from_instances(&instances, false)))
}

/// POST /api/segment/video/text
///
/// Open a video session on the engine and prompt it. Any previous session
/// for this video is cleared (ending it engine-side) before the new one
/// replaces it.
pub async fn segment_video_with_text(
    State(state): State<AppState>,
    Json(request): Json<VideoPromptRequest>,
) -> ApiResult<Json<VideoSegmentationResponse>> {
    request.validate()?;

    let path = state.storage.require_upload(&request.video_id)?;

    state.sessions.clear(&request.video_id).await;
    let session_id = state.engine.start_video_session(&path).await?;
    state
        .sessions
        .put(
            &request.video_id,
            EntityState::Video {
                session_id: session_id.clone(),
            },
        )
        .await;

    let outputs = state
        .engine
        .add_video_prompt(
            &session_id,
            request.frame_index,
            &request.prompt,
            request.confidence_threshold,
        )
        .await?;

    let (width, height) = outputs.native_size().unwrap_or((0, 0));
    let instances = outputs.to_instances(&request.prompt, width, height);
    tracing::info!(
        video_id = %request.video_id,
        session_id = %session_id,
        instances = instances.len(),
        "Video segmentation started"
    );

    Ok(Json(VideoSegmentationResponse {
        session_id,
        result: SegmentationResponse::from_instances(&instances, true),
    }))
}

/// DELETE /api/segment/clear/{file_id}
///
/// Drop the cached state for a file. Idempotent: clearing an unknown id is a
/// no-op, not an error.
pub async fn clear_file_state(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<ClearResponse>> {
    state.sessions.clear(&file_id).await;
    Ok(Json(ClearResponse {
        message: format!("State cleared for {}", file_id),
    }))
}

/// Build segmentation routes
pub fn segmentation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/segment/upload", post(upload_file))
        .route("/api/segment/image/text", post(segment_image_with_text))
        .route("/api/segment/image/refine", post(refine_segmentation))
        .route("/api/segment/video/text", post(segment_video_with_text))
        .route("/api/segment/clear/:file_id", delete(clear_file_state))
}
