//! HTTP client for the external inference engine
//!
//! Speaks JSON to the engine service's REST endpoints. Image bytes travel
//! base64-encoded. A 404 from the engine maps to NotFound (stale session or
//! state handle); any other failure maps to Upstream.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use segmark_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{InferenceEngine, SegmentOutputs, StateHandle};
use crate::models::{BBox, MaskGrid, PointPrompt};

const USER_AGENT: &str = concat!("segmark/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Inference engine reached over HTTP
pub struct HttpInferenceEngine {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct TextSegmentBody<'a> {
    image: String,
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct RefinePointsBody<'a> {
    state_token: &'a str,
    points: Vec<[f32; 2]>,
    labels: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct RefineBoxBody<'a> {
    state_token: &'a str,
    #[serde(rename = "box")]
    bbox: [f32; 4],
}

#[derive(Debug, Serialize)]
struct StartSessionBody<'a> {
    resource_path: &'a str,
}

#[derive(Debug, Serialize)]
struct AddPromptBody<'a> {
    session_id: &'a str,
    frame_index: u32,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct EndSessionBody<'a> {
    session_id: &'a str,
}

/// Engine wire response for segmentation calls
#[derive(Debug, Deserialize)]
struct OutputsResponse {
    #[serde(default)]
    masks: Vec<MaskGrid>,
    #[serde(default)]
    boxes: Vec<[f32; 4]>,
    #[serde(default)]
    scores: Vec<f32>,
    #[serde(default)]
    state_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartSessionResponse {
    session_id: String,
}

impl HttpInferenceEngine {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Upstream(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Engine request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::NotFound(format!(
                "Engine has no such entity: {}",
                detail
            )));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Engine returned {}: {}",
                status, detail
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Engine response parse failed: {}", e)))
    }

    /// Drop candidates below the threshold; indices are assigned after
    /// filtering, in result order.
    fn filter_outputs(response: OutputsResponse, confidence_threshold: f32) -> SegmentOutputs {
        let state = response.state_token.map(StateHandle);
        let mut outputs = SegmentOutputs {
            state,
            ..Default::default()
        };

        for (i, score) in response.scores.iter().enumerate() {
            if *score < confidence_threshold {
                continue;
            }
            let Some(mask) = response.masks.get(i) else {
                continue;
            };
            let bbox = response
                .boxes
                .get(i)
                .map(|b| BBox {
                    x1: b[0],
                    y1: b[1],
                    x2: b[2],
                    y2: b[3],
                })
                .unwrap_or(BBox {
                    x1: 0.0,
                    y1: 0.0,
                    x2: 0.0,
                    y2: 0.0,
                });
            outputs.masks.push(mask.clone());
            outputs.boxes.push(bbox);
            outputs.scores.push(*score);
        }

        outputs
    }
}

#[async_trait]
impl InferenceEngine for HttpInferenceEngine {
    async fn segment_with_text(
        &self,
        image: &[u8],
        prompt: &str,
        confidence_threshold: f32,
    ) -> Result<SegmentOutputs> {
        let body = TextSegmentBody {
            image: BASE64.encode(image),
            prompt,
        };
        let response: OutputsResponse = self.post("/segment/text", &body).await?;
        Ok(Self::filter_outputs(response, confidence_threshold))
    }

    async fn refine_with_points(
        &self,
        state: &StateHandle,
        points: &[PointPrompt],
    ) -> Result<SegmentOutputs> {
        let body = RefinePointsBody {
            state_token: &state.0,
            points: points.iter().map(|p| [p.x, p.y]).collect(),
            labels: points.iter().map(|p| p.label).collect(),
        };
        let response: OutputsResponse = self.post("/segment/refine/points", &body).await?;
        // refinement keeps every candidate; the threshold applied on the
        // first prompt already scoped the instance set
        Ok(Self::filter_outputs(response, 0.0))
    }

    async fn refine_with_box(&self, state: &StateHandle, bbox: BBox) -> Result<SegmentOutputs> {
        let body = RefineBoxBody {
            state_token: &state.0,
            bbox: [bbox.x1, bbox.y1, bbox.x2, bbox.y2],
        };
        let response: OutputsResponse = self.post("/segment/refine/box", &body).await?;
        Ok(Self::filter_outputs(response, 0.0))
    }

    async fn start_video_session(&self, resource_path: &Path) -> Result<String> {
        let body = StartSessionBody {
            resource_path: &resource_path.to_string_lossy(),
        };
        let response: StartSessionResponse = self.post("/video/start_session", &body).await?;
        Ok(response.session_id)
    }

    async fn add_video_prompt(
        &self,
        session_id: &str,
        frame_index: u32,
        text: &str,
        confidence_threshold: f32,
    ) -> Result<SegmentOutputs> {
        let body = AddPromptBody {
            session_id,
            frame_index,
            text,
        };
        let response: OutputsResponse = self.post("/video/add_prompt", &body).await?;
        Ok(Self::filter_outputs(response, confidence_threshold))
    }

    async fn end_video_session(&self, session_id: &str) -> Result<()> {
        let body = EndSessionBody { session_id };
        let _: serde_json::Value = self.post("/video/end_session", &body).await?;
        Ok(())
    }
}
