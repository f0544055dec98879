//! Inference engine contract
//!
//! The segmentation model is an external collaborator consumed through this
//! narrow trait. The engine maintains per-entity context server-side; the
//! backend only holds opaque handles to it. Confidence filtering happens at
//! this boundary — callers never see below-threshold candidates.

pub mod http;

use async_trait::async_trait;
use segmark_common::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{BBox, Instance, MaskGrid, PointPrompt};

pub use http::HttpInferenceEngine;

/// Opaque engine-side context handle for one segmented image entity.
/// Produced by the first text-prompt call, consumed by refinement calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateHandle(pub String);

/// Raw engine outputs for one segmentation or refinement call
#[derive(Debug, Clone, Default)]
pub struct SegmentOutputs {
    pub masks: Vec<MaskGrid>,
    pub boxes: Vec<BBox>,
    pub scores: Vec<f32>,
    /// Present on first-prompt image calls; reused for refinement
    pub state: Option<StateHandle>,
}

impl SegmentOutputs {
    /// Normalize raw outputs into indexed instances at the target canvas
    /// size. Indices are assigned in result order (filtering already
    /// happened at the engine boundary).
    pub fn to_instances(&self, label: &str, width: u32, height: u32) -> Vec<Instance> {
        self.masks
            .iter()
            .enumerate()
            .map(|(index, mask)| Instance {
                index,
                mask: mask.binarize(height as usize, width as usize),
                bbox: self.boxes.get(index).copied().unwrap_or(BBox {
                    x1: 0.0,
                    y1: 0.0,
                    x2: 0.0,
                    y2: 0.0,
                }),
                score: self.scores.get(index).copied().unwrap_or(0.0),
                label: label.to_string(),
            })
            .collect()
    }

    /// Canvas size implied by the first mask grid, for entities whose pixel
    /// dimensions are not known up front (video outputs)
    pub fn native_size(&self) -> Option<(u32, u32)> {
        self.masks.first().and_then(|m| {
            let (w, h) = (m.width(), m.height());
            (w > 0 && h > 0).then_some((w as u32, h as u32))
        })
    }
}

/// Narrow contract to the external segmentation engine
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Segment an encoded image with a text prompt. Returns outputs filtered
    /// by `confidence_threshold` plus a state handle for refinement.
    async fn segment_with_text(
        &self,
        image: &[u8],
        prompt: &str,
        confidence_threshold: f32,
    ) -> Result<SegmentOutputs>;

    /// Refine a prior segmentation with point prompts
    async fn refine_with_points(
        &self,
        state: &StateHandle,
        points: &[PointPrompt],
    ) -> Result<SegmentOutputs>;

    /// Refine a prior segmentation with a box prompt
    async fn refine_with_box(&self, state: &StateHandle, bbox: BBox) -> Result<SegmentOutputs>;

    /// Open a video session on the engine; the returned session id must
    /// eventually be released with `end_video_session`
    async fn start_video_session(&self, resource_path: &Path) -> Result<String>;

    /// Prompt a video session at a frame
    async fn add_video_prompt(
        &self,
        session_id: &str,
        frame_index: u32,
        text: &str,
        confidence_threshold: f32,
    ) -> Result<SegmentOutputs>;

    /// Release engine-side video session resources
    async fn end_video_session(&self, session_id: &str) -> Result<()>;
}
