//! Typed API request records
//!
//! Raw payloads are validated and converted at the API boundary; the core
//! components never inspect untyped input.

use segmark_common::{Error, Result};
use serde::{Deserialize, Serialize};

use super::batch_job::ExportFormat;
use super::instance::{BBox, MaskGrid};

/// Point prompt: image coordinates plus a positive/negative label
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointPrompt {
    pub x: f32,
    pub y: f32,
    /// 1 for positive (include), 0 for negative (exclude)
    #[serde(default = "default_point_label")]
    pub label: u8,
}

fn default_point_label() -> u8 {
    1
}

fn default_confidence() -> f32 {
    0.5
}

/// POST /api/segment/image/text
#[derive(Debug, Clone, Deserialize)]
pub struct TextPromptRequest {
    pub image_id: String,
    pub prompt: String,
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,
}

impl TextPromptRequest {
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }
        validate_threshold(self.confidence_threshold)
    }
}

/// POST /api/segment/image/refine
#[derive(Debug, Clone, Deserialize)]
pub struct RefineRequest {
    pub image_id: String,
    #[serde(default)]
    pub points: Option<Vec<PointPrompt>>,
    #[serde(default)]
    pub boxes: Option<Vec<BBox>>,
}

impl RefineRequest {
    /// A refinement needs points or at least one box
    pub fn validate(&self) -> Result<()> {
        let has_points = self.points.as_ref().is_some_and(|p| !p.is_empty());
        let has_boxes = self.boxes.as_ref().is_some_and(|b| !b.is_empty());
        if !has_points && !has_boxes {
            return Err(Error::InvalidInput(
                "must provide points or boxes".to_string(),
            ));
        }
        Ok(())
    }
}

/// POST /api/segment/video/text
#[derive(Debug, Clone, Deserialize)]
pub struct VideoPromptRequest {
    pub video_id: String,
    pub prompt: String,
    #[serde(default)]
    pub frame_index: u32,
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,
}

impl VideoPromptRequest {
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }
        validate_threshold(self.confidence_threshold)
    }
}

/// POST /api/batch/process
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub input_folder: String,
    /// Optional base directory for the job's output folder; the storage
    /// outputs root is used when omitted
    #[serde(default)]
    pub output_folder: Option<String>,
    pub prompts: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,
    #[serde(default = "default_export_format")]
    pub export_format: ExportFormat,
    #[serde(default)]
    pub include_video: bool,
}

fn default_export_format() -> ExportFormat {
    ExportFormat::Coco
}

impl BatchRequest {
    pub fn validate(&self) -> Result<()> {
        if self.prompts.is_empty() || self.prompts.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::InvalidInput(
                "at least one non-empty prompt is required".to_string(),
            ));
        }
        validate_threshold(self.confidence_threshold)
    }
}

/// One instance payload supplied to the export endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct InstancePayload {
    pub mask: MaskGrid,
    #[serde(alias = "box")]
    pub bbox: BBox,
    pub score: f32,
    #[serde(default)]
    pub label: Option<String>,
}

/// Where the export artifact set goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportSink {
    /// Write under an output directory, respond with the file list
    Files,
    /// Bundle into one in-memory zip archive, respond with the bytes
    Archive,
}

/// POST /api/export/annotations
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub image_id: String,
    #[serde(default)]
    pub prompt: Option<String>,
    pub instances: Vec<InstancePayload>,
    #[serde(default = "default_sink")]
    pub sink: ExportSink,
}

fn default_sink() -> ExportSink {
    ExportSink::Files
}

fn validate_threshold(threshold: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::InvalidInput(format!(
            "confidence_threshold must be in [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refine_requires_points_or_boxes() {
        let req = RefineRequest {
            image_id: "img".to_string(),
            points: None,
            boxes: Some(vec![]),
        };
        assert!(req.validate().is_err());

        let req = RefineRequest {
            image_id: "img".to_string(),
            points: Some(vec![PointPrompt {
                x: 1.0,
                y: 2.0,
                label: 1,
            }]),
            boxes: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn batch_request_rejects_bad_threshold() {
        let req = BatchRequest {
            input_folder: "/in".to_string(),
            output_folder: None,
            prompts: vec!["cat".to_string()],
            confidence_threshold: 1.5,
            export_format: ExportFormat::Coco,
            include_video: false,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn batch_request_defaults_deserialize() {
        let req: BatchRequest = serde_json::from_str(
            r#"{"input_folder": "/in", "prompts": ["dog"]}"#,
        )
        .unwrap();
        assert_eq!(req.confidence_threshold, 0.5);
        assert_eq!(req.export_format, ExportFormat::Coco);
        assert!(!req.include_video);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn unsupported_export_format_is_rejected() {
        let result: std::result::Result<BatchRequest, _> = serde_json::from_str(
            r#"{"input_folder": "/in", "prompts": ["dog"], "export_format": "yolo"}"#,
        );
        assert!(result.is_err());
    }
}
