//! Shared test helpers: scripted inference engine and image fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use segmark_common::{Error, Result};
use segmark_server::engine::{InferenceEngine, SegmentOutputs, StateHandle};
use segmark_server::models::{BBox, MaskGrid, PointPrompt};
use segmark_server::services::StorageService;
use segmark_server::AppState;

/// What the scripted engine does on segmentation calls
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Return `masks_per_call` full masks of `mask_size` (height, width)
    Succeed {
        masks_per_call: usize,
        mask_size: (usize, usize),
    },
    /// Fail every segmentation unit with an Upstream error
    FailUnits,
}

/// Deterministic in-process stand-in for the external inference engine.
/// Records every call for assertions.
pub struct ScriptedEngine {
    pub behavior: Behavior,
    pub segment_prompts: Mutex<Vec<String>>,
    pub video_prompts: Mutex<Vec<String>>,
    pub started_sessions: Mutex<Vec<String>>,
    pub ended_sessions: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            segment_prompts: Mutex::new(Vec::new()),
            video_prompts: Mutex::new(Vec::new()),
            started_sessions: Mutex::new(Vec::new()),
            ended_sessions: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        })
    }

    fn outputs(&self, with_state: bool) -> Result<SegmentOutputs> {
        match self.behavior {
            Behavior::FailUnits => Err(Error::Upstream("engine unavailable".to_string())),
            Behavior::Succeed {
                masks_per_call,
                mask_size: (height, width),
            } => {
                let mask = MaskGrid {
                    rows: vec![vec![1.0; width]; height],
                };
                let state = with_state.then(|| {
                    StateHandle(format!(
                        "state-{}",
                        self.counter.fetch_add(1, Ordering::SeqCst)
                    ))
                });
                Ok(SegmentOutputs {
                    masks: vec![mask; masks_per_call],
                    boxes: vec![
                        BBox {
                            x1: 0.0,
                            y1: 0.0,
                            x2: width as f32,
                            y2: height as f32,
                        };
                        masks_per_call
                    ],
                    scores: vec![0.9; masks_per_call],
                    state,
                })
            }
        }
    }
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    async fn segment_with_text(
        &self,
        _image: &[u8],
        prompt: &str,
        _confidence_threshold: f32,
    ) -> Result<SegmentOutputs> {
        self.segment_prompts.lock().unwrap().push(prompt.to_string());
        self.outputs(true)
    }

    async fn refine_with_points(
        &self,
        _state: &StateHandle,
        _points: &[PointPrompt],
    ) -> Result<SegmentOutputs> {
        self.outputs(false)
    }

    async fn refine_with_box(&self, _state: &StateHandle, _bbox: BBox) -> Result<SegmentOutputs> {
        self.outputs(false)
    }

    async fn start_video_session(&self, _resource_path: &Path) -> Result<String> {
        if matches!(self.behavior, Behavior::FailUnits) {
            return Err(Error::Upstream("engine unavailable".to_string()));
        }
        let session_id = format!("vs-{}", self.counter.fetch_add(1, Ordering::SeqCst));
        self.started_sessions.lock().unwrap().push(session_id.clone());
        Ok(session_id)
    }

    async fn add_video_prompt(
        &self,
        _session_id: &str,
        _frame_index: u32,
        text: &str,
        _confidence_threshold: f32,
    ) -> Result<SegmentOutputs> {
        self.video_prompts.lock().unwrap().push(text.to_string());
        self.outputs(false)
    }

    async fn end_video_session(&self, session_id: &str) -> Result<()> {
        self.ended_sessions.lock().unwrap().push(session_id.to_string());
        Ok(())
    }
}

/// Write a small solid PNG at `dir/name`
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([40, 80, 120, 255]));
    img.save(&path).unwrap();
    path
}

/// App state over a scripted engine and tempdir-backed storage
pub fn test_state(engine: Arc<ScriptedEngine>, data_dir: &Path) -> AppState {
    let storage = Arc::new(StorageService::new(data_dir).unwrap());
    AppState::new(engine, storage)
}
