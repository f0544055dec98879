//! Data models for segmark-server

pub mod batch_job;
pub mod instance;
pub mod requests;

pub use batch_job::{BatchJob, ExportFormat, JobConfig, JobSnapshot, JobState, UnitOutcome, UnitResult};
pub use instance::{BBox, BitMask, Instance, MaskGrid};
pub use requests::{
    BatchRequest, ExportRequest, ExportSink, InstancePayload, PointPrompt, RefineRequest,
    TextPromptRequest, VideoPromptRequest,
};
