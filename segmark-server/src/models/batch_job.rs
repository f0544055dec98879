//! Batch job state machine
//!
//! Jobs progress PENDING → PROCESSING → {COMPLETED, FAILED}. Transitions are
//! monotonic: a job never re-enters an earlier state, and terminal states are
//! sticky. Exactly one worker mutates a job's mutable fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Batch job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// Ordering rank used to enforce monotonic transitions
    fn rank(self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Processing => 1,
            JobState::Completed | JobState::Failed => 2,
        }
    }
}

/// Artifact selection for a batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// COCO annotations.json only
    Coco,
    /// Per-instance mask PNGs only
    MaskPng,
    /// Both artifact kinds
    Both,
}

impl ExportFormat {
    pub fn wants_coco(self) -> bool {
        matches!(self, ExportFormat::Coco | ExportFormat::Both)
    }

    pub fn wants_masks(self) -> bool {
        matches!(self, ExportFormat::MaskPng | ExportFormat::Both)
    }
}

/// Immutable configuration captured at job creation
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub input_folder: PathBuf,
    /// Fresh, collision-free directory the job writes into
    pub output_folder: PathBuf,
    pub prompts: Vec<String>,
    pub confidence_threshold: f32,
    pub export_format: ExportFormat,
    pub include_video: bool,
}

/// Outcome of one file×prompt unit
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitResult {
    Succeeded { instances: usize },
    Failed { message: String },
}

/// Per-unit record accumulated into the job report
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub file: String,
    pub prompt: String,
    #[serde(flatten)]
    pub result: UnitResult,
}

/// One batch job record
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub job_id: Uuid,
    pub state: JobState,
    pub progress: f64,
    pub total_files: usize,
    pub processed_files: usize,
    pub current_file: Option<String>,
    pub error: Option<String>,
    pub config: JobConfig,
    /// Enumerated input files, in processing order
    pub files: Vec<PathBuf>,
    /// Per-unit outcome report
    pub report: Vec<UnitOutcome>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    pub fn new(job_id: Uuid, config: JobConfig, files: Vec<PathBuf>) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            progress: 0.0,
            total_files: files.len(),
            processed_files: 0,
            current_file: None,
            error: None,
            config,
            files,
            report: Vec::new(),
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state. Backward transitions are ignored: terminal
    /// states are sticky and a job never re-enters pending or processing.
    pub fn transition_to(&mut self, new_state: JobState) {
        if new_state.rank() < self.state.rank() {
            tracing::warn!(
                job_id = %self.job_id,
                from = ?self.state,
                to = ?new_state,
                "Ignoring backward job state transition"
            );
            return;
        }
        if self.is_terminal() {
            return;
        }
        self.state = new_state;
        if self.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobState::Completed | JobState::Failed)
    }

    /// Record completion of one file and recompute progress
    pub fn file_completed(&mut self) {
        self.processed_files += 1;
        self.progress = self.processed_files as f64 / self.total_files.max(1) as f64;
    }

    /// Immutable status snapshot for polling
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id,
            status: self.state,
            progress: self.progress,
            total_files: self.total_files,
            processed_files: self.processed_files,
            current_file: self.current_file.clone(),
            error: self.error.clone(),
        }
    }
}

/// Status surface returned by polling
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobState,
    pub progress: f64,
    pub total_files: usize,
    pub processed_files: usize,
    pub current_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
