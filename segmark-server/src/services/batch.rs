//! Batch job engine
//!
//! Walks a file×prompt matrix over an input folder, strictly sequentially:
//! the inference context for an image is memory-heavy, so each file's cached
//! state is cleared as soon as its prompts finish, bounding peak engine
//! memory to one file's worth regardless of job size. Per-unit failures are
//! recorded and skipped; failures outside the unit loop fail the whole job.
//!
//! Job execution runs on a background task per job; the engine retains the
//! JoinHandle. Progress is observed only by polling `get_job_status`.

use chrono::Utc;
use segmark_common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::engine::InferenceEngine;
use crate::export::{self, raster, CocoDataset};
use crate::models::{
    BatchJob, BatchRequest, Instance, JobConfig, JobSnapshot, JobState, UnitOutcome, UnitResult,
};
use crate::services::media_scanner::{is_video_path, MediaScanner};
use crate::services::session_store::{EntityState, SessionStore};
use crate::services::storage::StorageService;

/// Orchestrates batch segmentation jobs
pub struct BatchEngine {
    engine: Arc<dyn InferenceEngine>,
    sessions: Arc<SessionStore>,
    storage: Arc<StorageService>,
    jobs: RwLock<HashMap<Uuid, BatchJob>>,
    workers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl BatchEngine {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        sessions: Arc<SessionStore>,
        storage: Arc<StorageService>,
    ) -> Self {
        Self {
            engine,
            sessions,
            storage,
            jobs: RwLock::new(HashMap::new()),
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Enumerate input files, create the job's output folder, and register
    /// the job record. Returns the id synchronously — no inference work
    /// happens before return.
    pub async fn create_job(&self, request: &BatchRequest) -> Result<Uuid> {
        request.validate()?;

        let input_folder = PathBuf::from(&request.input_folder);
        let scanner = MediaScanner::new(request.include_video);
        let files = scanner.scan(&input_folder)?;

        let job_id = Uuid::new_v4();
        let folder_name = format!("batch_{}_{}", job_id, Utc::now().format("%Y%m%d_%H%M%S"));
        let output_folder = match request.output_folder.as_deref().filter(|s| !s.is_empty()) {
            Some(base) => {
                let folder = Path::new(base).join(&folder_name);
                std::fs::create_dir_all(&folder)?;
                folder
            }
            None => self.storage.create_output_folder(&folder_name)?,
        };

        let config = JobConfig {
            input_folder,
            output_folder,
            prompts: request.prompts.clone(),
            confidence_threshold: request.confidence_threshold,
            export_format: request.export_format,
            include_video: request.include_video,
        };

        let job = BatchJob::new(job_id, config, files);
        tracing::info!(
            job_id = %job_id,
            total_files = job.total_files,
            prompts = job.config.prompts.len(),
            "Batch job created"
        );
        self.jobs.write().await.insert(job_id, job);
        Ok(job_id)
    }

    /// Spawn the job's worker task and retain its handle
    pub async fn spawn_worker(self: &Arc<Self>, job_id: Uuid) {
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Err(e) = engine.process_job(job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "Batch worker exited with error");
            }
        });
        self.workers.lock().await.insert(job_id, handle);
    }

    /// Execute the job to a terminal state. Any error escaping the per-unit
    /// loop marks the job failed with the captured message.
    pub async fn process_job(&self, job_id: Uuid) -> Result<()> {
        match self.run_job(job_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Batch job failed");
                self.update_job(job_id, |job| {
                    job.error = Some(e.to_string());
                    job.transition_to(JobState::Failed);
                })
                .await;
                Err(e)
            }
        }
    }

    /// Immutable status snapshot for polling. Never creates a job.
    pub async fn get_job_status(&self, job_id: Uuid) -> Result<JobSnapshot> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(BatchJob::snapshot)
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))
    }

    /// Per-unit outcome report accumulated while the job ran
    pub async fn job_report(&self, job_id: Uuid) -> Result<Vec<UnitOutcome>> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|job| job.report.clone())
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))
    }

    /// Output folder and state for a job (download endpoint)
    pub async fn job_output(&self, job_id: Uuid) -> Result<(PathBuf, JobState)> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|job| (job.config.output_folder.clone(), job.state))
            .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))
    }

    async fn run_job(&self, job_id: Uuid) -> Result<()> {
        let (config, files) = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(&job_id)
                .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;
            if job.state != JobState::Pending {
                return Err(Error::InvalidInput(format!(
                    "Job {} already started; create a new job instead",
                    job_id
                )));
            }
            job.transition_to(JobState::Processing);
            (job.config.clone(), job.files.clone())
        };

        tracing::info!(
            job_id = %job_id,
            total_files = files.len(),
            output_folder = %config.output_folder.display(),
            "Batch job processing"
        );

        let mut dataset = CocoDataset::from_prompts(&config.prompts);
        let mut next_annotation_id: u64 = 1;

        if files.is_empty() {
            // nothing to walk: progress is defined as 1.0, not a division
            self.finish_job(job_id, &config, &dataset).await?;
            return Ok(());
        }

        for (file_idx, file_path) in files.iter().enumerate() {
            let file_name = file_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let entity_id = format!("batch-{}-{}", job_id, file_idx);

            self.update_job(job_id, |job| {
                job.current_file = Some(file_name.clone());
            })
            .await;

            if is_video_path(file_path) {
                self.process_video_file(
                    job_id,
                    &config,
                    file_idx,
                    file_path,
                    &file_name,
                    &entity_id,
                    &mut dataset,
                    &mut next_annotation_id,
                )
                .await;
            } else {
                self.process_image_file(
                    job_id,
                    &config,
                    file_idx,
                    file_path,
                    &file_name,
                    &entity_id,
                    &mut dataset,
                    &mut next_annotation_id,
                )
                .await;
            }

            // one inference context alive at a time; for videos this also
            // ends the engine session
            self.sessions.clear(&entity_id).await;

            self.update_job(job_id, BatchJob::file_completed).await;
        }

        self.finish_job(job_id, &config, &dataset).await?;
        Ok(())
    }

    /// Top-level completion: serialize annotations when requested, then
    /// transition to completed. A failure here fails the whole job.
    async fn finish_job(&self, job_id: Uuid, config: &JobConfig, dataset: &CocoDataset) -> Result<()> {
        if config.export_format.wants_coco() {
            let path = config.output_folder.join("annotations.json");
            dataset.write_to(&path)?;
            tracing::info!(job_id = %job_id, path = %path.display(), "Annotations serialized");
        }

        self.update_job(job_id, |job| {
            job.current_file = None;
            job.progress = 1.0;
            job.transition_to(JobState::Completed);
        })
        .await;

        tracing::info!(job_id = %job_id, "Batch job completed");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_image_file(
        &self,
        job_id: Uuid,
        config: &JobConfig,
        file_idx: usize,
        file_path: &Path,
        file_name: &str,
        entity_id: &str,
        dataset: &mut CocoDataset,
        next_annotation_id: &mut u64,
    ) {
        // a file that cannot be decoded fails every one of its units, not
        // the whole job
        let loaded = std::fs::read(file_path)
            .map_err(Error::from)
            .and_then(|bytes| {
                image::image_dimensions(file_path)
                    .map(|dims| (bytes, dims))
                    .map_err(|e| {
                        Error::InvalidInput(format!("Cannot decode {}: {}", file_name, e))
                    })
            });

        let (bytes, (width, height)) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                for prompt in &config.prompts {
                    self.record_unit_failure(job_id, file_name, prompt, &e).await;
                }
                return;
            }
        };

        dataset.add_image(file_idx, file_name, width, height);

        for (prompt_idx, prompt) in config.prompts.iter().enumerate() {
            let unit = async {
                let outputs = self
                    .engine
                    .segment_with_text(&bytes, prompt, config.confidence_threshold)
                    .await?;
                if let Some(state) = outputs.state.clone() {
                    self.sessions.put(entity_id, EntityState::Image(state)).await;
                }
                let instances = outputs.to_instances(prompt, width, height);
                if config.export_format.wants_masks() {
                    self.write_unit_masks(config, file_path, prompt, &instances)?;
                }
                Ok::<_, Error>(instances)
            }
            .await;

            match unit {
                Ok(instances) => {
                    if config.export_format.wants_coco() {
                        dataset.add_instances(
                            file_idx,
                            prompt_idx + 1,
                            &instances,
                            next_annotation_id,
                        );
                    }
                    self.record_unit_success(job_id, file_name, prompt, instances.len())
                        .await;
                }
                Err(e) => self.record_unit_failure(job_id, file_name, prompt, &e).await,
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_video_file(
        &self,
        job_id: Uuid,
        config: &JobConfig,
        file_idx: usize,
        file_path: &Path,
        file_name: &str,
        entity_id: &str,
        dataset: &mut CocoDataset,
        next_annotation_id: &mut u64,
    ) {
        let mut image_recorded = false;

        for (prompt_idx, prompt) in config.prompts.iter().enumerate() {
            let unit = async {
                // the session starts lazily on the first successful unit and
                // is released by the per-file clear
                let session_id = match self.sessions.get(entity_id).await {
                    Ok(EntityState::Video { session_id }) => session_id,
                    _ => {
                        let session_id = self.engine.start_video_session(file_path).await?;
                        self.sessions
                            .put(
                                entity_id,
                                EntityState::Video {
                                    session_id: session_id.clone(),
                                },
                            )
                            .await;
                        session_id
                    }
                };

                let outputs = self
                    .engine
                    .add_video_prompt(&session_id, 0, prompt, config.confidence_threshold)
                    .await?;

                let (width, height) = outputs.native_size().unwrap_or((0, 0));
                let instances = outputs.to_instances(prompt, width, height);
                if config.export_format.wants_masks() {
                    self.write_unit_masks(config, file_path, prompt, &instances)?;
                }
                Ok::<_, Error>((instances, width, height))
            }
            .await;

            match unit {
                Ok((instances, width, height)) => {
                    if config.export_format.wants_coco() && width > 0 && height > 0 {
                        if !image_recorded {
                            dataset.add_image(file_idx, file_name, width, height);
                            image_recorded = true;
                        }
                        dataset.add_instances(
                            file_idx,
                            prompt_idx + 1,
                            &instances,
                            next_annotation_id,
                        );
                    }
                    self.record_unit_success(job_id, file_name, prompt, instances.len())
                        .await;
                }
                Err(e) => self.record_unit_failure(job_id, file_name, prompt, &e).await,
            }
        }
    }

    /// Write per-instance mask PNGs under masks/<prompt>/ for one unit
    fn write_unit_masks(
        &self,
        config: &JobConfig,
        file_path: &Path,
        prompt: &str,
        instances: &[Instance],
    ) -> Result<()> {
        let prompt_component = export::sanitize_component(prompt);
        let prompt_dir = config
            .output_folder
            .join(export::MASKS_DIR)
            .join(&prompt_component);
        std::fs::create_dir_all(&prompt_dir)?;

        let stem = file_path
            .file_stem()
            .map(|s| export::sanitize_component(&s.to_string_lossy()))
            .unwrap_or_else(|| "file".to_string());

        for instance in instances {
            let name = format!("{}_{}_{}.png", stem, prompt_component, instance.index);
            let png = export::mask_png_bytes(&raster::mask_to_gray(&instance.mask))?;
            std::fs::write(prompt_dir.join(name), png)?;
        }
        Ok(())
    }

    async fn record_unit_success(&self, job_id: Uuid, file: &str, prompt: &str, instances: usize) {
        tracing::debug!(
            job_id = %job_id,
            file = %file,
            prompt = %prompt,
            instances,
            "Batch unit succeeded"
        );
        let outcome = UnitOutcome {
            file: file.to_string(),
            prompt: prompt.to_string(),
            result: UnitResult::Succeeded { instances },
        };
        self.update_job(job_id, |job| job.report.push(outcome)).await;
    }

    async fn record_unit_failure(&self, job_id: Uuid, file: &str, prompt: &str, error: &Error) {
        tracing::warn!(
            job_id = %job_id,
            file = %file,
            prompt = %prompt,
            error = %error,
            "Batch unit failed; continuing with next unit"
        );
        let outcome = UnitOutcome {
            file: file.to_string(),
            prompt: prompt.to_string(),
            result: UnitResult::Failed {
                message: error.to_string(),
            },
        };
        self.update_job(job_id, |job| job.report.push(outcome)).await;
    }

    async fn update_job<F: FnOnce(&mut BatchJob)>(&self, job_id: Uuid, mutate: F) {
        if let Some(job) = self.jobs.write().await.get_mut(&job_id) {
            mutate(job);
        }
    }
}
