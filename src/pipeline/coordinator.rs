//! Pipeline coordinator — drives one task through text → speech → video →
//! finalize, owning every status transition along the way.
//!
//! # Pipeline flow
//!
//! ```text
//! PreviewJob {task_id, prompt, use_sample}
//!   └─▶ [GeneratingText]    text.generate(prompt, style)
//!         └─▶ [GeneratingSpeech]  speech.synthesize(text, voice)
//!               └─▶ [GeneratingVideo]   video.render(face, audio)
//!                     └─▶ [Finalizing]  write preview metadata
//!                           └─▶ [Completed]  result populated
//!
//! any stage error ─▶ [Failed]  (reason recorded verbatim, progress kept)
//! cancel flag observed at a stage boundary ─▶ [Cancelled]
//! ```
//!
//! Cancellation is cooperative and boundary-granular: an external call
//! already in flight is allowed to finish and its output is discarded.
//! Progress callbacks land through [`TaskStore::update`], which rejects
//! writes to frozen records, so a late callback can never resurrect a
//! finished task.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{AppConfig, PersonaConfig};
use crate::stage::{
    SpeechOutput, SpeechSynthesizer, StageError, TextGenerator, TextOutput, VideoOutput,
    VideoRenderer,
};
use crate::task::{PreviewResult, StoreError, TaskStatus, TaskStore};

use super::progress::{PipelineSpans, StageSpan};

// ---------------------------------------------------------------------------
// PreviewJob
// ---------------------------------------------------------------------------

/// Everything the coordinator needs to run one task.
#[derive(Debug, Clone)]
pub struct PreviewJob {
    /// Task record already created in the store by the API.
    pub task_id: Uuid,
    /// The user's prompt.
    pub prompt: String,
    /// Use the built-in sample persona instead of the configured one.
    pub use_sample: bool,
}

// ---------------------------------------------------------------------------
// PipelineCoordinator
// ---------------------------------------------------------------------------

/// Sequences the stage adapters for each task and owns all task store
/// mutation during a run.
///
/// One coordinator instance serves the whole process; each task runs in its
/// own spawned tokio task, so a slow video render for one task never blocks
/// status reads or other tasks.
pub struct PipelineCoordinator {
    store: TaskStore,
    text: Arc<dyn TextGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    video: Arc<dyn VideoRenderer>,
    persona: PersonaConfig,
    sample_persona: PersonaConfig,
    spans: PipelineSpans,
    text_timeout: Duration,
    speech_timeout: Duration,
    video_timeout: Duration,
    total_budget: Duration,
    artifacts_dir: PathBuf,
    outputs_dir: PathBuf,
}

impl PipelineCoordinator {
    /// Create a new coordinator.
    ///
    /// # Arguments
    ///
    /// * `store`  — shared task store (also read by the API handlers).
    /// * `text` / `speech` / `video` — stage adapters (HTTP implementations
    ///   in production, mocks in tests).
    /// * `config` — stage weights, timeouts and the persona profile.
    /// * `artifacts_dir` — where persona face references live.
    /// * `outputs_dir` — where preview metadata documents are written.
    pub fn new(
        store: TaskStore,
        text: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        video: Arc<dyn VideoRenderer>,
        config: &AppConfig,
        artifacts_dir: PathBuf,
        outputs_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            text,
            speech,
            video,
            persona: config.persona.clone(),
            sample_persona: PersonaConfig::sample(),
            spans: PipelineSpans::from_weights(&config.pipeline.weights),
            text_timeout: Duration::from_secs(config.text.timeout_secs),
            speech_timeout: Duration::from_secs(config.speech.timeout_secs),
            video_timeout: Duration::from_secs(config.video.timeout_secs),
            total_budget: Duration::from_secs(config.pipeline.total_timeout_secs),
            artifacts_dir,
            outputs_dir,
        }
    }

    /// Fire-and-forget: run `job` on its own tokio task.
    ///
    /// The API returns to the client immediately after calling this;
    /// completion is observed only by polling.  A panic inside the run is
    /// contained by the spawned task and cannot take down the server.
    pub fn spawn(self: &Arc<Self>, job: PreviewJob) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.run(job).await;
        });
    }

    // -----------------------------------------------------------------------
    // Main sequence
    // -----------------------------------------------------------------------

    /// Drive one task through the full stage sequence.
    pub async fn run(&self, job: PreviewJob) {
        let task_id = job.task_id;
        let started = Instant::now();

        let persona = if job.use_sample {
            &self.sample_persona
        } else {
            &self.persona
        };

        log::info!(
            "task {task_id}: pipeline started (persona {:?})",
            persona.name
        );

        // ── 1. Text generation ──────────────────────────────────────────
        if self.stopped_at_boundary(task_id, started) {
            return;
        }
        if !self.enter_stage(
            task_id,
            TaskStatus::GeneratingText,
            self.spans.text,
            "Generating reply text",
        ) {
            return;
        }

        let sink = self.stage_sink(task_id, self.spans.text);
        let text_out: TextOutput = match self
            .with_timeout(
                self.text_timeout,
                self.text
                    .generate(&job.prompt, persona.style_prompt.as_deref(), &sink),
            )
            .await
        {
            Ok(out) => out,
            Err(e) => {
                self.fail(task_id, e);
                return;
            }
        };

        log::debug!(
            "task {task_id}: text stage done ({} words)",
            text_out.word_count
        );

        // ── 2. Speech synthesis ─────────────────────────────────────────
        if self.stopped_at_boundary(task_id, started) {
            return;
        }
        if !self.enter_stage(
            task_id,
            TaskStatus::GeneratingSpeech,
            self.spans.speech,
            "Synthesizing speech in the persona's voice",
        ) {
            return;
        }

        let sink = self.stage_sink(task_id, self.spans.speech);
        let speech_out: SpeechOutput = match self
            .with_timeout(
                self.speech_timeout,
                self.speech
                    .synthesize(&text_out.text, &persona.voice, &sink),
            )
            .await
        {
            Ok(out) => out,
            Err(e) => {
                self.fail(task_id, e);
                return;
            }
        };

        log::debug!(
            "task {task_id}: speech stage done ({})",
            speech_out.audio_path.display()
        );

        // ── 3. Video rendering ──────────────────────────────────────────
        if self.stopped_at_boundary(task_id, started) {
            return;
        }
        if !self.enter_stage(
            task_id,
            TaskStatus::GeneratingVideo,
            self.spans.video,
            "Rendering talking-head video",
        ) {
            return;
        }

        let face_image = self.resolve_face(persona);
        let sink = self.stage_sink(task_id, self.spans.video);
        let video_out: VideoOutput = match self
            .with_timeout(
                self.video_timeout,
                self.video
                    .render(&face_image, &speech_out.audio_path, &sink),
            )
            .await
        {
            Ok(out) => out,
            Err(e) => {
                self.fail(task_id, e);
                return;
            }
        };

        log::debug!(
            "task {task_id}: video stage done ({})",
            video_out.video_path.display()
        );

        // ── 4. Finalize ─────────────────────────────────────────────────
        if self.stopped_at_boundary(task_id, started) {
            return;
        }
        if !self.enter_stage(
            task_id,
            TaskStatus::Finalizing,
            self.spans.finalize,
            "Finalizing preview",
        ) {
            return;
        }

        if let Err(e) = self
            .write_metadata(task_id, &job, &persona.name, &text_out, &speech_out, &video_out)
            .await
        {
            self.fail(
                task_id,
                StageError::Service(format!("Failed to write preview metadata: {e}")),
            );
            return;
        }

        let result = PreviewResult {
            video_path: video_out.video_path.display().to_string(),
            audio_path: speech_out.audio_path.display().to_string(),
            duration_secs: video_out.duration_secs,
            fps: video_out.fps,
            size_px: video_out.size_px,
            frames: video_out.frames,
        };

        match self.store.update(task_id, |r| {
            r.status = TaskStatus::Completed;
            r.progress = 100;
            r.message = Some("Preview ready".into());
            r.result = Some(result.clone());
        }) {
            Ok(_) => log::info!("task {task_id}: pipeline completed"),
            Err(e) => log::warn!("task {task_id}: could not record completion: {e}"),
        }
    }

    // -----------------------------------------------------------------------
    // Boundary checks
    // -----------------------------------------------------------------------

    /// Returns `true` when the run must stop here: cancellation was
    /// requested, the total budget is spent, or the record is gone.
    fn stopped_at_boundary(&self, task_id: Uuid, started: Instant) -> bool {
        let record = match self.store.get(task_id) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("task {task_id}: record vanished mid-run ({e}); stopping");
                return true;
            }
        };

        if record.cancel_requested {
            let outcome = self.store.update(task_id, |r| {
                r.status = TaskStatus::Cancelled;
                r.message = Some("Preview generation cancelled".into());
            });
            match outcome {
                Ok(_) => log::info!("task {task_id}: cancelled at stage boundary"),
                Err(e) => log::warn!("task {task_id}: could not record cancellation: {e}"),
            }
            return true;
        }

        if started.elapsed() >= self.total_budget {
            self.fail(
                task_id,
                StageError::Service(format!(
                    "Preview generation exceeded the total time budget of {}s",
                    self.total_budget.as_secs()
                )),
            );
            return true;
        }

        false
    }

    /// Move the record into `status` with its baseline progress.  Returns
    /// `false` when the record refused the transition (already terminal or
    /// missing), meaning the run must stop.
    fn enter_stage(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        span: StageSpan,
        message: &str,
    ) -> bool {
        let outcome = self.store.update(task_id, |r| {
            r.status = status;
            r.progress = r.progress.max(span.start);
            r.message = Some(message.to_owned());
        });

        match outcome {
            Ok(_) => {
                log::debug!("task {task_id}: entering {}", status.as_str());
                true
            }
            Err(e) => {
                log::warn!("task {task_id}: cannot enter {}: {e}", status.as_str());
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Build the stage-local progress sink for `span`.
    ///
    /// Global progress is clamped monotone here, and writes against a
    /// frozen record are discarded — both invariants live in one place.
    fn stage_sink(&self, task_id: Uuid, span: StageSpan) -> impl Fn(u8, &str) + Send + Sync {
        let store = self.store.clone();
        move |local, message| {
            let global = span.map(local);
            let outcome = store.update(task_id, |r| {
                if global > r.progress {
                    r.progress = global;
                }
                r.message = Some(message.to_owned());
            });
            match outcome {
                Ok(_) => {}
                Err(StoreError::TaskFinished(_)) => {
                    log::debug!("task {task_id}: dropped stale progress update ({global}%)");
                }
                Err(StoreError::NotFound(_)) => {
                    log::debug!("task {task_id}: dropped progress update for missing record");
                }
                Err(StoreError::Saturated) => {
                    log::debug!("task {task_id}: dropped progress update (store saturated)");
                }
            }
        }
    }

    /// Wrap a stage call in its configured wall-clock timeout.
    async fn with_timeout<T>(
        &self,
        timeout: Duration,
        fut: impl std::future::Future<Output = Result<T, StageError>>,
    ) -> Result<T, StageError> {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StageError::Timeout),
        }
    }

    /// Freeze the record as failed, recording the stage's reason verbatim.
    /// Progress is deliberately left where the stage got to.
    fn fail(&self, task_id: Uuid, error: StageError) {
        let reason = error.to_string();
        log::error!("task {task_id}: pipeline failed: {reason}");

        let outcome = self.store.update(task_id, |r| {
            r.status = TaskStatus::Failed;
            r.error = Some(reason.clone());
        });
        if let Err(e) = outcome {
            log::warn!("task {task_id}: could not record failure: {e}");
        }
    }

    /// Face reference paths from the persona profile are relative to the
    /// artifacts directory unless absolute.
    fn resolve_face(&self, persona: &PersonaConfig) -> PathBuf {
        if persona.face_ref.is_absolute() {
            persona.face_ref.clone()
        } else {
            self.artifacts_dir.join(&persona.face_ref)
        }
    }

    /// Write `preview_{task_id}_metadata.json` next to the generated
    /// outputs: a self-describing summary of what each stage produced.
    async fn write_metadata(
        &self,
        task_id: Uuid,
        job: &PreviewJob,
        persona_name: &str,
        text: &TextOutput,
        speech: &SpeechOutput,
        video: &VideoOutput,
    ) -> anyhow::Result<()> {
        let metadata = serde_json::json!({
            "task_id": task_id,
            "persona": persona_name,
            "prompt": job.prompt,
            "generated_at": Utc::now(),
            "text": {
                "generated_text": text.text,
                "word_count": text.word_count,
                "char_count": text.char_count,
                "model": text.model,
            },
            "speech": {
                "audio_path": speech.audio_path,
                "duration_secs": speech.duration_secs,
                "sample_rate": speech.sample_rate,
                "voice": speech.voice,
            },
            "video": {
                "video_path": video.video_path,
                "duration_secs": video.duration_secs,
                "fps": video.fps,
                "size_px": video.size_px,
                "frames": video.frames,
            },
        });

        tokio::fs::create_dir_all(&self.outputs_dir).await?;
        let path = self
            .outputs_dir
            .join(format!("preview_{task_id}_metadata.json"));
        tokio::fs::write(&path, serde_json::to_vec_pretty(&metadata)?).await?;

        log::debug!("task {task_id}: metadata written to {}", path.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
