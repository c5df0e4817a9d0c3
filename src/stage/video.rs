//! `ApiVideoRenderer` — lip-sync video rendering via an HTTP render service.
//!
//! Rendering is the long pole of the pipeline (seconds to tens of minutes),
//! so the service runs it as its own job: the adapter submits the render,
//! then polls the job endpoint and forwards the service's native
//! `(percent, stage)` signal through the typed progress sink.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::VideoServiceConfig;

use super::{ProgressFn, StageError, VideoOutput, VideoRenderer};

// Per-request timeout for submit/poll calls.  The stage-wide budget is
// enforced by the coordinator; individual HTTP round trips are short.
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Response of `POST /render`.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Response of `GET /jobs/{job_id}`.
#[derive(Debug, Deserialize)]
struct JobResponse {
    status: String,
    #[serde(default)]
    progress: u8,
    /// Renderer's own sub-stage label (e.g. "extracting face landmarks").
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    video_path: Option<String>,
    #[serde(default)]
    duration_secs: Option<f64>,
    #[serde(default)]
    fps: Option<u32>,
    #[serde(default)]
    size_px: Option<u32>,
    #[serde(default)]
    frames: Option<u64>,
}

// ---------------------------------------------------------------------------
// ApiVideoRenderer
// ---------------------------------------------------------------------------

/// Submits a render job to `{base_url}/render` and polls
/// `{base_url}/jobs/{job_id}` until it finishes.
pub struct ApiVideoRenderer {
    client: reqwest::Client,
    config: VideoServiceConfig,
}

impl ApiVideoRenderer {
    /// Build an `ApiVideoRenderer` from application config.
    pub fn from_config(config: &VideoServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    async fn submit(&self, face_image: &Path, audio_path: &Path) -> Result<String, StageError> {
        let url = format!("{}/render", self.config.base_url);

        let body = serde_json::json!({
            "face_image": face_image.display().to_string(),
            "audio_path": audio_path.display().to_string(),
            "fps":        self.config.fps,
            "size_px":    self.config.size_px,
        });

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(StageError::Service(format!(
                "Video generation failed: {status} {detail}"
            )));
        }

        let payload: SubmitResponse = response
            .json()
            .await
            .map_err(|e| StageError::Parse(e.to_string()))?;

        Ok(payload.job_id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobResponse, StageError> {
        let url = format!("{}/jobs/{}", self.config.base_url, job_id);
        let response = self.client.get(&url).send().await?;
        response
            .json()
            .await
            .map_err(|e| StageError::Parse(e.to_string()))
    }
}

#[async_trait]
impl VideoRenderer for ApiVideoRenderer {
    async fn render(
        &self,
        face_image: &Path,
        audio_path: &Path,
        progress: &ProgressFn,
    ) -> Result<VideoOutput, StageError> {
        progress(0, "Rendering talking-head video");

        let job_id = self.submit(face_image, audio_path).await?;
        log::debug!("video: render job submitted ({job_id})");

        let interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            tokio::time::sleep(interval).await;

            let job = self.poll(&job_id).await?;

            match job.status.as_str() {
                "running" | "queued" => {
                    // Forward the renderer's native signal as a typed pair;
                    // the message may carry the sub-stage label.
                    let message = match job.stage.as_deref() {
                        Some(stage) => format!("Rendering video: {stage}"),
                        None => "Rendering video".to_string(),
                    };
                    progress(job.progress.min(99), &message);
                }
                "completed" => {
                    progress(100, "Video rendered");
                    return Ok(VideoOutput {
                        video_path: PathBuf::from(job.video_path.ok_or(StageError::Empty)?),
                        duration_secs: job.duration_secs.unwrap_or(0.0),
                        fps: job.fps.unwrap_or(self.config.fps),
                        size_px: job.size_px.unwrap_or(self.config.size_px),
                        frames: job.frames.unwrap_or(0),
                    });
                }
                "failed" => {
                    let reason = job.error.unwrap_or_else(|| "unknown renderer error".into());
                    return Err(StageError::Service(format!(
                        "Video generation failed: {reason}"
                    )));
                }
                other => {
                    return Err(StageError::Parse(format!(
                        "unexpected render job status {other:?}"
                    )));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> VideoServiceConfig {
        VideoServiceConfig {
            base_url: "http://localhost:8030".into(),
            fps: 12,
            size_px: 256,
            poll_interval_ms: 10,
            timeout_secs: 60,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _renderer = ApiVideoRenderer::from_config(&make_config());
    }

    #[test]
    fn renderer_is_object_safe() {
        let renderer: Box<dyn VideoRenderer> =
            Box::new(ApiVideoRenderer::from_config(&make_config()));
        drop(renderer);
    }

    #[test]
    fn job_response_parses_partial_payload() {
        // A mid-render poll carries only status/progress/stage.
        let json = r#"{"status": "running", "progress": 42, "stage": "face landmarks"}"#;
        let parsed: JobResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, "running");
        assert_eq!(parsed.progress, 42);
        assert_eq!(parsed.stage.as_deref(), Some("face landmarks"));
        assert!(parsed.video_path.is_none());
    }

    #[test]
    fn job_response_parses_completed_payload() {
        let json = r#"{
            "status": "completed",
            "progress": 100,
            "video_path": "/out/v.mp4",
            "duration_secs": 4.5,
            "fps": 12,
            "size_px": 256,
            "frames": 54
        }"#;
        let parsed: JobResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, "completed");
        assert_eq!(parsed.video_path.as_deref(), Some("/out/v.mp4"));
        assert_eq!(parsed.frames, Some(54));
    }
}
