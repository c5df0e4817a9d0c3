//! Stage adapters — one trait per external model capability.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                  PipelineCoordinator                       │
//! │                                                            │
//! │   Arc<dyn TextGenerator>   ──▶  chat-completions service   │
//! │   Arc<dyn SpeechSynthesizer> ─▶  TTS / voice-clone service │
//! │   Arc<dyn VideoRenderer>   ──▶  lip-sync render service    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each adapter is the structured-error boundary between unreliable external
//! model code and the orchestration core: every underlying fault is caught
//! and converted into a [`StageError`] — nothing escapes as a raw crash.
//!
//! Adapters report progress through a typed `(percent, message)` sink.  The
//! percent is stage-local (0–100); the coordinator maps it onto the global
//! scale.  An adapter with no intermediate signal still reports 100% before
//! returning so the coordinator can advance.

pub mod speech;
pub mod text;
pub mod video;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use speech::ApiSpeechSynthesizer;
pub use text::ApiTextGenerator;
pub use video::ApiVideoRenderer;

// ---------------------------------------------------------------------------
// Progress sink
// ---------------------------------------------------------------------------

/// Typed stage-local progress sink: `(percent_within_stage, message)`.
///
/// Invoked zero or more times while a stage runs.  Must be cheap and
/// non-blocking — implementations write through the task store under a
/// short lock.
pub type ProgressFn = dyn Fn(u8, &str) + Send + Sync;

// ---------------------------------------------------------------------------
// StageError
// ---------------------------------------------------------------------------

/// Errors that can surface from a stage adapter.
///
/// All variants carry a human-readable description; the coordinator records
/// the rendered form verbatim into the task's `error` field, so the end
/// user sees exactly what the boundary reported.
#[derive(Debug, Error)]
pub enum StageError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The call did not complete within the configured timeout.
    #[error("stage timed out")]
    Timeout,

    /// The service response could not be parsed as expected JSON.
    #[error("failed to parse service response: {0}")]
    Parse(String),

    /// The service returned a response with no usable content.
    #[error("service returned an empty result")]
    Empty,

    /// The service itself reported a failure.
    #[error("{0}")]
    Service(String),
}

impl From<reqwest::Error> for StageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StageError::Timeout
        } else {
            StageError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

/// Result of the text-generation stage.
#[derive(Debug, Clone)]
pub struct TextOutput {
    /// Generated reply text, fed to the speech stage.
    pub text: String,
    pub word_count: usize,
    pub char_count: usize,
    /// Which model produced the text (echoed into the metadata document).
    pub model: String,
}

impl TextOutput {
    /// Build an output from raw text, deriving the counts.
    pub fn from_text(text: String, model: String) -> Self {
        let word_count = text.split_whitespace().count();
        let char_count = text.chars().count();
        Self {
            text,
            word_count,
            char_count,
            model,
        }
    }
}

/// Result of the speech-synthesis stage.
#[derive(Debug, Clone)]
pub struct SpeechOutput {
    /// Where the TTS service wrote the audio file.
    pub audio_path: PathBuf,
    pub duration_secs: f64,
    pub sample_rate: u32,
    /// Voice identifier used for synthesis.
    pub voice: String,
}

/// Result of the video-rendering stage.
#[derive(Debug, Clone)]
pub struct VideoOutput {
    /// Where the lip-sync service wrote the video file.
    pub video_path: PathBuf,
    pub duration_secs: f64,
    pub fps: u32,
    pub size_px: u32,
    pub frames: u64,
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Async trait for the text-generation capability.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (wrapped in `Arc<dyn TextGenerator>`).
///
/// # Arguments
/// * `prompt` – The user's prompt for the preview.
/// * `style`  – Optional persona style instruction (distilled from the
///              uploaded writing sample); `None` for the raw base model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        style: Option<&str>,
        progress: &ProgressFn,
    ) -> Result<TextOutput, StageError>;
}

/// Async trait for the voice-cloning / TTS capability.
///
/// `voice` names a speaker profile the service already holds (created by
/// the wizard's voice-upload step, outside this core).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        progress: &ProgressFn,
    ) -> Result<SpeechOutput, StageError>;
}

/// Async trait for the lip-sync video capability.
///
/// The renderer's own progress signal is forwarded through the sink as
/// typed `(percent, message)` pairs — the core never parses progress out of
/// message strings.
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    async fn render(
        &self,
        face_image: &Path,
        audio_path: &Path,
        progress: &ProgressFn,
    ) -> Result<VideoOutput, StageError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
