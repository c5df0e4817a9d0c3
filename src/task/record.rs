//! Task records and the task status state machine.
//!
//! [`TaskStatus`] drives the pipeline coordinator's state machine.  Polling
//! clients read it via snapshots handed out by the
//! [`TaskStore`](crate::task::TaskStore).
//!
//! State machine:
//!
//! ```text
//! started ─▶ generating_text ─▶ generating_speech ─▶ generating_video ─▶ finalizing ─▶ completed
//!    │             │                    │                    │               │
//!    └─────────────┴────────────────────┴────────────────────┴───────────────┴─▶ failed
//! any non-terminal state ──cancel observed at a stage boundary──▶ cancelled
//! ```
//!
//! Once a terminal status lands the record is frozen: the store rejects all
//! further mutation of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// Lifecycle states of one preview-generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted; the pipeline task has been spawned but no stage has begun.
    Started,

    /// The text-generation service is producing the reply text.
    GeneratingText,

    /// The TTS service is synthesizing speech from the generated text.
    GeneratingSpeech,

    /// The lip-sync service is rendering the talking-head video.
    GeneratingVideo,

    /// All stages succeeded; the preview metadata document is being written.
    Finalizing,

    /// Terminal: the preview is ready and `result` is populated.
    Completed,

    /// Terminal: a stage failed and `error` holds the reason.
    Failed,

    /// Terminal: cancellation was observed at a stage boundary.  Neither
    /// `result` nor `error` is populated.
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` for states that freeze the record.
    ///
    /// ```
    /// use persona_preview::task::TaskStatus;
    ///
    /// assert!(!TaskStatus::Started.is_terminal());
    /// assert!(!TaskStatus::GeneratingVideo.is_terminal());
    /// assert!(TaskStatus::Completed.is_terminal());
    /// assert!(TaskStatus::Failed.is_terminal());
    /// assert!(TaskStatus::Cancelled.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// The snake_case wire form, also used as the `current_step` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Started => "started",
            TaskStatus::GeneratingText => "generating_text",
            TaskStatus::GeneratingSpeech => "generating_speech",
            TaskStatus::GeneratingVideo => "generating_video",
            TaskStatus::Finalizing => "finalizing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Started
    }
}

// ---------------------------------------------------------------------------
// PreviewResult
// ---------------------------------------------------------------------------

/// Output artifact locations and pipeline metadata, populated only when a
/// task completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResult {
    /// Path of the rendered talking-head video.
    pub video_path: String,
    /// Path of the synthesized speech audio.
    pub audio_path: String,
    /// Video duration in seconds.
    pub duration_secs: f64,
    /// Frame rate of the rendered video.
    pub fps: u32,
    /// Frame size in pixels (square frames).
    pub size_px: u32,
    /// Total rendered frame count.
    pub frames: u64,
}

// ---------------------------------------------------------------------------
// TaskRecord
// ---------------------------------------------------------------------------

/// One in-flight or finished preview-generation request.
///
/// Mutated exclusively through [`TaskStore::update`](crate::task::TaskStore);
/// everything handed to readers is a snapshot clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Opaque unique identifier, generated at creation, never reused.
    pub id: Uuid,

    /// The prompt the preview is being generated for.
    pub prompt: String,

    /// Current lifecycle state.
    pub status: TaskStatus,

    /// Global progress 0–100, monotonically non-decreasing while the task
    /// is non-terminal.
    pub progress: u8,

    /// Human-readable current-step description.  May embed sub-stage detail
    /// forwarded from the video service's own progress signal.
    pub message: Option<String>,

    /// Set once at creation.
    pub created_at: DateTime<Utc>,

    /// Set when a terminal status lands; consumed by the eviction sweeper.
    pub finished_at: Option<DateTime<Utc>>,

    /// Present exactly when `status == Completed`.
    pub result: Option<PreviewResult>,

    /// Present exactly when `status == Failed`.
    pub error: Option<String>,

    /// Cooperative cancellation flag, flipped by the DELETE handler and
    /// consumed by the coordinator at stage boundaries.  Not part of the
    /// wire snapshot.
    #[serde(skip)]
    pub cancel_requested: bool,
}

impl TaskRecord {
    /// Fresh record in the `Started` state.
    pub fn new(prompt: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt,
            status: TaskStatus::Started,
            progress: 0,
            message: Some("Preview generation started".into()),
            created_at: Utc::now(),
            finished_at: None,
            result: None,
            error: None,
            cancel_requested: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- TaskStatus::is_terminal ---

    #[test]
    fn started_is_not_terminal() {
        assert!(!TaskStatus::Started.is_terminal());
    }

    #[test]
    fn running_stages_are_not_terminal() {
        assert!(!TaskStatus::GeneratingText.is_terminal());
        assert!(!TaskStatus::GeneratingSpeech.is_terminal());
        assert!(!TaskStatus::GeneratingVideo.is_terminal());
        assert!(!TaskStatus::Finalizing.is_terminal());
    }

    #[test]
    fn completed_failed_cancelled_are_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    // ---- wire form ---

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::GeneratingSpeech).unwrap();
        assert_eq!(json, r#""generating_speech""#);
    }

    #[test]
    fn as_str_matches_serde_form() {
        for status in [
            TaskStatus::Started,
            TaskStatus::GeneratingText,
            TaskStatus::GeneratingSpeech,
            TaskStatus::GeneratingVideo,
            TaskStatus::Finalizing,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    // ---- TaskRecord ---

    #[test]
    fn new_record_starts_clean() {
        let record = TaskRecord::new("Hello world".into());
        assert_eq!(record.status, TaskStatus::Started);
        assert_eq!(record.progress, 0);
        assert!(record.result.is_none());
        assert!(record.error.is_none());
        assert!(record.finished_at.is_none());
        assert!(!record.cancel_requested);
    }

    #[test]
    fn record_ids_are_unique() {
        let a = TaskRecord::new("a".into());
        let b = TaskRecord::new("b".into());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn cancel_flag_is_not_serialized() {
        let mut record = TaskRecord::new("x".into());
        record.cancel_requested = true;
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("cancel_requested"));
    }
}
