//! Request/response types and handlers for the preview endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::PreviewJob;
use crate::task::{TaskRecord, TaskStatus};

use super::AppState;

// ---------------------------------------------------------------------------
// Error responses
// ---------------------------------------------------------------------------

/// Handler-level failures, rendered as `{"detail": …}` with a status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown task id — also covers ids that do not parse as a UUID, so a
    /// malformed id is indistinguishable from a missing one.
    #[error("Task not found")]
    TaskNotFound,

    /// The prompt was empty or whitespace-only.
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    /// Too many tasks already in flight.
    #[error("Too many preview tasks in flight; retry later")]
    Saturated,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::TaskNotFound => StatusCode::NOT_FOUND,
            ApiError::EmptyPrompt => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Saturated => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.to_string() });
        (self.status_code(), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
pub struct GeneratePreviewRequest {
    pub prompt: String,
    /// Use the built-in sample persona instead of the configured one.
    #[serde(default)]
    pub use_sample: bool,
}

/// Reply of `POST /preview/generate-full`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: Option<String>,
}

/// Reply of `GET /preview/status-full/{task_id}` — the polling snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewStatusResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub progress: u8,
    pub current_step: Option<String>,
    pub message: Option<String>,
    pub video_path: Option<String>,
    pub audio_path: Option<String>,
    pub error: Option<String>,
}

impl From<TaskRecord> for PreviewStatusResponse {
    fn from(record: TaskRecord) -> Self {
        let (video_path, audio_path) = match &record.result {
            Some(result) => (
                Some(result.video_path.clone()),
                Some(result.audio_path.clone()),
            ),
            None => (None, None),
        };

        Self {
            task_id: record.id,
            status: record.status,
            progress: record.progress,
            current_step: Some(record.status.as_str().to_owned()),
            message: record.message,
            video_path,
            audio_path,
            error: record.error,
        }
    }
}

/// One entry of the task list.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: Uuid,
    pub prompt: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Reply of `GET /preview/tasks-full`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListTasksResponse {
    pub status: String,
    pub tasks: Vec<TaskSummary>,
    pub total: usize,
}

/// Reply of `DELETE /preview/tasks-full/{task_id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub status: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "persona-preview" }))
}

/// `POST /preview/generate-full` — create a task and start the pipeline.
///
/// Returns 201 immediately; generation continues in the background and is
/// observed by polling the status endpoint.
pub async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GeneratePreviewRequest>,
) -> Result<(StatusCode, Json<PreviewResponse>), ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::EmptyPrompt);
    }

    // Cap check and insert are one atomic store operation, so concurrent
    // creates cannot race past the limit.
    let record = state
        .store
        .create_bounded(&request.prompt, state.max_active_tasks)
        .map_err(|_| {
            log::warn!(
                "rejecting preview request: {} tasks already in flight",
                state.max_active_tasks
            );
            ApiError::Saturated
        })?;
    log::info!("task {}: created (use_sample={})", record.id, request.use_sample);

    state.coordinator.spawn(PreviewJob {
        task_id: record.id,
        prompt: request.prompt,
        use_sample: request.use_sample,
    });

    Ok((
        StatusCode::CREATED,
        Json(PreviewResponse {
            task_id: record.id,
            status: record.status,
            progress: record.progress,
            message: record.message,
        }),
    ))
}

/// `GET /preview/status-full/{task_id}` — polling snapshot.
pub async fn status_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<PreviewStatusResponse>, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    let record = state
        .store
        .get(task_id)
        .map_err(|_| ApiError::TaskNotFound)?;

    Ok(Json(record.into()))
}

/// `GET /preview/info-full` — orchestrator diagnostics.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "orchestrator": {
            "service": "persona-preview",
            "stages": ["text", "speech", "video", "finalize"],
            "active_tasks": state.store.active_count(),
            "tracked_tasks": state.store.list().len(),
            "max_active_tasks": state.max_active_tasks,
        }
    }))
}

/// `GET /preview/tasks-full` — every tracked task, newest first.
pub async fn list_handler(State(state): State<AppState>) -> Json<ListTasksResponse> {
    let tasks: Vec<TaskSummary> = state
        .store
        .list()
        .into_iter()
        .map(|record| TaskSummary {
            task_id: record.id,
            prompt: record.prompt,
            status: record.status,
            progress: record.progress,
            created_at: record.created_at,
            finished_at: record.finished_at,
        })
        .collect();

    let total = tasks.len();
    Json(ListTasksResponse {
        status: "ok".into(),
        tasks,
        total,
    })
}

/// `DELETE /preview/tasks-full/{task_id}` — request cooperative cancel.
///
/// The handler only flips the flag; the coordinator performs the actual
/// transition at the next stage boundary.  Cancelling an already finished
/// task is a 200 no-op, so clients may retry the call safely.
pub async fn cancel_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    let record = state
        .store
        .request_cancel(task_id)
        .map_err(|_| ApiError::TaskNotFound)?;

    if record.status.is_terminal() {
        log::debug!("task {task_id}: cancel requested on finished task (no-op)");
    } else {
        log::info!("task {task_id}: cancellation requested");
    }

    Ok(Json(CancelResponse {
        status: "ok".into(),
        message: format!("Cancellation requested for task {task_id}"),
    }))
}

/// Malformed ids map to the same 404 as unknown ids — the path segment not
/// naming a task is all the client needs to know.
fn parse_task_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse().map_err(|_| ApiError::TaskNotFound)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_maps_to_not_found() {
        assert!(matches!(
            parse_task_id("not-a-uuid"),
            Err(ApiError::TaskNotFound)
        ));
        assert!(parse_task_id("e6f8019a-ab04-46a1-b894-3c10c29e9d20").is_ok());
    }

    #[test]
    fn status_response_surfaces_result_paths() {
        let mut record = TaskRecord::new("hi".into());
        record.status = TaskStatus::Completed;
        record.progress = 100;
        record.result = Some(crate::task::PreviewResult {
            video_path: "/out/v.mp4".into(),
            audio_path: "/out/a.wav".into(),
            duration_secs: 4.0,
            fps: 12,
            size_px: 256,
            frames: 48,
        });

        let response: PreviewStatusResponse = record.into();
        assert_eq!(response.video_path.as_deref(), Some("/out/v.mp4"));
        assert_eq!(response.audio_path.as_deref(), Some("/out/a.wav"));
        assert!(response.error.is_none());
    }

    #[test]
    fn generate_request_defaults_use_sample_off() {
        let parsed: GeneratePreviewRequest =
            serde_json::from_str(r#"{"prompt": "Hello world"}"#).unwrap();
        assert!(!parsed.use_sample);
    }
}
