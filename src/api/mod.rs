//! HTTP surface of the orchestrator.
//!
//! # Architecture
//!
//! ```text
//! POST   /preview/generate-full          ──▶ create record + spawn pipeline
//! GET    /preview/status-full/{task_id}  ──▶ snapshot for polling clients
//! GET    /preview/tasks-full             ──▶ list all tracked tasks
//! GET    /preview/info-full              ──▶ orchestrator diagnostics
//! DELETE /preview/tasks-full/{task_id}   ──▶ request cooperative cancel
//! GET    /health                         ──▶ liveness probe
//! ```
//!
//! Handlers only read the task store and flip the cancel flag; every status
//! transition belongs to the pipeline coordinator.  The router is built by
//! [`build_router`] so integration tests can drive it in-process without a
//! listening socket.

pub mod preview;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::pipeline::PipelineCoordinator;
use crate::task::TaskStore;

pub use preview::{
    CancelResponse, GeneratePreviewRequest, ListTasksResponse, PreviewResponse,
    PreviewStatusResponse,
};

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: TaskStore,
    pub coordinator: Arc<PipelineCoordinator>,
    /// Creates are rejected with 503 once this many tasks are in flight.
    pub max_active_tasks: usize,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Assemble the application router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(preview::health_handler))
        .route(
            "/preview/generate-full",
            axum::routing::post(preview::generate_handler),
        )
        .route(
            "/preview/status-full/{task_id}",
            get(preview::status_handler),
        )
        .route("/preview/tasks-full", get(preview::list_handler))
        .route("/preview/info-full", get(preview::info_handler))
        .route(
            "/preview/tasks-full/{task_id}",
            axum::routing::delete(preview::cancel_handler),
        )
        .with_state(state)
}
