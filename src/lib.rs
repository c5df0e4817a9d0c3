//! Persona preview orchestrator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   POST /preview/generate-full   ┌──────────────────────┐
//! │ HTTP client │ ───────────────────────────────▶ │  api (axum router)   │
//! └─────────────┘ ◀─── poll /preview/status-full ─ └──────────┬───────────┘
//!                                                             │ spawn
//!                                                             ▼
//!                                                ┌──────────────────────┐
//!                                                │ PipelineCoordinator  │
//!                                                │ text ▶ speech ▶ video│
//!                                                │      ▶ finalize      │
//!                                                └──────────┬───────────┘
//!                                                           │ update
//!                                                           ▼
//!                                                ┌──────────────────────┐
//!                                                │      TaskStore       │
//!                                                └──────────────────────┘
//! ```
//!
//! The API creates task records and answers polls; the coordinator drives
//! each task through the stage adapters and owns every status transition;
//! the store is the single shared mutable resource between them.

pub mod api;
pub mod config;
pub mod pipeline;
pub mod stage;
pub mod task;
