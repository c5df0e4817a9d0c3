//! Task tracking: records, status state machine, and the in-memory store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     TaskStore                       │
//! │        Arc<RwLock<HashMap<Uuid, TaskRecord>>>       │
//! │                                                     │
//! │   create / get / update / request_cancel / delete   │
//! │   list / active_count / evict_finished              │
//! └──────────────┬───────────────────────┬──────────────┘
//!                │ atomic mutation       │ snapshot reads
//!        PipelineCoordinator       API handlers (polling)
//! ```
//!
//! `update` is the only mutation path and refuses to touch terminal
//! (frozen) records, which doubles as stale-write suppression for late
//! progress callbacks.

pub mod record;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use record::{PreviewResult, TaskRecord, TaskStatus};
pub use store::{StoreError, TaskStore};
