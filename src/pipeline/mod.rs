//! Pipeline orchestration: stage sequencing and progress mapping.
//!
//! [`coordinator`] drives one task at a time through the stage adapters and
//! owns every task store transition; [`progress`] maps each stage's local
//! 0–100 signal onto its slice of the global scale.

pub mod coordinator;
pub mod progress;

pub use coordinator::{PipelineCoordinator, PreviewJob};
pub use progress::{PipelineSpans, StageSpan};
