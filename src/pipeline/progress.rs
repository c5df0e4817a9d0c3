//! Mapping stage-local progress onto the global 0–100 task scale.
//!
//! Each stage owns a contiguous span of the global scale, derived from the
//! configurable [`StageWeights`] boundaries.  A stage adapter reports 0–100
//! within its own work; [`StageSpan::map`] projects that into the span so
//! the task's `progress` climbs smoothly across the whole pipeline.

use crate::config::StageWeights;

// ---------------------------------------------------------------------------
// StageSpan
// ---------------------------------------------------------------------------

/// One stage's slice of the global progress scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpan {
    /// Global progress when the stage begins.
    pub start: u8,
    /// Global progress when the stage completes.
    pub end: u8,
}

impl StageSpan {
    /// Project a stage-local percent (0–100) into this span.
    ///
    /// Out-of-range local values are clamped, so a misbehaving service
    /// signal can never push the task's progress past the stage boundary.
    pub fn map(&self, local: u8) -> u8 {
        let local = local.min(100) as u16;
        let width = (self.end - self.start) as u16;
        self.start + (local * width / 100) as u8
    }
}

// ---------------------------------------------------------------------------
// PipelineSpans
// ---------------------------------------------------------------------------

/// The full set of stage spans for one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSpans {
    pub text: StageSpan,
    pub speech: StageSpan,
    pub video: StageSpan,
    pub finalize: StageSpan,
}

impl PipelineSpans {
    /// Derive contiguous spans from the configured boundaries.
    ///
    /// Assumes `weights.is_valid()` — enforced at startup by
    /// `AppConfig::validate`.
    pub fn from_weights(weights: &StageWeights) -> Self {
        Self {
            text: StageSpan {
                start: 0,
                end: weights.text_end,
            },
            speech: StageSpan {
                start: weights.text_end,
                end: weights.speech_end,
            },
            video: StageSpan {
                start: weights.speech_end,
                end: weights.video_end,
            },
            finalize: StageSpan {
                start: weights.video_end,
                end: 100,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
