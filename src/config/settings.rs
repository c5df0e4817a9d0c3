//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// HTTP listener settings for the task API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g. `"127.0.0.1"` or `"0.0.0.0"`).
    pub host: String,
    /// TCP port the API listens on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
        }
    }
}

// ---------------------------------------------------------------------------
// TextServiceConfig
// ---------------------------------------------------------------------------

/// Settings for the text-generation service (OpenAI-compatible chat API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextServiceConfig {
    /// Base URL of the API endpoint.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key — `None` for local providers that require no authentication.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"phi4-mini"`, `"gpt-4o-mini"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Maximum number of tokens the model may generate per reply.
    pub max_tokens: u32,
    /// Maximum seconds the text stage may take before it fails with a
    /// timeout reason.
    pub timeout_secs: u64,
}

impl Default for TextServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "phi4-mini".into(),
            temperature: 0.7,
            max_tokens: 256,
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechServiceConfig
// ---------------------------------------------------------------------------

/// Settings for the voice-cloning / TTS service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechServiceConfig {
    /// Base URL of the TTS service (e.g. a local XTTS server).
    pub base_url: String,
    /// Target sample rate in Hz requested from the synthesizer.
    pub sample_rate: u32,
    /// Maximum seconds the speech stage may take before it fails with a
    /// timeout reason.
    pub timeout_secs: u64,
}

impl Default for SpeechServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8020".into(),
            sample_rate: 16_000,
            timeout_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// VideoServiceConfig
// ---------------------------------------------------------------------------

/// Settings for the lip-sync video service.
///
/// Video rendering is by far the slowest stage (seconds to tens of minutes),
/// so it gets the largest timeout and its own progress poll interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoServiceConfig {
    /// Base URL of the lip-sync service.
    pub base_url: String,
    /// Output frame rate requested from the renderer.
    pub fps: u32,
    /// Output frame size in pixels (square frames).
    pub size_px: u32,
    /// How often the renderer's job endpoint is polled for nested progress,
    /// in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum seconds the video stage may take before it fails with a
    /// timeout reason.
    pub timeout_secs: u64,
}

impl Default for VideoServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8030".into(),
            fps: 12,
            size_px: 256,
            poll_interval_ms: 1_000,
            timeout_secs: 1_800,
        }
    }
}

// ---------------------------------------------------------------------------
// StageWeights
// ---------------------------------------------------------------------------

/// Cumulative end point of each stage on the global 0–100 progress scale.
///
/// Each stage maps its local 0–100 signal onto the span between the previous
/// stage's end and its own end; the finalize step owns everything between
/// `video_end` and 100.  The exact boundary values are policy, not contract,
/// which is why they live in config rather than as constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageWeights {
    /// Global progress when text generation completes.
    pub text_end: u8,
    /// Global progress when speech synthesis completes.
    pub speech_end: u8,
    /// Global progress when video rendering completes.
    pub video_end: u8,
}

impl StageWeights {
    /// Returns `true` when the boundaries are strictly increasing and leave
    /// room for the finalize step (`0 < text < speech < video < 100`).
    pub fn is_valid(&self) -> bool {
        0 < self.text_end
            && self.text_end < self.speech_end
            && self.speech_end < self.video_end
            && self.video_end < 100
    }
}

impl Default for StageWeights {
    fn default() -> Self {
        Self {
            text_end: 20,
            speech_end: 50,
            video_end: 95,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Settings for the pipeline coordinator itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-stage progress boundaries on the global scale.
    pub weights: StageWeights,
    /// Total wall-clock budget for one task across all stages, in seconds.
    /// Checked at stage boundaries; an exceeded budget fails the task.
    pub total_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weights: StageWeights::default(),
            total_timeout_secs: 3_600,
        }
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Task store capacity and eviction policy.
///
/// The observed contract specifies no expiry, so all three knobs are
/// deployment policy: finished records are swept after a retention window
/// and new tasks are rejected while the in-flight count is at the cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of non-terminal tasks allowed at once; creates beyond
    /// this are rejected with a service-unavailable response.
    pub max_active_tasks: usize,
    /// Seconds a completed / failed / cancelled record is kept before the
    /// sweeper may remove it.
    pub retain_finished_secs: u64,
    /// How often the background sweeper runs, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_active_tasks: 8,
            retain_finished_secs: 3_600,
            sweep_interval_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// PersonaConfig
// ---------------------------------------------------------------------------

/// One persona profile: the inputs each pipeline stage personalises on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Display name, echoed into the preview metadata document.
    pub name: String,
    /// Optional style instruction prepended to the text stage's system
    /// prompt (distilled from the user's uploaded writing sample).
    pub style_prompt: Option<String>,
    /// Voice identifier the TTS service resolves to a cloned speaker.
    pub voice: String,
    /// Face reference image for the lip-sync stage, relative to the
    /// artifacts directory unless absolute.
    pub face_ref: PathBuf,
}

impl PersonaConfig {
    /// Built-in sample persona used when a request sets `use_sample` —
    /// lets the wizard demo the pipeline before any uploads exist.
    pub fn sample() -> Self {
        Self {
            name: "Sample Persona".into(),
            style_prompt: None,
            voice: "sample".into(),
            face_ref: PathBuf::from("image/sample_face.png"),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Custom Persona".into(),
            style_prompt: None,
            voice: "default".into(),
            face_ref: PathBuf::from("image/face_ref.png"),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use persona_preview::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Text-generation service settings.
    pub text: TextServiceConfig,
    /// TTS service settings.
    pub speech: SpeechServiceConfig,
    /// Lip-sync video service settings.
    pub video: VideoServiceConfig,
    /// Coordinator settings (stage weights, total budget).
    pub pipeline: PipelineConfig,
    /// Task store capacity and eviction policy.
    pub store: StoreConfig,
    /// Persona built from the user's uploads.
    pub persona: PersonaConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations that would make the coordinator misbehave.
    /// Called once at startup; an invalid file is a deployment error.
    pub fn validate(&self) -> Result<()> {
        if !self.pipeline.weights.is_valid() {
            anyhow::bail!(
                "pipeline.weights must satisfy 0 < text_end < speech_end < video_end < 100 \
                 (got {}/{}/{})",
                self.pipeline.weights.text_end,
                self.pipeline.weights.speech_end,
                self.pipeline.weights.video_end,
            );
        }
        if self.store.max_active_tasks == 0 {
            anyhow::bail!("store.max_active_tasks must be at least 1");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        // ServerConfig
        assert_eq!(original.server.host, loaded.server.host);
        assert_eq!(original.server.port, loaded.server.port);

        // TextServiceConfig
        assert_eq!(original.text.base_url, loaded.text.base_url);
        assert_eq!(original.text.api_key, loaded.text.api_key);
        assert_eq!(original.text.model, loaded.text.model);
        assert_eq!(original.text.max_tokens, loaded.text.max_tokens);
        assert_eq!(original.text.timeout_secs, loaded.text.timeout_secs);

        // SpeechServiceConfig
        assert_eq!(original.speech.base_url, loaded.speech.base_url);
        assert_eq!(original.speech.sample_rate, loaded.speech.sample_rate);

        // VideoServiceConfig
        assert_eq!(original.video.base_url, loaded.video.base_url);
        assert_eq!(original.video.fps, loaded.video.fps);
        assert_eq!(original.video.size_px, loaded.video.size_px);

        // PipelineConfig
        assert_eq!(original.pipeline.weights, loaded.pipeline.weights);
        assert_eq!(
            original.pipeline.total_timeout_secs,
            loaded.pipeline.total_timeout_secs
        );

        // StoreConfig
        assert_eq!(
            original.store.max_active_tasks,
            loaded.store.max_active_tasks
        );
        assert_eq!(
            original.store.retain_finished_secs,
            loaded.store.retain_finished_secs
        );

        // PersonaConfig
        assert_eq!(original.persona.name, loaded.persona.name);
        assert_eq!(original.persona.voice, loaded.persona.voice);
        assert_eq!(original.persona.face_ref, loaded.persona.face_ref);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.server.port, default.server.port);
        assert_eq!(config.text.model, default.text.model);
        assert_eq!(config.pipeline.weights, default.pipeline.weights);
        assert_eq!(config.store.max_active_tasks, default.store.max_active_tasks);
    }

    /// Verify default values match the documented policy.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.text.base_url, "http://localhost:11434");
        assert_eq!(cfg.text.model, "phi4-mini");
        assert!(cfg.text.api_key.is_none());
        assert_eq!(cfg.speech.sample_rate, 16_000);
        assert_eq!(cfg.video.fps, 12);
        assert_eq!(cfg.video.size_px, 256);
        assert_eq!(cfg.pipeline.weights.text_end, 20);
        assert_eq!(cfg.pipeline.weights.speech_end, 50);
        assert_eq!(cfg.pipeline.weights.video_end, 95);
        assert_eq!(cfg.store.max_active_tasks, 8);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.server.port = 9000;
        cfg.text.base_url = "https://api.openai.com".into();
        cfg.text.api_key = Some("sk-test".into());
        cfg.text.model = "gpt-4o-mini".into();
        cfg.pipeline.weights = StageWeights {
            text_end: 10,
            speech_end: 40,
            video_end: 90,
        };
        cfg.store.max_active_tasks = 2;
        cfg.persona.voice = "cloned-7".into();

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.server.port, 9000);
        assert_eq!(loaded.text.base_url, "https://api.openai.com");
        assert_eq!(loaded.text.api_key, Some("sk-test".into()));
        assert_eq!(loaded.text.model, "gpt-4o-mini");
        assert_eq!(loaded.pipeline.weights.text_end, 10);
        assert_eq!(loaded.pipeline.weights.video_end, 90);
        assert_eq!(loaded.store.max_active_tasks, 2);
        assert_eq!(loaded.persona.voice, "cloned-7");
    }

    // ---- StageWeights validation ---

    #[test]
    fn default_weights_are_valid() {
        assert!(StageWeights::default().is_valid());
    }

    #[test]
    fn non_monotone_weights_are_invalid() {
        let w = StageWeights {
            text_end: 50,
            speech_end: 20,
            video_end: 95,
        };
        assert!(!w.is_valid());
    }

    #[test]
    fn weights_must_leave_room_for_finalize() {
        let w = StageWeights {
            text_end: 20,
            speech_end: 50,
            video_end: 100,
        };
        assert!(!w.is_valid());
    }

    #[test]
    fn validate_rejects_bad_weights() {
        let mut cfg = AppConfig::default();
        cfg.pipeline.weights.speech_end = 10;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut cfg = AppConfig::default();
        cfg.store.max_active_tasks = 0;
        assert!(cfg.validate().is_err());
    }
}
