//! `ApiSpeechSynthesizer` — voice-cloned TTS via an HTTP synthesis service.
//!
//! The service holds the cloned speaker profiles (created by the wizard's
//! voice-upload step); this adapter only names a voice and hands over text.
//! The service writes the audio file itself and replies with its location
//! and timing metadata.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

use crate::config::SpeechServiceConfig;

use super::{ProgressFn, SpeechOutput, SpeechSynthesizer, StageError};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Success payload of `POST /synthesize`.
#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    audio_path: String,
    duration_secs: f64,
    sample_rate: u32,
    /// Present when the service reports a failure alongside a 200.
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// ApiSpeechSynthesizer
// ---------------------------------------------------------------------------

/// Calls `{base_url}/synthesize` on the TTS service.
///
/// Synthesis of a short preview paragraph takes seconds and the service
/// exposes no intermediate signal, so the adapter reports a start/finish
/// pair through the sink.
pub struct ApiSpeechSynthesizer {
    client: reqwest::Client,
    config: SpeechServiceConfig,
}

impl ApiSpeechSynthesizer {
    /// Build an `ApiSpeechSynthesizer` from application config, with the
    /// per-request timeout baked into the HTTP client.
    pub fn from_config(config: &SpeechServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ApiSpeechSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        progress: &ProgressFn,
    ) -> Result<SpeechOutput, StageError> {
        progress(0, "Synthesizing speech");

        let url = format!("{}/synthesize", self.config.base_url);

        let body = serde_json::json!({
            "text":        text,
            "voice":       voice,
            "sample_rate": self.config.sample_rate,
        });

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(StageError::Service(format!(
                "Speech synthesis failed: {status} {detail}"
            )));
        }

        let payload: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| StageError::Parse(e.to_string()))?;

        if let Some(reason) = payload.error {
            return Err(StageError::Service(format!(
                "Speech synthesis failed: {reason}"
            )));
        }

        if payload.audio_path.is_empty() {
            return Err(StageError::Empty);
        }

        progress(100, "Speech synthesized");

        Ok(SpeechOutput {
            audio_path: PathBuf::from(payload.audio_path),
            duration_secs: payload.duration_secs,
            sample_rate: payload.sample_rate,
            voice: voice.to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> SpeechServiceConfig {
        SpeechServiceConfig {
            base_url: "http://localhost:8020".into(),
            sample_rate: 16_000,
            timeout_secs: 10,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _synth = ApiSpeechSynthesizer::from_config(&make_config());
    }

    #[test]
    fn synthesizer_is_object_safe() {
        let synth: Box<dyn SpeechSynthesizer> =
            Box::new(ApiSpeechSynthesizer::from_config(&make_config()));
        drop(synth);
    }

    #[test]
    fn response_parses_without_error_field() {
        let json = r#"{"audio_path": "/out/a.wav", "duration_secs": 3.2, "sample_rate": 16000}"#;
        let parsed: SynthesizeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.audio_path, "/out/a.wav");
        assert!(parsed.error.is_none());
    }
}
