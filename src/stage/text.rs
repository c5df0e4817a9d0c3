//! `ApiTextGenerator` — text generation via an OpenAI-compatible chat API.
//!
//! Works with Ollama (OpenAI mode), OpenAI, Groq, LM Studio, vLLM — any
//! provider that speaks the chat-completions wire format.  All connection
//! details come from [`TextServiceConfig`]; nothing is hardcoded.

use async_trait::async_trait;

use crate::config::TextServiceConfig;

use super::{ProgressFn, StageError, TextGenerator, TextOutput};

/// Calls `{base_url}/v1/chat/completions` to produce the preview's reply
/// text in the persona's style.
///
/// The chat call returns in one shot with no native progress signal, so the
/// adapter reports a coarse start/finish pair through the sink.
pub struct ApiTextGenerator {
    client: reqwest::Client,
    config: TextServiceConfig,
}

impl ApiTextGenerator {
    /// Build an `ApiTextGenerator` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &TextServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// System message the persona speaks through.
    fn system_prompt(&self, style: Option<&str>) -> String {
        match style {
            Some(style) => format!(
                "You are speaking as a specific persona. Reply to the user's prompt \
                 in one short paragraph suitable for being read aloud.\n\
                 Style guide: {style}"
            ),
            None => "Reply to the user's prompt in one short paragraph suitable for \
                     being read aloud."
                .to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for ApiTextGenerator {
    /// Send `prompt` to the configured endpoint and return the reply text.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is `Some(key)` and `key` is non-empty — safe for
    /// Ollama and other local providers that require no authentication.
    async fn generate(
        &self,
        prompt: &str,
        style: Option<&str>,
        progress: &ProgressFn,
    ) -> Result<TextOutput, StageError> {
        progress(0, "Generating reply text");

        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": self.system_prompt(style) },
                { "role": "user",   "content": prompt }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        });

        let mut req = self.client.post(&url).json(&body);

        // Attach Authorization header only when api_key is a non-empty string.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StageError::Parse(e.to_string()))?;

        if let Some(reason) = json["error"]["message"].as_str() {
            return Err(StageError::Service(format!(
                "Text generation failed: {reason}"
            )));
        }

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(StageError::Empty)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(StageError::Empty);
        }

        progress(100, "Reply text generated");

        Ok(TextOutput::from_text(text, self.config.model.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
