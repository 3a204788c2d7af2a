//! The generation endpoint itself: a black box behind an async trait so the
//! resilience layer in `lib.rs` can be tested against a fake. The HTTP
//! implementation talks to an Ollama-compatible `/api/generate` endpoint,
//! the same wire shape the reference workspace's `OllamaClient` uses.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::LlmError;

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<String, LlmError>;

    /// Classify the dominant emotion of `text`, returning a label and an
    /// intensity in `[0,1]`.
    async fn classify_emotion(&self, text: &str) -> Result<(String, f32), LlmError>;
}

/// Talks to an Ollama-compatible HTTP server. Base URL defaults to
/// `http://localhost:11434`, overridable via `OLLAMA_BASE_URL` — the same
/// environment variable the reference workspace's client reads.
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Deserialize)]
struct EmotionClassification {
    label: String,
    intensity: f32,
}

impl HttpGenerationBackend {
    pub fn new() -> Self {
        let base_url = std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn generate_raw(&self, model: &str, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        let endpoint = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": temperature },
        });

        let response = self
            .client
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|err| LlmError::Connection(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Connection(format!("status {}", response.status())));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Malformed(err.to_string()))?;

        body.response.ok_or_else(|| LlmError::Malformed("missing 'response' field".to_string()))
    }
}

impl Default for HttpGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        self.generate_raw(model, prompt, temperature).await
    }

    /// Asks the same generation endpoint for a strict JSON classification,
    /// parses the reply as `{"label": ..., "intensity": ...}`. A reply that
    /// doesn't parse is a `Malformed` error — the caller (`LlmAdapter`)
    /// applies the `(neutral, 0.2)` default, per the error-handling taxonomy.
    async fn classify_emotion(&self, text: &str) -> Result<(String, f32), LlmError> {
        let prompt = format!(
            "Classify the dominant emotion in the following text. Respond with strict JSON \
             only, in the form {{\"label\": \"<emotion>\", \"intensity\": <0..1>}}.\n\nText:\n{text}"
        );
        let raw = self.generate_raw("phi", &prompt, 0.0).await?;
        let trimmed = raw.trim();
        let parsed: EmotionClassification =
            serde_json::from_str(trimmed).map_err(|err| LlmError::Malformed(err.to_string()))?;
        Ok((parsed.label, parsed.intensity.clamp(0.0, 1.0)))
    }
}
