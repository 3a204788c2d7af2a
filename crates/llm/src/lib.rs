//! Adapter over the external generation endpoint.
//!
//! The endpoint itself is a black box: `generate(model, prompt, temperature)
//! -> text` and `classify_emotion(text) -> (label, intensity)`. This crate
//! owns everything *around* that call — retry, backoff, per-call deadline,
//! and the sentinel-utterance fallback — so a single flaky generation never
//! aborts a dialogue.

pub mod backend;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub use backend::{GenerationBackend, HttpGenerationBackend};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("generation call timed out")]
    Timeout,
    #[error("connection to generation backend failed: {0}")]
    Connection(String),
    #[error("malformed response from generation backend: {0}")]
    Malformed(String),
}

/// Returned as the agent's turn text when every retry is exhausted. The
/// caller logs this as the turn with `emotion = neutral`, `intensity = 0.2`
/// and the dialogue continues.
pub const SENTINEL_ERROR_UTTERANCE: &str =
    "...I find myself unable to continue that thought right now.";

const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_DEADLINE_SECS: u64 = 600;
const BACKOFF_BASE_SECS: f64 = 0.8;

#[derive(Clone)]
pub struct LlmAdapter {
    backend: Arc<dyn GenerationBackend>,
    retries: u32,
    per_call_deadline: Duration,
}

impl LlmAdapter {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            retries: DEFAULT_RETRIES,
            per_call_deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.per_call_deadline = deadline;
        self
    }

    /// Generate a reply, retrying up to `retries` times with exponential
    /// backoff (`0.8 * (attempt + 1)` seconds) and a per-call deadline. On
    /// terminal failure returns `(SENTINEL_ERROR_UTTERANCE, true)`; the
    /// caller is responsible for logging the sentinel emotion defaults
    /// (`neutral`, 0.2).
    pub async fn generate_with_resilience(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> (String, bool) {
        for attempt in 0..=self.retries {
            let call = self.backend.generate(model, prompt, temperature);
            match tokio::time::timeout(self.per_call_deadline, call).await {
                Ok(Ok(text)) => return (text, false),
                Ok(Err(err)) => {
                    warn!(attempt, model, error = %err, "generation call failed");
                }
                Err(_) => {
                    warn!(attempt, model, "generation call exceeded per-call deadline");
                }
            }
            if attempt < self.retries {
                let backoff = Duration::from_secs_f64(BACKOFF_BASE_SECS * (attempt as f64 + 1.0));
                tokio::time::sleep(backoff).await;
            }
        }
        warn!(model, "generation failed after all retries — returning sentinel utterance");
        (SENTINEL_ERROR_UTTERANCE.to_string(), true)
    }

    /// Classify the emotion of `text`. Malformed or failed classification
    /// defaults to `("neutral", 0.2)` per the error-handling taxonomy — a
    /// classifier failure must never abort the dialogue.
    pub async fn classify_emotion_with_default(&self, text: &str) -> (String, f32) {
        match tokio::time::timeout(self.per_call_deadline, self.backend.classify_emotion(text)).await {
            Ok(Ok((label, intensity))) => (label, intensity.clamp(0.0, 1.0)),
            Ok(Err(err)) => {
                warn!(error = %err, "emotion classification failed — defaulting to neutral");
                ("neutral".to_string(), 0.2)
            }
            Err(_) => {
                warn!("emotion classification timed out — defaulting to neutral");
                ("neutral".to_string(), 0.2)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyBackend {
        fail_times: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationBackend for FlakyBackend {
        async fn generate(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                Err(LlmError::Connection("refused".to_string()))
            } else {
                Ok("a generated reply".to_string())
            }
        }

        async fn classify_emotion(&self, _text: &str) -> Result<(String, f32), LlmError> {
            Err(LlmError::Malformed("no json".to_string()))
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures_within_retry_budget() {
        let backend = Arc::new(FlakyBackend {
            fail_times: 2,
            calls: AtomicUsize::new(0),
        });
        let adapter = LlmAdapter::new(backend).with_retries(2).with_deadline(Duration::from_millis(50));
        let (text, is_sentinel) = adapter.generate_with_resilience("phi", "prompt", 0.6).await;
        assert!(!is_sentinel);
        assert_eq!(text, "a generated reply");
    }

    #[tokio::test]
    async fn returns_sentinel_after_exhausting_retries() {
        let backend = Arc::new(FlakyBackend {
            fail_times: 100,
            calls: AtomicUsize::new(0),
        });
        let adapter = LlmAdapter::new(backend).with_retries(1).with_deadline(Duration::from_millis(10));
        let (text, is_sentinel) = adapter.generate_with_resilience("phi", "prompt", 0.6).await;
        assert!(is_sentinel);
        assert_eq!(text, SENTINEL_ERROR_UTTERANCE);
    }

    #[tokio::test]
    async fn emotion_classification_defaults_on_malformed_response() {
        let backend = Arc::new(FlakyBackend {
            fail_times: 0,
            calls: AtomicUsize::new(0),
        });
        let adapter = LlmAdapter::new(backend);
        let (label, intensity) = adapter.classify_emotion_with_default("some text").await;
        assert_eq!(label, "neutral");
        assert_eq!(intensity, 0.2);
    }
}
