//! Orchestrates one end-to-end dialogue run: config validation, memory and
//! LLM wiring, the dialogue driver, and the final session dump (§5, §6).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use entelgia_config::AppConfig;
use entelgia_dialogue::{DialogueSession, StopReason, Utterance};
use entelgia_llm::{GenerationBackend, HttpGenerationBackend, LlmAdapter};
use entelgia_memory::{MemoryCore, MemoryCoreConfig};
use entelgia_metrics::{MetricTurn, circularity_rate, intervention_utility, progress_rate};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

const CIRCULARITY_THRESHOLD: f64 = 0.5;
const INTERVENTION_WINDOW: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub circularity_rate: f64,
    pub progress_rate: f64,
    pub intervention_utility: f64,
}

impl MetricsSnapshot {
    pub fn compute(dialogue: &[Utterance]) -> Self {
        let turns: Vec<MetricTurn> = dialogue
            .iter()
            .filter(|u| u.role != "seed")
            .map(|u| MetricTurn::new(u.role.clone(), u.text.clone()))
            .collect();
        Self {
            circularity_rate: circularity_rate(&turns, CIRCULARITY_THRESHOLD),
            progress_rate: progress_rate(&turns),
            intervention_utility: intervention_utility(&turns, INTERVENTION_WINDOW, CIRCULARITY_THRESHOLD),
        }
    }
}

/// The final on-disk record for a completed dialogue: config echo, metrics
/// snapshot, and the full dialogue log, written to `sessions/<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDump {
    pub session_id: Uuid,
    pub seed_topic: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub stop_reason: String,
    pub config: AppConfig,
    pub metrics: MetricsSnapshot,
    pub dialogue: Vec<Utterance>,
}

fn stop_reason_label(reason: StopReason) -> &'static str {
    match reason {
        StopReason::MaxTurns => "max_turns",
        StopReason::Timeout => "timeout",
        StopReason::StopWord => "stop_word",
    }
}

fn sessions_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions")
}

/// Write `dump` to `<data_dir>/sessions/<session_id>.json`, creating the
/// directory if needed. Returns the path written.
pub async fn persist_session_dump(data_dir: &Path, dump: &SessionDump) -> Result<PathBuf> {
    let dir = sessions_dir(data_dir);
    tokio::fs::create_dir_all(&dir).await.with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{}.json", dump.session_id));
    let rendered = serde_json::to_string_pretty(dump).context("serializing session dump")?;
    tokio::fs::write(&path, rendered).await.with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Validate configuration, wire up memory and the LLM backend, run a full
/// dialogue to a stop condition, and persist the session dump. This is the
/// single orchestration entry point `entelgia-cli` calls.
pub async fn run_session(config: AppConfig, rng_seed: u64) -> Result<SessionDump> {
    run_session_with(config, rng_seed, |_| {}).await
}

/// Same as [`run_session`], but `on_utterance` is invoked with each turn as
/// soon as it is appended to the log — lets a caller print turn-by-turn
/// output without waiting for the whole dialogue to finish.
pub async fn run_session_with(
    config: AppConfig,
    rng_seed: u64,
    mut on_utterance: impl FnMut(&Utterance),
) -> Result<SessionDump> {
    config.validate().context("configuration validation failed")?;
    let secret_key = config.load_secret_key().context("loading signing key")?;

    let data_dir = config.data_dir();
    let memory = MemoryCore::open(
        MemoryCoreConfig {
            data_dir: data_dir.clone(),
            stm_max_entries: config.memory.stm_max_entries,
            stm_trim_batch: config.memory.stm_trim_batch,
        },
        secret_key,
    )
    .context("opening memory core")?;

    let backend: Arc<dyn GenerationBackend> = Arc::new(HttpGenerationBackend::new());
    let llm = LlmAdapter::new(backend);

    let seed_topic = config.dialogue.seed_topic.clone();
    let topics = vec![seed_topic.clone()];

    let started_at = Utc::now();
    let mut session = DialogueSession::new(config.clone(), memory, llm, topics, rng_seed);
    let session_id = session.id;
    info!(%session_id, seed_topic = %seed_topic, "starting dialogue session");

    let stop_reason = loop {
        let before = session.dialogue_log().len();
        if let Some(reason) = session.run_turn().await.context("running dialogue turn")? {
            for utterance in &session.dialogue_log()[before..] {
                on_utterance(utterance);
            }
            break reason;
        }
        for utterance in &session.dialogue_log()[before..] {
            on_utterance(utterance);
        }
    };
    let ended_at = Utc::now();
    info!(%session_id, reason = stop_reason_label(stop_reason), turns = session.dialogue_log().len(), "dialogue session ended");

    let dialogue = session.dialogue_log().to_vec();
    let metrics = MetricsSnapshot::compute(&dialogue);

    let dump = SessionDump {
        session_id,
        seed_topic,
        started_at,
        ended_at,
        stop_reason: stop_reason_label(stop_reason).to_string(),
        config,
        metrics,
        dialogue,
    };

    let path = persist_session_dump(&data_dir, &dump).await?;
    info!(path = %path.display(), "session dump persisted");

    Ok(dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use entelgia_llm::LlmError;

    struct EchoBackend;

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn generate(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String, LlmError> {
            Ok("a measured reply about the topic at hand".to_string())
        }
        async fn classify_emotion(&self, _text: &str) -> Result<(String, f32), LlmError> {
            Ok(("curiosity".to_string(), 0.3))
        }
    }

    #[tokio::test]
    async fn full_session_runs_and_persists_a_dump() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.memory.data_dir = dir.path().join("entelgia_data").to_string_lossy().to_string();
        config.dialogue.max_turns = 5;
        config.dialogue.timeout_minutes = 60;
        // SAFETY: test-local env mutation.
        unsafe { std::env::set_var("MEMORY_SECRET_KEY", "a secret key at least 32 bytes long!!") };

        let secret_key = config.load_secret_key().unwrap();
        let memory = MemoryCore::open(
            MemoryCoreConfig {
                data_dir: config.data_dir(),
                stm_max_entries: config.memory.stm_max_entries,
                stm_trim_batch: config.memory.stm_trim_batch,
            },
            secret_key,
        )
        .unwrap();
        let backend: Arc<dyn GenerationBackend> = Arc::new(EchoBackend);
        let llm = LlmAdapter::new(backend).with_retries(0);
        let mut session = DialogueSession::new(config.clone(), memory, llm, vec![config.dialogue.seed_topic.clone()], 3);
        let stop_reason = session.run().await.unwrap();
        let dialogue = session.dialogue_log().to_vec();
        let metrics = MetricsSnapshot::compute(&dialogue);

        let dump = SessionDump {
            session_id: session.id,
            seed_topic: config.dialogue.seed_topic.clone(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            stop_reason: stop_reason_label(stop_reason).to_string(),
            config,
            metrics,
            dialogue,
        };
        let path = persist_session_dump(&dump.config.data_dir(), &dump).await.unwrap();
        assert!(path.exists());

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let reloaded: SessionDump = serde_json::from_str(&raw).unwrap();
        assert_eq!(reloaded.session_id, dump.session_id);
        assert!(reloaded.metrics.circularity_rate >= 0.0);

        unsafe { std::env::remove_var("MEMORY_SECRET_KEY") };
    }
}
