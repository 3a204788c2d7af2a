//! `AppConfig`: the single configuration struct (§6), loaded from TOML with
//! `#[serde(default)]` sub-structs, plus the startup validation that turns a
//! bad config into a fatal, actionable [`ConfigError`] before a session starts.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set (MEMORY_SECRET_KEY environment variable)")]
    MissingSecretKey(&'static str),
    #[error("signing key is only {0} bytes; at least 32 bytes is recommended")]
    WeakSecretKey(usize),
    #[error("{field} must be {constraint}, got {value}")]
    InvalidRange { field: &'static str, constraint: &'static str, value: String },
    #[error("data_dir parent directory does not exist: {0}")]
    DataDirParentMissing(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub socrates: String,
    pub athena: String,
    pub fixy: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            socrates: "phi".to_string(),
            athena: "phi".to_string(),
            fixy: "phi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub data_dir: String,
    pub stm_max_entries: usize,
    pub stm_trim_batch: usize,
    pub promote_importance_threshold: f32,
    pub promote_emotion_threshold: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: "entelgia_data".to_string(),
            stm_max_entries: 100_000,
            stm_trim_batch: 2_000,
            promote_importance_threshold: 0.72,
            promote_emotion_threshold: 0.65,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    pub fixy_every_n_turns: u64,
    pub dream_every_n_turns: u64,
    pub max_turns: u64,
    pub timeout_minutes: u64,
    pub seed_topic: String,
    pub show_pronouns: bool,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            fixy_every_n_turns: 3,
            dream_every_n_turns: 7,
            max_turns: 200,
            timeout_minutes: 10,
            seed_topic: "What does it mean to live a good life?".to_string(),
            show_pronouns: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub models: ModelsConfig,
    pub memory: MemoryConfig,
    pub dialogue: DialogueConfig,
}

impl AppConfig {
    /// Load from `path` if it exists and parses; otherwise fall back to
    /// defaults (mirrors the workspace's existing config-loading pattern —
    /// an absent or unreadable file is not itself an error).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(&path) {
            config = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config at {}", path.as_ref().display()))?;
        }
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// Read the HMAC signing key from `MEMORY_SECRET_KEY`. Fatal
    /// ([`ConfigError::MissingSecretKey`]) if unset or empty.
    pub fn load_secret_key(&self) -> Result<Vec<u8>, ConfigError> {
        let raw = env::var("MEMORY_SECRET_KEY").unwrap_or_default();
        if raw.is_empty() {
            return Err(ConfigError::MissingSecretKey("MEMORY_SECRET_KEY"));
        }
        Ok(raw.into_bytes())
    }

    /// Validate numeric ranges and directory reachability. Does not check
    /// the secret key — callers needing that call [`Self::load_secret_key`]
    /// separately since it is sourced from the environment, not the struct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.stm_trim_batch == 0 || self.memory.stm_trim_batch > self.memory.stm_max_entries {
            return Err(ConfigError::InvalidRange {
                field: "memory.stm_trim_batch",
                constraint: "nonzero and <= stm_max_entries",
                value: self.memory.stm_trim_batch.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.memory.promote_importance_threshold) {
            return Err(ConfigError::InvalidRange {
                field: "memory.promote_importance_threshold",
                constraint: "within [0,1]",
                value: self.memory.promote_importance_threshold.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.memory.promote_emotion_threshold) {
            return Err(ConfigError::InvalidRange {
                field: "memory.promote_emotion_threshold",
                constraint: "within [0,1]",
                value: self.memory.promote_emotion_threshold.to_string(),
            });
        }
        if self.dialogue.max_turns == 0 {
            return Err(ConfigError::InvalidRange {
                field: "dialogue.max_turns",
                constraint: "> 0",
                value: "0".to_string(),
            });
        }
        if self.dialogue.timeout_minutes == 0 {
            return Err(ConfigError::InvalidRange {
                field: "dialogue.timeout_minutes",
                constraint: "> 0",
                value: "0".to_string(),
            });
        }

        let data_dir = PathBuf::from(&self.memory.data_dir);
        if let Some(parent) = data_dir.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::DataDirParentMissing(parent.to_path_buf()));
            }
        }

        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.memory.data_dir)
    }
}
