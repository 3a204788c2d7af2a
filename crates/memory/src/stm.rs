//! Per-agent short-term memory: a bounded append-log persisted as
//! `stm_<agent>.json`, replaced atomically on every write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::schema::StmEntry;

pub const STM_MAX_ENTRIES_DEFAULT: usize = 100_000;
pub const STM_TRIM_BATCH_DEFAULT: usize = 2_000;

/// Per-agent bounded append-log, backed by one JSON file under `data_dir`.
#[derive(Debug, Clone)]
pub struct StmStore {
    data_dir: PathBuf,
    max_entries: usize,
    trim_batch: usize,
}

impl StmStore {
    pub fn new(data_dir: impl Into<PathBuf>, max_entries: usize, trim_batch: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_entries,
            trim_batch,
        }
    }

    fn path_for(&self, agent: &str) -> PathBuf {
        self.data_dir.join(format!("stm_{agent}.json"))
    }

    /// Load the full bounded list in insertion order. Empty on first use.
    /// A file that fails to parse is treated as empty STM: a WARN is logged
    /// and the file is renamed to `.corrupt.<timestamp>` so no data is
    /// silently destroyed.
    pub fn load(&self, agent: &str) -> Result<Vec<StmEntry>> {
        let path = self.path_for(agent);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading STM file {}", path.display()))?;

        match serde_json::from_str::<Vec<StmEntry>>(&raw) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
                let corrupt_path = path.with_extension(format!("corrupt.{timestamp}"));
                tracing::warn!(
                    agent,
                    error = %err,
                    path = %path.display(),
                    corrupt_path = %corrupt_path.display(),
                    "STM file failed to parse — treating as empty and quarantining"
                );
                if let Err(rename_err) = std::fs::rename(&path, &corrupt_path) {
                    tracing::warn!(error = %rename_err, "failed to quarantine corrupt STM file");
                }
                Ok(Vec::new())
            }
        }
    }

    /// Append `entry`, enforcing the cap: when `len > max_entries`, the
    /// oldest `trim_batch` entries are dropped (FIFO). Writes via
    /// write-to-temp-then-rename so a crash mid-write never corrupts the
    /// live file.
    pub async fn append(&self, agent: &str, entry: StmEntry) -> Result<()> {
        let mut entries = self.load(agent)?;
        entries.push(entry);
        if entries.len() > self.max_entries {
            let drop_count = self.trim_batch.min(entries.len());
            entries.drain(0..drop_count);
        }
        self.overwrite(agent, &entries).await
    }

    /// Atomically replace the agent's STM file with `entries`.
    pub async fn overwrite(&self, agent: &str, entries: &[StmEntry]) -> Result<()> {
        let path = self.path_for(agent);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let write_result: Result<()> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .await?;
            let json = serde_json::to_vec(entries)?;
            file.write_all(&json).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("renaming {} into place", path.display()))?;
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(content: &str) -> StmEntry {
        StmEntry {
            agent: "socrates".to_string(),
            content: content.to_string(),
            topic: None,
            emotion: None,
            emotion_intensity: None,
            importance: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StmStore::new(dir.path(), 100, 10);
        store.append("socrates", entry("first")).await.unwrap();
        store.append("socrates", entry("second")).await.unwrap();

        let loaded = store.load("socrates").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "first");
        assert_eq!(loaded[1].content, "second");
    }

    #[tokio::test]
    async fn overflow_trims_oldest_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = StmStore::new(dir.path(), 5, 2);
        for i in 0..5 {
            store.append("socrates", entry(&format!("turn-{i}"))).await.unwrap();
        }
        // Sixth append pushes length to 6 > max_entries(5); drop 2 oldest.
        store.append("socrates", entry("turn-5")).await.unwrap();

        let loaded = store.load("socrates").unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[0].content, "turn-2");
        assert_eq!(loaded.last().unwrap().content, "turn-5");
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StmStore::new(dir.path(), 100, 10);
        assert!(store.load("nobody").unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_loads_as_empty_and_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let store = StmStore::new(dir.path(), 100, 10);
        let path = dir.path().join("stm_socrates.json");
        std::fs::write(&path, b"{not valid json").unwrap();

        let loaded = store.load("socrates").unwrap();
        assert!(loaded.is_empty());
        assert!(!path.exists());

        let quarantined = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains("corrupt"));
        assert!(quarantined);
    }
}
