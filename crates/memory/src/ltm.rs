//! Long-term memory store: a `redb`-backed, tamper-evident table of
//! [`LtmRecord`] rows plus a single-row key-fingerprint table, matching the
//! `entelgia_memory.<store>` persisted layout (`memories` + `settings`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::schema::{LtmRecord, MemoryLayer, VerifiedLtmRecord};
use crate::signing;

const MEMORIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("memories");
const SETTINGS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("settings");

const FINGERPRINT_KEY: &str = "key_fingerprint";

pub struct LtmStore {
    db: Database,
    path: PathBuf,
}

impl LtmStore {
    /// Open (or create) the store file at `path`, ensuring both tables
    /// exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(&path)
            .with_context(|| format!("opening LTM store at {}", path.display()))?;
        {
            let tx = db.begin_write()?;
            tx.open_table(MEMORIES_TABLE)?;
            tx.open_table(SETTINGS_TABLE)?;
            tx.commit()?;
        }
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Allocate a UUID, stamp `timestamp` (already set on `record`), compute
    /// the signature over the canonical payload, and write the row.
    pub fn insert(&self, key: &[u8], mut record: LtmRecord) -> Result<Uuid> {
        if record.id.is_nil() {
            record.id = Uuid::new_v4();
        }
        record.signature = signing::sign(
            key,
            &record.content,
            record.topic.as_deref(),
            record.emotion.as_deref(),
            &record.timestamp.to_rfc3339(),
        );

        let id = record.id;
        let bytes = serde_json::to_vec(&record)?;
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(MEMORIES_TABLE)?;
            table.insert(id.to_string().as_str(), bytes.as_slice())?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Up to `limit` most recent rows for `agent`, optionally filtered by
    /// `layer`, newest-first. Each row's signature is re-verified against
    /// `key`; a mismatch is logged as WARN and the row is still returned
    /// with `unverified = true`.
    pub fn recent(
        &self,
        key: &[u8],
        agent: &str,
        limit: usize,
        layer: Option<MemoryLayer>,
    ) -> Result<Vec<VerifiedLtmRecord>> {
        let mut rows = self.all_for_agent(agent, layer)?;
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit);

        Ok(rows
            .into_iter()
            .map(|record| {
                let verified = signing::verify_with_legacy_fallback(
                    key,
                    &record.content,
                    record.topic.as_deref(),
                    record.emotion.as_deref(),
                    &record.timestamp.to_rfc3339(),
                    &record.signature,
                );
                if !verified {
                    tracing::warn!(id = %record.id, agent = %record.agent, "LTM signature mismatch on read — returning as unverified");
                }
                VerifiedLtmRecord {
                    record,
                    unverified: !verified,
                }
            })
            .collect())
    }

    fn all_for_agent(&self, agent: &str, layer: Option<MemoryLayer>) -> Result<Vec<LtmRecord>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(MEMORIES_TABLE)?;
        let mut out = Vec::new();
        for row in table.iter()? {
            let (_, value) = row?;
            let record: LtmRecord = serde_json::from_slice(value.value())?;
            if record.agent != agent {
                continue;
            }
            if let Some(want_layer) = layer {
                if record.layer != want_layer {
                    continue;
                }
            }
            out.push(record);
        }
        Ok(out)
    }

    fn all(&self) -> Result<Vec<LtmRecord>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(MEMORIES_TABLE)?;
        let mut out = Vec::new();
        for row in table.iter()? {
            let (_, value) = row?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    fn put(&self, record: &LtmRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(MEMORIES_TABLE)?;
            table.insert(record.id.to_string().as_str(), bytes.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn stored_fingerprint(&self) -> Result<Option<String>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(SETTINGS_TABLE)?;
        Ok(table.get(FINGERPRINT_KEY)?.map(|v| v.value().to_string()))
    }

    fn set_fingerprint(&self, fingerprint: &str) -> Result<()> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(SETTINGS_TABLE)?;
            table.insert(FINGERPRINT_KEY, fingerprint)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Key-rotation migration: on startup, compute the fingerprint of the
    /// current key. If absent, store it (first run). If present and
    /// different from the current key's fingerprint, re-sign every row with
    /// the current key and overwrite the stored fingerprint. Idempotent —
    /// calling this again with the same key is a no-op after the first
    /// successful run.
    pub fn ensure_key_current(&self, key: &[u8]) -> Result<usize> {
        let current_fingerprint = signing::key_fingerprint(key);
        match self.stored_fingerprint()? {
            None => {
                self.set_fingerprint(&current_fingerprint)?;
                Ok(0)
            }
            Some(stored) if stored == current_fingerprint => Ok(0),
            Some(_) => {
                let resigned = self.resign_all(key)?;
                self.set_fingerprint(&current_fingerprint)?;
                Ok(resigned)
            }
        }
    }

    /// Re-sign every stored row with `key`. Crash-safe and idempotent: each
    /// row is an independent `redb` transaction, so a crash mid-migration
    /// leaves already-migrated rows signed with the new key and the rest
    /// unchanged; re-running the migration simply re-signs everything again
    /// (signing is deterministic, so repeated signing is harmless).
    fn resign_all(&self, key: &[u8]) -> Result<usize> {
        let mut count = 0;
        for mut record in self.all()? {
            record.signature = signing::sign(
                key,
                &record.content,
                record.topic.as_deref(),
                record.emotion.as_deref(),
                &record.timestamp.to_rfc3339(),
            );
            self.put(&record)?;
            count += 1;
        }
        Ok(count)
    }
}
