//! Facade composing STM, LTM, retrieval, and dream-cycle promotion into the
//! single entry point the dialogue driver and agent-state layer consume.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::dream;
use crate::ltm::LtmStore;
use crate::retrieval::{self, RecencyFn};
use crate::schema::{LtmRecord, MemoryLayer, MemorySource, PromotedFrom, StmEntry, VerifiedLtmRecord};
use crate::stm::StmStore;

#[derive(Debug, Clone)]
pub struct MemoryCoreConfig {
    pub data_dir: PathBuf,
    pub stm_max_entries: usize,
    pub stm_trim_batch: usize,
}

pub struct MemoryCore {
    stm: StmStore,
    ltm: LtmStore,
    key: Vec<u8>,
}

impl MemoryCore {
    /// Open the STM/LTM stores under `config.data_dir`, running the
    /// key-rotation migration (§4.2) against `key` before returning.
    pub fn open(config: MemoryCoreConfig, key: Vec<u8>) -> Result<Self> {
        let stm = StmStore::new(
            config.data_dir.clone(),
            config.stm_max_entries,
            config.stm_trim_batch,
        );
        let ltm = LtmStore::open(config.data_dir.join("entelgia_memory.redb"))?;
        let migrated = ltm.ensure_key_current(&key)?;
        if migrated > 0 {
            info!(migrated, "re-signed LTM rows after signing-key rotation");
        }
        Ok(Self { stm, ltm, key })
    }

    pub async fn stm_append(&self, agent: &str, entry: StmEntry) -> Result<()> {
        self.stm.append(agent, entry).await
    }

    pub fn stm_load(&self, agent: &str) -> Result<Vec<StmEntry>> {
        self.stm.load(agent)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ltm_insert(
        &self,
        agent: &str,
        layer: MemoryLayer,
        content: String,
        topic: Option<String>,
        emotion: Option<String>,
        emotion_intensity: Option<f32>,
        importance: Option<f32>,
        source: MemorySource,
        promoted_from: Option<PromotedFrom>,
        intrusive: bool,
        suppressed: bool,
    ) -> Result<Uuid> {
        let record = LtmRecord {
            id: Uuid::nil(),
            agent: agent.to_string(),
            timestamp: Utc::now(),
            layer,
            content,
            topic,
            emotion,
            emotion_intensity,
            importance,
            source,
            promoted_from,
            intrusive,
            suppressed,
            signature: String::new(),
        };
        self.ltm.insert(&self.key, record)
    }

    pub fn ltm_recent(
        &self,
        agent: &str,
        limit: usize,
        layer: Option<MemoryLayer>,
    ) -> Result<Vec<VerifiedLtmRecord>> {
        self.ltm.recent(&self.key, agent, limit, layer)
    }

    /// Top-`n` relevance-scored LTM entries for `agent` against `topic` and
    /// the recent dialogue text, using the default (pluggable) recency
    /// function.
    pub fn relevant_ltm(
        &self,
        agent: &str,
        topic: &str,
        recent_dialog_text: &str,
        n: usize,
    ) -> Result<Vec<(LtmRecord, f32)>> {
        self.relevant_ltm_with_recency(agent, topic, recent_dialog_text, n, retrieval::constant_recency)
    }

    pub fn relevant_ltm_with_recency(
        &self,
        agent: &str,
        topic: &str,
        recent_dialog_text: &str,
        n: usize,
        recency_fn: RecencyFn,
    ) -> Result<Vec<(LtmRecord, f32)>> {
        let rows = self.ltm.recent(&self.key, agent, usize::MAX, None)?;
        let records: Vec<LtmRecord> = rows.into_iter().map(|v| v.record).collect();
        let ranked = retrieval::top_n_by_relevance(&records, topic, recent_dialog_text, n, recency_fn);
        Ok(ranked.into_iter().map(|(r, s)| (r.clone(), s)).collect())
    }

    /// Insert a dream-cycle reflection as a subconscious LTM row.
    pub fn insert_dream_reflection(&self, agent: &str, reflection: String) -> Result<Uuid> {
        self.ltm_insert(
            agent,
            MemoryLayer::Subconscious,
            reflection,
            None,
            None,
            None,
            None,
            MemorySource::Dream,
            None,
            false,
            false,
        )
    }

    /// Promote whichever of `recent_entries` clear the dream-cycle
    /// thresholds to conscious LTM, applying defense classification first.
    pub fn promote_stm_entries(
        &self,
        agent: &str,
        recent_entries: &[StmEntry],
        importance_threshold: f32,
        emotion_threshold: f32,
    ) -> Result<Vec<Uuid>> {
        let candidates = dream::select_promotions(recent_entries, importance_threshold, emotion_threshold);
        let mut ids = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let id = self.ltm_insert(
                agent,
                MemoryLayer::Conscious,
                candidate.entry.content.clone(),
                candidate.entry.topic.clone(),
                candidate.entry.emotion.clone(),
                candidate.entry.emotion_intensity,
                candidate.entry.importance,
                MemorySource::Dream,
                Some(PromotedFrom::Subconscious),
                candidate.intrusive,
                candidate.suppressed,
            )?;
            ids.push(id);
        }
        Ok(ids)
    }
}
