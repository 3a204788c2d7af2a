//! Wire types shared across the memory core: the dialogue-log entry, the two
//! persisted memory layers, and the signing key bookkeeping row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry in the in-memory dialogue log. Created by the driver on each
/// turn, never mutated, never deleted — only ever trimmed out of persisted
/// STM when the per-agent cap is exceeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub role: String,
    pub text: String,
    pub emotion_label: Option<String>,
    pub emotion_intensity: f32,
    pub importance: f32,
    pub topic_label: String,
    pub turn_index: u64,
}

/// An entry in an agent's short-term bounded append-log. A thin projection
/// of [`Utterance`] — STM does not need the full dialogue-log shape, only
/// enough to reconstruct context and feed the dream cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StmEntry {
    pub agent: String,
    pub content: String,
    pub topic: Option<String>,
    pub emotion: Option<String>,
    pub emotion_intensity: Option<f32>,
    pub importance: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryLayer {
    Conscious,
    Subconscious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemorySource {
    Stm,
    Dream,
    Reflection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotedFrom {
    Subconscious,
    Direct,
}

/// A persisted, tamper-evident long-term memory row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LtmRecord {
    pub id: Uuid,
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    pub layer: MemoryLayer,
    pub content: String,
    pub topic: Option<String>,
    pub emotion: Option<String>,
    pub emotion_intensity: Option<f32>,
    pub importance: Option<f32>,
    pub source: MemorySource,
    pub promoted_from: Option<PromotedFrom>,
    /// Repressed marker — `true` when the content was classified as
    /// intrusive during dream-cycle defense classification.
    pub intrusive: bool,
    pub suppressed: bool,
    /// Hex-encoded HMAC-SHA256 over the canonical payload (see `signing`).
    pub signature: String,
}

/// A record as returned to callers: the stored row plus whether its
/// signature re-verified on read.
#[derive(Debug, Clone)]
pub struct VerifiedLtmRecord {
    pub record: LtmRecord,
    pub unverified: bool,
}

/// Single-row table holding the hex fingerprint of the signing key that was
/// active the last time the store was opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySettings {
    pub key_fingerprint: String,
}
