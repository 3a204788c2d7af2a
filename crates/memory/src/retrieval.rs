//! Relevance-scored retrieval for prompt construction.
//!
//! `score(memory, topic, recent_dialog)` combines Jaccard keyword overlap
//! with the topic label, stored importance, Jaccard overlap with recent
//! dialogue, and a recency term. The recency term is left pluggable — see
//! `RecencyFn` below — because the source this crate's behavior is grounded
//! on treats it as a constant and the correct monotone-in-timestamp
//! function was left unspecified (open question, recorded in `DESIGN.md`).

use std::collections::HashSet;

use crate::schema::LtmRecord;

const TOPIC_WEIGHT: f32 = 0.40;
const IMPORTANCE_WEIGHT: f32 = 0.30;
const RECENT_DIALOG_WEIGHT: f32 = 0.20;
const RECENCY_WEIGHT: f32 = 0.10;

/// Pluggable recency proxy. Defaults to the constant the reference
/// implementation used.
pub type RecencyFn = fn(&LtmRecord) -> f32;

pub fn constant_recency(_record: &LtmRecord) -> f32 {
    0.5
}

/// Keywords: lowercase words of 4+ letters, mirroring the extraction rule
/// used by the metrics crate (duplicated intentionally — each crate is a
/// small, independently usable library and this function is a few lines).
pub fn keywords(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    let mut out = HashSet::new();
    let mut current = String::new();
    for ch in lower.chars() {
        if ch.is_ascii_lowercase() {
            current.push(ch);
        } else if current.len() >= 4 {
            out.insert(std::mem::take(&mut current));
        } else {
            current.clear();
        }
    }
    if current.len() >= 4 {
        out.insert(current);
    }
    out
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Score a single memory against the active topic label and the
/// concatenation of the last three utterances. Clamped to `[0,1]`.
pub fn score(
    record: &LtmRecord,
    topic: &str,
    recent_dialog_text: &str,
    recency_fn: RecencyFn,
) -> f32 {
    let content_kw = keywords(&record.content);
    let topic_kw = keywords(topic);
    let recent_kw = keywords(recent_dialog_text);

    let topic_score = jaccard(&content_kw, &topic_kw);
    let importance = record.importance.unwrap_or(0.0).clamp(0.0, 1.0);
    let recent_score = jaccard(&content_kw, &recent_kw);
    let recency = recency_fn(record).clamp(0.0, 1.0);

    let total = TOPIC_WEIGHT * topic_score
        + IMPORTANCE_WEIGHT * importance
        + RECENT_DIALOG_WEIGHT * recent_score
        + RECENCY_WEIGHT * recency;

    total.clamp(0.0, 1.0)
}

/// Rank `candidates` by [`score`] and return the top `n`, highest first.
pub fn top_n_by_relevance<'a>(
    candidates: &'a [LtmRecord],
    topic: &str,
    recent_dialog_text: &str,
    n: usize,
    recency_fn: RecencyFn,
) -> Vec<(&'a LtmRecord, f32)> {
    let mut scored: Vec<(&LtmRecord, f32)> = candidates
        .iter()
        .map(|record| (record, score(record, topic, recent_dialog_text, recency_fn)))
        .collect();
    scored.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    scored.truncate(n);
    scored
}
