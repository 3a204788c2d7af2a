//! Pure dialogue-quality metrics: circularity, progress, intervention utility.
//!
//! These functions take only the information a metric genuinely needs (role
//! and text), so offline ablation tooling can score a dialogue without
//! depending on the full memory/session machinery.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Minimal view of a dialogue turn — everything the metrics in this crate
/// look at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricTurn {
    pub role: String,
    pub text: String,
}

impl MetricTurn {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }
}

const FIXY_ROLE: &str = "Fixy";

/// Keywords: lowercase words matching `[a-z]{4,}`.
pub fn keywords(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    let mut out = HashSet::new();
    let mut current = String::new();
    for ch in lower.chars() {
        if ch.is_ascii_lowercase() {
            current.push(ch);
        } else {
            if current.len() >= 4 {
                out.insert(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() >= 4 {
        out.insert(current);
    }
    out
}

/// The topic signature of a turn is simply its keyword set.
pub fn topic_signature(turn: &MetricTurn) -> HashSet<String> {
    keywords(&turn.text)
}

/// Jaccard similarity, zero on empty union.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

const SYNTHESIS_MARKERS: &[&str] = &[
    "therefore",
    "integrating",
    "combining",
    "synthesis",
    "synthesize",
    "connect",
    "connecting",
    "both",
    "together",
    "unified",
    "merging",
    "bridge",
    "converge",
    "overall",
    "in sum",
    "to sum",
];

const RESOLUTION_MARKERS: &[&str] = &[
    "answer",
    "resolve",
    "resolved",
    "solution",
    "because",
    "explains",
    "explained",
    "clarifies",
    "hence",
    "thus",
    "so",
];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    let lower = text.to_lowercase();
    markers.iter().any(|marker| lower.contains(marker))
}

/// Fraction of turn-pairs (considering only pairs where at least one side has
/// keywords) with Jaccard >= `threshold`. Zero on fewer than 2 turns.
pub fn circularity_rate(dialog: &[MetricTurn], threshold: f64) -> f64 {
    if dialog.len() < 2 {
        return 0.0;
    }
    let signatures: Vec<HashSet<String>> = dialog.iter().map(topic_signature).collect();

    let mut eligible_pairs = 0u64;
    let mut circular_pairs = 0u64;
    for i in 0..signatures.len() {
        for j in (i + 1)..signatures.len() {
            if signatures[i].is_empty() && signatures[j].is_empty() {
                continue;
            }
            eligible_pairs += 1;
            if jaccard(&signatures[i], &signatures[j]) >= threshold {
                circular_pairs += 1;
            }
        }
    }
    if eligible_pairs == 0 {
        0.0
    } else {
        circular_pairs as f64 / eligible_pairs as f64
    }
}

/// Sliding-window circularity rate per turn index. Length equals dialog
/// length; the first element is always 0.
pub fn circularity_per_turn(dialog: &[MetricTurn], window: usize, threshold: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(dialog.len());
    for i in 0..dialog.len() {
        if i == 0 {
            out.push(0.0);
            continue;
        }
        let start = i.saturating_sub(window.saturating_sub(1));
        let slice = &dialog[start..=i];
        out.push(circularity_rate(slice, threshold));
    }
    out
}

/// Fraction of turns (from the second onward) that represent a "forward
/// step": a topic shift, a synthesis marker, or a resolution of the previous
/// turn's question. Each turn counts at most once. Capped at 1.0.
pub fn progress_rate(dialog: &[MetricTurn]) -> f64 {
    if dialog.len() < 2 {
        return 0.0;
    }
    let signatures: Vec<HashSet<String>> = dialog.iter().map(topic_signature).collect();

    let mut forward_steps = 0u64;
    for i in 1..dialog.len() {
        let prev_sig = &signatures[i - 1];
        let cur_sig = &signatures[i];
        let has_keywords = !prev_sig.is_empty() || !cur_sig.is_empty();

        let topic_shift = has_keywords && jaccard(prev_sig, cur_sig) < 0.4;
        let has_synthesis = contains_any(&dialog[i].text, SYNTHESIS_MARKERS);
        let prev_questioned = dialog[i - 1].text.trim_end().ends_with('?');
        let resolves = prev_questioned && contains_any(&dialog[i].text, RESOLUTION_MARKERS);

        if topic_shift || has_synthesis || resolves {
            forward_steps += 1;
        }
    }

    let rate = forward_steps as f64 / (dialog.len() - 1) as f64;
    rate.min(1.0)
}

/// Mean `before - after` circularity across every Fixy intervention turn,
/// where `before`/`after` are circularity computed over the `window` turns
/// immediately preceding/following the intervention. Interventions whose
/// window on either side is empty (too close to the start/end) are skipped.
/// Returns 0 if there are no Fixy turns with both windows available.
pub fn intervention_utility(dialog: &[MetricTurn], window: usize, threshold: f64) -> f64 {
    let mut deltas = Vec::new();
    for (i, turn) in dialog.iter().enumerate() {
        if turn.role != FIXY_ROLE {
            continue;
        }
        let before_start = i.saturating_sub(window);
        let before = &dialog[before_start..i];
        let after_end = (i + 1 + window).min(dialog.len());
        let after = &dialog[(i + 1).min(dialog.len())..after_end];
        if before.is_empty() || after.is_empty() {
            continue;
        }
        let before_rate = circularity_rate(before, threshold);
        let after_rate = circularity_rate(after, threshold);
        deltas.push(before_rate - after_rate);
    }
    if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().sum::<f64>() / deltas.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, text: &str) -> MetricTurn {
        MetricTurn::new(role, text)
    }

    #[test]
    fn keywords_filters_short_words_and_lowercases() {
        let kws = keywords("Consciousness emerges from a complex system!");
        assert!(kws.contains("consciousness"));
        assert!(kws.contains("emerges"));
        assert!(kws.contains("complex"));
        assert!(kws.contains("system"));
        assert!(!kws.contains("a"));
        assert!(!kws.contains("from"));
    }

    #[test]
    fn jaccard_empty_union_is_zero() {
        let a = HashSet::new();
        let b = HashSet::new();
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn circularity_rate_zero_under_two_turns() {
        let dialog = vec![turn("Socrates", "consciousness emerges")];
        assert_eq!(circularity_rate(&dialog, 0.5), 0.0);
        assert_eq!(circularity_rate(&[], 0.5), 0.0);
    }

    #[test]
    fn identical_repetition_scenario() {
        let text = "consciousness emerges from complex information processing systems";
        let dialog: Vec<MetricTurn> = (0..6)
            .map(|i| turn(if i % 2 == 0 { "Socrates" } else { "Athena" }, text))
            .collect();

        let circularity = circularity_rate(&dialog, 0.5);
        assert!(circularity >= 0.8, "expected >=0.8, got {circularity}");

        let progress = progress_rate(&dialog);
        assert_eq!(progress, 0.0);

        let utility = intervention_utility(&dialog, 5, 0.5);
        assert_eq!(utility, 0.0);
    }

    #[test]
    fn circularity_range_and_progress_range_hold() {
        let dialog = vec![
            turn("Socrates", "what is the nature of justice in a republic"),
            turn("Athena", "justice requires balancing individual and collective good"),
            turn("Socrates", "but does that balance ever truly converge"),
            turn("Athena", "therefore we must integrate both perspectives together"),
        ];
        let circularity = circularity_rate(&dialog, 0.5);
        assert!((0.0..=1.0).contains(&circularity));
        let progress = progress_rate(&dialog);
        assert!((0.0..=1.0).contains(&progress));
    }

    #[test]
    fn intervention_utility_is_positive_when_fixy_reduces_overlap() {
        let repeated = "consciousness emerges from complex information processing systems";
        let dialog = vec![
            turn("Socrates", repeated),
            turn("Athena", repeated),
            turn("Socrates", repeated),
            turn("Fixy", "let's consider an entirely different angle on agency"),
            turn("Socrates", "agency requires autonomous deliberate choice making"),
            turn("Athena", "choice without constraint risks arbitrary unpredictable outcomes"),
        ];
        let utility = intervention_utility(&dialog, 3, 0.5);
        assert!(utility > 0.0, "expected positive utility, got {utility}");
    }

    #[test]
    fn intervention_utility_zero_without_fixy_turns() {
        let dialog = vec![
            turn("Socrates", "what is truth"),
            turn("Athena", "truth is correspondence to reality"),
        ];
        assert_eq!(intervention_utility(&dialog, 5, 0.5), 0.0);
    }

    #[test]
    fn circularity_per_turn_has_matching_length_and_zero_first() {
        let dialog = vec![
            turn("Socrates", "what is justice"),
            turn("Athena", "justice is fairness"),
            turn("Socrates", "what is justice"),
        ];
        let per_turn = circularity_per_turn(&dialog, 6, 0.5);
        assert_eq!(per_turn.len(), dialog.len());
        assert_eq!(per_turn[0], 0.0);
    }
}
