//! The five ordered intervention detectors (§4.4), tried in order against up
//! to the last 10 utterances; the first match wins.

use std::collections::HashSet;

/// A turn as the observer sees it — just enough to run the detectors.
#[derive(Debug, Clone)]
pub struct ObservedTurn {
    pub role: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    CircularReasoning,
    HighConflictNoResolution,
    ShallowDiscussion,
    MissedSynthesis,
    ScheduledMetaReflection,
}

const CONFLICT_MARKERS: &[&str] = &[
    "not", "but", "however", "wrong", "incorrect", "actually", "contrary", "opposite",
    // Hebrew equivalents, per the original implementation's conflict_markers list.
    "לא", "אבל", "טעות", "שגוי",
];

const DEPTH_MARKERS: &[&str] = &[
    "why", "because", "therefore", "implies", "consequence", "deeper", "fundamental", "underlying",
    // Hebrew equivalents.
    "מדוע", "כי", "עמוק", "יסוד", "השלכה",
];

const SYNTHESIS_MARKERS: &[&str] = &[
    "connect", "integrate", "together", "both", "combine",
    // Hebrew equivalents.
    "מחבר", "משלב", "יחד", "שניהם", "גם",
];

fn keywords_over_four_chars(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    let mut out = HashSet::new();
    let mut current = String::new();
    for ch in lower.chars() {
        if ch.is_alphanumeric() {
            current.push(ch);
        } else {
            if current.chars().count() > 4 {
                out.insert(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.chars().count() > 4 {
        out.insert(current);
    }
    out
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Detector 1: `>= 3` turn-pairs in the window with word-set Jaccard `> 0.5`
/// over words longer than 4 chars.
fn detect_circular_reasoning(turns: &[ObservedTurn]) -> bool {
    if turns.len() < 4 {
        return false;
    }
    let keywords: Vec<HashSet<String>> = turns.iter().map(|t| keywords_over_four_chars(&t.text)).collect();

    let mut high_overlap_pairs = 0;
    for i in 0..keywords.len() {
        for j in (i + 1)..keywords.len() {
            if jaccard(&keywords[i], &keywords[j]) > 0.5 {
                high_overlap_pairs += 1;
            }
        }
    }
    high_overlap_pairs >= 3
}

/// Detector 2 (turn >= 6): more than 60% of the window's turns contain a
/// disagreement marker.
fn detect_high_conflict(turns: &[ObservedTurn]) -> bool {
    if turns.len() < 4 {
        return false;
    }
    let conflicted = turns
        .iter()
        .filter(|t| {
            let lower = t.text.to_lowercase();
            CONFLICT_MARKERS.iter().any(|marker| lower.contains(marker))
        })
        .count();
    (conflicted as f64 / turns.len() as f64) > 0.6
}

/// Detector 3 (turn >= 10): average turn length under 150 chars and fewer
/// than 30% of turns contain a depth marker.
fn detect_shallow_discussion(turns: &[ObservedTurn]) -> bool {
    if turns.len() < 6 {
        return false;
    }
    let avg_len = turns.iter().map(|t| t.text.chars().count()).sum::<usize>() as f64 / turns.len() as f64;
    let depth_count = turns
        .iter()
        .filter(|t| {
            let lower = t.text.to_lowercase();
            DEPTH_MARKERS.iter().any(|marker| lower.contains(marker))
        })
        .count();
    avg_len < 150.0 && (depth_count as f64 / turns.len() as f64) < 0.3
}

/// Detector 4 (turn >= 5): none of the last 3 turns contains a synthesis
/// marker, and at least 5 turns of content exist.
fn detect_missed_synthesis(turns: &[ObservedTurn]) -> bool {
    if turns.len() < 5 {
        return false;
    }
    let last_three = &turns[turns.len().saturating_sub(3)..];
    let has_synthesis = last_three.iter().any(|t| {
        let lower = t.text.to_lowercase();
        SYNTHESIS_MARKERS.iter().any(|marker| lower.contains(marker))
    });
    !has_synthesis
}

/// Detector 5: `turn > 15 && turn % 15 == 0`.
fn detect_scheduled_meta_reflection(turn_index: u64) -> bool {
    turn_index > 15 && turn_index % 15 == 0
}

/// Run all five detectors in order against `turns` (the caller passes the
/// last up-to-10 utterances) and `turn_index` (the current turn number).
/// Returns the first detector that fires, if any.
pub fn detect(turns: &[ObservedTurn], turn_index: u64) -> Option<Detector> {
    if detect_circular_reasoning(turns) {
        return Some(Detector::CircularReasoning);
    }
    if turn_index >= 6 && detect_high_conflict(turns) {
        return Some(Detector::HighConflictNoResolution);
    }
    if turn_index >= 10 && detect_shallow_discussion(turns) {
        return Some(Detector::ShallowDiscussion);
    }
    if turn_index >= 5 && detect_missed_synthesis(turns) {
        return Some(Detector::MissedSynthesis);
    }
    if detect_scheduled_meta_reflection(turn_index) {
        return Some(Detector::ScheduledMetaReflection);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, text: &str) -> ObservedTurn {
        ObservedTurn { role: role.to_string(), text: text.to_string() }
    }

    #[test]
    fn circular_reasoning_fires_on_repeated_content() {
        let text = "consciousness emerges from complex information processing systems";
        let turns: Vec<ObservedTurn> = (0..5).map(|i| turn(if i % 2 == 0 { "Socrates" } else { "Athena" }, text)).collect();
        assert_eq!(detect(&turns, 5), Some(Detector::CircularReasoning));
    }

    #[test]
    fn high_conflict_requires_turn_at_least_six() {
        let turns: Vec<ObservedTurn> = (0..4)
            .map(|_| turn("Socrates", "however that is wrong and incorrect, actually the opposite"))
            .collect();
        assert_ne!(detect(&turns, 5), Some(Detector::HighConflictNoResolution));
        assert_eq!(detect(&turns, 6), Some(Detector::HighConflictNoResolution));
    }

    #[test]
    fn shallow_discussion_requires_turn_at_least_ten() {
        let turns: Vec<ObservedTurn> = (0..6).map(|_| turn("Socrates", "yes indeed")).collect();
        assert_ne!(detect(&turns, 9), Some(Detector::ShallowDiscussion));
        assert_eq!(detect(&turns, 10), Some(Detector::ShallowDiscussion));
    }

    #[test]
    fn missed_synthesis_fires_when_no_recent_synthesis_marker() {
        let turns: Vec<ObservedTurn> = (0..5)
            .map(|i| turn("Socrates", &format!("point number {i} about justice and virtue")))
            .collect();
        assert_eq!(detect(&turns, 5), Some(Detector::MissedSynthesis));
    }

    #[test]
    fn missed_synthesis_does_not_fire_when_recent_turn_has_marker() {
        let mut turns: Vec<ObservedTurn> = (0..4)
            .map(|i| turn("Socrates", &format!("point number {i} about justice and virtue")))
            .collect();
        turns.push(turn("Athena", "let's connect both ideas together"));
        assert_ne!(detect(&turns, 5), Some(Detector::MissedSynthesis));
    }

    #[test]
    fn scheduled_meta_reflection_fires_on_multiples_of_fifteen_past_fifteen() {
        assert_eq!(detect(&[], 30), Some(Detector::ScheduledMetaReflection));
        assert_eq!(detect(&[], 15), None);
        assert_eq!(detect(&[], 14), None);
    }

    #[test]
    fn no_detector_fires_on_healthy_short_dialogue() {
        let turns = vec![
            turn("Socrates", "what grounds our sense of justice here"),
            turn("Athena", "perhaps shared vulnerability grounds it"),
        ];
        assert_eq!(detect(&turns, 3), None);
    }
}
