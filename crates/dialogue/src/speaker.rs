//! Speaker selection and Observer-allowance gating (§4.1).

use std::collections::HashSet;

use entelgia_agent::PersonaId;
use rand::Rng;

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

const FIXY_BASE_PROBABILITY: f32 = 0.20;
const FIXY_REPETITION_PROBABILITY: f32 = 0.35;
const FIXY_MIN_TURN_INDEX: u64 = 4;
const FIXY_OBSERVER_GAP: u64 = 3;

/// `(allowed, probability)` for letting the Observer speak this turn.
/// `turns_since_observer` is `None` if the Observer has never spoken yet.
pub fn allow_fixy(turn_index: u64, turns_since_observer: Option<u64>, last_five_turn_texts: &[String]) -> (bool, f32) {
    if turn_index < FIXY_MIN_TURN_INDEX {
        return (false, 0.0);
    }
    if let Some(gap) = turns_since_observer {
        if gap < FIXY_OBSERVER_GAP {
            return (false, 0.0);
        }
    }

    let keyword_sets: Vec<HashSet<String>> =
        last_five_turn_texts.iter().map(|t| keywords_over_four_chars(t)).collect();
    let mut high_overlap_pairs = 0;
    for i in 0..keyword_sets.len() {
        for j in (i + 1)..keyword_sets.len() {
            if jaccard(&keyword_sets[i], &keyword_sets[j]) > 0.6 {
                high_overlap_pairs += 1;
            }
        }
    }

    let probability = if high_overlap_pairs >= 2 { FIXY_REPETITION_PROBABILITY } else { FIXY_BASE_PROBABILITY };
    (true, probability)
}

const PARTICIPATION_WINDOW: usize = 10;

/// Count of `agent`'s turns among the last `window` entries of `history`
/// (most-recent-last order).
pub fn recent_participation(history: &[PersonaId], agent: PersonaId, window: usize) -> f32 {
    let start = history.len().saturating_sub(window);
    history[start..].iter().filter(|&&role| role == agent).count() as f32
}

fn score(
    candidate: PersonaId,
    history: &[PersonaId],
    conflict_index: &dyn Fn(PersonaId) -> f32,
    rng: &mut impl Rng,
) -> f32 {
    let base = (10.0 - recent_participation(history, candidate, PARTICIPATION_WINDOW)) + 0.1 * conflict_index(candidate);
    let jitter = rng.gen_range(0.9..=1.2);
    base * jitter
}

fn argmax_by_score(
    candidates: &[PersonaId],
    history: &[PersonaId],
    conflict_index: &dyn Fn(PersonaId) -> f32,
    rng: &mut impl Rng,
) -> PersonaId {
    let mut best = candidates[0];
    let mut best_score = score(best, history, conflict_index, rng);
    for &candidate in &candidates[1..] {
        let candidate_score = score(candidate, history, conflict_index, rng);
        if candidate_score > best_score {
            best = candidate;
            best_score = candidate_score;
        }
    }
    best
}

/// Choose the next speaker. `roster` is the non-observer protagonist list;
/// `last_two` holds the most recent speakers, most-recent-first (0, 1, or 2
/// entries); `history` is the full role sequence used for participation
/// scoring; `fixy_allowed`/`fixy_probability` come from [`allow_fixy`].
pub fn select_next_speaker(
    roster: &[PersonaId],
    last_two: &[PersonaId],
    history: &[PersonaId],
    fixy_allowed: bool,
    fixy_probability: f32,
    conflict_index: &dyn Fn(PersonaId) -> f32,
    rng: &mut impl Rng,
) -> PersonaId {
    if roster.len() < 2 {
        return roster[0];
    }

    if last_two.len() == 2 && last_two[0] == last_two[1] {
        let candidates: Vec<PersonaId> = roster.iter().copied().filter(|&p| p != last_two[0]).collect();
        return argmax_by_score(&candidates, history, conflict_index, rng);
    }

    if fixy_allowed && rng.r#gen::<f32>() < fixy_probability {
        return PersonaId::Fixy;
    }

    let current = last_two.first().copied();
    let candidates: Vec<PersonaId> = roster.iter().copied().filter(|&p| Some(p) != current).collect();
    let candidates = if candidates.is_empty() { roster.to_vec() } else { candidates };
    argmax_by_score(&candidates, history, conflict_index, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn no_conflict(_: PersonaId) -> f32 {
        0.0
    }

    #[test]
    fn forces_switch_after_two_same_speakers() {
        let roster = [PersonaId::Socrates, PersonaId::Athena];
        let history = [PersonaId::Athena, PersonaId::Socrates, PersonaId::Socrates, PersonaId::Socrates];
        let last_two = [PersonaId::Socrates, PersonaId::Socrates];
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let next = select_next_speaker(&roster, &last_two, &history, false, 0.0, &no_conflict, &mut rng);
            assert_eq!(next, PersonaId::Athena);
        }
    }

    #[test]
    fn single_candidate_roster_returns_it() {
        let roster = [PersonaId::Socrates];
        let mut rng = StdRng::seed_from_u64(1);
        let next = select_next_speaker(&roster, &[], &[], false, 0.0, &no_conflict, &mut rng);
        assert_eq!(next, PersonaId::Socrates);
    }

    #[test]
    fn picks_observer_when_roll_beats_probability() {
        let roster = [PersonaId::Socrates, PersonaId::Athena];
        let last_two = [PersonaId::Athena];
        // Seed chosen so the first f32 draw is well under 1.0; probability 1.0 always fires.
        let mut rng = StdRng::seed_from_u64(7);
        let next = select_next_speaker(&roster, &last_two, &[], true, 1.0, &no_conflict, &mut rng);
        assert_eq!(next, PersonaId::Fixy);
    }

    #[test]
    fn never_picks_observer_when_not_allowed() {
        let roster = [PersonaId::Socrates, PersonaId::Athena];
        let last_two = [PersonaId::Athena];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let next = select_next_speaker(&roster, &last_two, &[], false, 1.0, &no_conflict, &mut rng);
            assert_ne!(next, PersonaId::Fixy);
        }
    }

    #[test]
    fn allow_fixy_false_before_turn_four() {
        assert_eq!(allow_fixy(0, None, &[]).0, false);
        assert_eq!(allow_fixy(3, None, &[]).0, false);
        assert_eq!(allow_fixy(4, None, &[]).0, true);
    }

    #[test]
    fn allow_fixy_false_within_observer_gap() {
        assert_eq!(allow_fixy(10, Some(1), &[]).0, false);
        assert_eq!(allow_fixy(10, Some(3), &[]).0, true);
    }

    #[test]
    fn allow_fixy_raises_probability_on_repetition() {
        let text = "consciousness emerges from complex information processing systems".to_string();
        let texts = vec![text.clone(), text.clone(), text.clone(), text.clone(), text];
        let (allowed, probability) = allow_fixy(10, None, &texts);
        assert!(allowed);
        assert_eq!(probability, FIXY_REPETITION_PROBABILITY);
    }

    #[test]
    fn allow_fixy_base_probability_on_varied_dialogue() {
        let texts = vec![
            "what is justice".to_string(),
            "perhaps fairness matters most".to_string(),
            "consider the role of the state".to_string(),
            "virtue requires practice over time".to_string(),
            "knowledge alone is not sufficient".to_string(),
        ];
        let (allowed, probability) = allow_fixy(10, None, &texts);
        assert!(allowed);
        assert_eq!(probability, FIXY_BASE_PROBABILITY);
    }

    #[test]
    fn recent_participation_counts_within_window_only() {
        let history = [PersonaId::Socrates; 15];
        assert_eq!(recent_participation(&history, PersonaId::Socrates, 10), 10.0);
        assert_eq!(recent_participation(&history, PersonaId::Athena, 10), 0.0);
    }
}
