//! Pressure: the urgency scalar with inertia that forces brevity (§4.3).

use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct PressureInputs {
    pub conflict_index: f32,
    pub unresolved_open_questions: u32,
    pub energy: f32,
    pub stagnation: f32,
}

const ALPHA_PREV: f32 = 0.65;
const ALPHA_TARGET: f32 = 0.35;
const CALM_DECAY: f32 = 0.4;

/// `raw = 0.45*(C/10) + 0.25*(unresolved/3) + 0.20*(1 - energy/100) + 0.10*stagnation`,
/// `target = 10*clamp(raw,0,1)`, `P_new = 0.65*P_prev + 0.35*target`, with an
/// additive `-0.4` decay applied when "calm" (`C<4 && stagnation<0.3 &&
/// unresolved==0`). Clamped to `[0,10]`.
pub fn update_pressure(previous: f32, inputs: PressureInputs) -> f32 {
    let raw = 0.45 * (inputs.conflict_index / 10.0)
        + 0.25 * (inputs.unresolved_open_questions as f32 / 3.0)
        + 0.20 * (1.0 - inputs.energy / 100.0)
        + 0.10 * inputs.stagnation;
    let target = 10.0 * raw.clamp(0.0, 1.0);

    let mut pressure = ALPHA_PREV * previous + ALPHA_TARGET * target;

    let calm = inputs.conflict_index < 4.0 && inputs.stagnation < 0.3 && inputs.unresolved_open_questions == 0;
    if calm {
        pressure -= CALM_DECAY;
    }

    pressure.clamp(0.0, 10.0)
}

/// Word cap implied by the current pressure level: `>= 8` => 80 words,
/// `[5,8)` => 120 words, otherwise the standard 150-word cap.
pub fn word_cap_for_pressure(pressure: f32) -> usize {
    if pressure >= 8.0 {
        80
    } else if pressure >= 5.0 {
        120
    } else {
        150
    }
}

/// Tracks the small unresolved-open-questions counter: increments when an
/// utterance ends with a question mark, decrements (floored at 0) when the
/// next utterance begins with an answer marker.
const ANSWER_MARKERS: &[&str] = &["a", "b", "because", "yes", "no", "indeed"];

pub fn update_unresolved_counter(current: u32, previous_text: &str, new_text: &str) -> u32 {
    let mut counter = current;
    if previous_text.trim_end().ends_with('?') {
        counter += 1;
    }
    let lower = new_text.trim_start().to_lowercase();
    let starts_with_answer = ANSWER_MARKERS
        .iter()
        .any(|marker| lower.starts_with(marker));
    if starts_with_answer {
        counter = counter.saturating_sub(1);
    }
    counter
}

/// Keywords: lowercase words matching `[a-z]{4,}`.
fn keywords_over_four_chars(text: &str) -> HashSet<String> {
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

/// `1.0` when the topic signature — the keyword set of a turn — hasn't
/// changed between the last two turns, `0.0` otherwise.
pub fn stagnation(last_text: &str, previous_text: &str) -> f32 {
    if keywords_over_four_chars(last_text) == keywords_over_four_chars(previous_text) {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_stays_within_bounds() {
        let mut pressure = 0.0;
        for _ in 0..50 {
            pressure = update_pressure(
                pressure,
                PressureInputs { conflict_index: 10.0, unresolved_open_questions: 5, energy: 0.0, stagnation: 1.0 },
            );
            assert!((0.0..=10.0).contains(&pressure));
        }
    }

    #[test]
    fn pressure_stagnation_scenario_reaches_baseline_plus_two() {
        let mut pressure = 2.0;
        for _ in 0..8 {
            pressure = update_pressure(
                pressure,
                PressureInputs { conflict_index: 5.0, unresolved_open_questions: 2, energy: 80.0, stagnation: 1.0 },
            );
        }
        assert!(pressure >= 4.0, "expected final pressure >= 4.0, got {pressure}");
    }

    #[test]
    fn word_cap_tiers_match_spec() {
        assert_eq!(word_cap_for_pressure(9.0), 80);
        assert_eq!(word_cap_for_pressure(8.0), 80);
        assert_eq!(word_cap_for_pressure(6.0), 120);
        assert_eq!(word_cap_for_pressure(5.0), 120);
        assert_eq!(word_cap_for_pressure(4.9), 150);
        assert_eq!(word_cap_for_pressure(0.0), 150);
    }

    #[test]
    fn unresolved_counter_increments_on_question_and_decrements_on_answer() {
        let after_question = update_unresolved_counter(0, "what should we do?", "let's wait");
        assert_eq!(after_question, 1);

        let after_answer = update_unresolved_counter(1, "what should we do?", "because it's safer");
        assert_eq!(after_answer, 0);
    }

    #[test]
    fn unresolved_counter_never_goes_negative() {
        let counter = update_unresolved_counter(0, "a statement.", "yes, agreed");
        assert_eq!(counter, 0);
    }

    #[test]
    fn stagnation_is_one_when_keyword_sets_match() {
        let a = "consciousness emerges from complex information processing";
        let b = "complex information processing gives rise to consciousness";
        assert_eq!(stagnation(a, b), 1.0);
    }

    #[test]
    fn stagnation_is_zero_when_keyword_sets_differ() {
        let a = "consciousness emerges from complex systems";
        let b = "the weather today is quite pleasant";
        assert_eq!(stagnation(a, b), 0.0);
    }
}
