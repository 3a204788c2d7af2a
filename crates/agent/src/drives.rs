//! The drive tuple, conflict index, debate profile, and the per-turn drive
//! update rule (§4.3).

use serde::{Deserialize, Serialize};

use crate::persona::PersonaId;

/// Per-agent persistent drive tuple plus the runtime-only fields layered on
/// top of it. `conscious_memory`/`subconscious_store` are thin windows held
/// here for the forced-recharge check; the authoritative copies live in
/// `entelgia-memory`'s STM/LTM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub id_strength: f32,
    pub ego_strength: f32,
    pub superego_strength: f32,
    pub self_awareness: f32,
    pub energy_level: f32,
    pub pressure: f32,
    pub conscious_window: Vec<String>,
    pub subconscious_count: usize,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            id_strength: 5.0,
            ego_strength: 5.0,
            superego_strength: 5.0,
            self_awareness: 0.55,
            energy_level: 100.0,
            pressure: 0.0,
            conscious_window: Vec::new(),
            subconscious_count: 0,
        }
    }
}

impl AgentState {
    /// Conflict index `C = |id - ego| + |superego - ego|`, range `[0, 20]`.
    pub fn conflict_index(&self) -> f32 {
        (self.id_strength - self.ego_strength).abs() + (self.superego_strength - self.ego_strength).abs()
    }

    /// `clamp(0.45*id + 0.45*superego - 0.25*ego, 0, 10)`.
    pub fn dissent_level(&self) -> f32 {
        (0.45 * self.id_strength + 0.45 * self.superego_strength - 0.25 * self.ego_strength).clamp(0.0, 10.0)
    }

    /// Debate style derived from which drive dominates.
    pub fn style(&self) -> &'static str {
        if self.id_strength >= self.ego_strength && self.id_strength >= self.superego_strength {
            "provocative, desire-driven"
        } else if self.superego_strength >= self.ego_strength && self.superego_strength >= self.id_strength {
            "principled, rule-focused"
        } else {
            "integrative, Socratic"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    Baseline,
    Aggressive,
    Guilt,
    Reflective,
}

const ANGER_FRUSTRATION: &[&str] = &["anger", "frustration"];
const FEAR_ANXIETY: &[&str] = &["fear", "anxiety"];

/// Apply the per-turn drive update (§4.3 table) plus emotion adjuncts and ego
/// erosion. `conflict_before` must be computed from the state *before* this
/// update (ego erosion reads the pre-turn conflict index).
pub fn update_drives(state: &mut AgentState, kind: ResponseKind, emotion: Option<&str>, intensity: f32) {
    let conflict_before = state.conflict_index();

    match kind {
        ResponseKind::Baseline => {
            state.ego_strength += 0.05;
            state.self_awareness += 0.01;
        }
        ResponseKind::Aggressive => {
            state.id_strength += 0.18 + 0.10 * intensity;
            state.ego_strength -= 0.06;
            state.superego_strength -= 0.08;
        }
        ResponseKind::Guilt => {
            state.id_strength -= 0.08;
            state.superego_strength += 0.20 + 0.10 * intensity;
            state.self_awareness += 0.03;
        }
        ResponseKind::Reflective => {
            state.id_strength -= 0.06;
            state.ego_strength += 0.06;
            state.superego_strength += 0.08 + 0.05 * intensity;
            state.self_awareness += 0.02;
        }
    }

    if let Some(label) = emotion {
        let lower = label.to_lowercase();
        if ANGER_FRUSTRATION.contains(&lower.as_str()) {
            state.id_strength += 0.10;
        }
        if FEAR_ANXIETY.contains(&lower.as_str()) {
            state.superego_strength += 0.08;
        }
    }

    clamp_drives(state);

    if conflict_before > 4.0 {
        state.ego_strength = (state.ego_strength - 0.03 * (conflict_before - 4.0)).max(0.0);
    }

    clamp_drives(state);
}

fn clamp_drives(state: &mut AgentState) {
    state.id_strength = state.id_strength.clamp(0.0, 10.0);
    state.ego_strength = state.ego_strength.clamp(0.0, 10.0);
    state.superego_strength = state.superego_strength.clamp(0.0, 10.0);
    state.self_awareness = state.self_awareness.clamp(0.0, 1.0);
}

/// Behavioral rule injected into the prompt for this persona at this state,
/// if any (§4.3's two rules are the only ones defined).
pub fn behavioral_rule(persona: PersonaId, state: &AgentState) -> Option<&'static str> {
    match persona {
        PersonaId::Socrates if state.conflict_index() >= 5.0 => {
            Some("end your response with one sharp question forcing a binary (A or B) choice")
        }
        PersonaId::Athena if state.dissent_level() >= 3.0 => {
            Some("include at least one sentence starting with 'However,' / 'Yet,' / 'This assumes…'")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_index_matches_formula() {
        let state = AgentState {
            id_strength: 8.0,
            ego_strength: 3.0,
            superego_strength: 6.0,
            ..Default::default()
        };
        assert_eq!(state.conflict_index(), 5.0 + 3.0);
    }

    #[test]
    fn style_prefers_dominant_drive() {
        let id_dominant = AgentState { id_strength: 9.0, ego_strength: 2.0, superego_strength: 2.0, ..Default::default() };
        assert_eq!(id_dominant.style(), "provocative, desire-driven");

        let superego_dominant = AgentState { id_strength: 1.0, ego_strength: 2.0, superego_strength: 9.0, ..Default::default() };
        assert_eq!(superego_dominant.style(), "principled, rule-focused");

        let balanced = AgentState { id_strength: 5.0, ego_strength: 8.0, superego_strength: 5.0, ..Default::default() };
        assert_eq!(balanced.style(), "integrative, Socratic");
    }

    #[test]
    fn drives_stay_within_bounds_under_repeated_updates() {
        let mut state = AgentState::default();
        for _ in 0..200 {
            update_drives(&mut state, ResponseKind::Aggressive, Some("anger"), 1.0);
            assert!((0.0..=10.0).contains(&state.id_strength));
            assert!((0.0..=10.0).contains(&state.ego_strength));
            assert!((0.0..=10.0).contains(&state.superego_strength));
            assert!((0.0..=1.0).contains(&state.self_awareness));
        }
    }

    #[test]
    fn ego_erosion_strictly_lowers_ego_when_conflict_above_threshold() {
        let mut with_erosion = AgentState {
            id_strength: 10.0,
            ego_strength: 5.0,
            superego_strength: 0.0,
            ..Default::default()
        };
        let ego_before = with_erosion.ego_strength;
        update_drives(&mut with_erosion, ResponseKind::Baseline, None, 0.0);
        // Baseline alone would add +0.05; erosion must still pull it below baseline-only.
        let baseline_only = ego_before + 0.05;
        assert!(with_erosion.ego_strength < baseline_only);
    }

    #[test]
    fn behavioral_rule_fires_for_socrates_at_high_conflict() {
        let state = AgentState { id_strength: 10.0, ego_strength: 0.0, superego_strength: 0.0, ..Default::default() };
        assert!(behavioral_rule(PersonaId::Socrates, &state).is_some());
    }

    #[test]
    fn behavioral_rule_fires_for_athena_at_high_dissent() {
        let state = AgentState { id_strength: 10.0, ego_strength: 0.0, superego_strength: 10.0, ..Default::default() };
        assert!(state.dissent_level() >= 3.0);
        assert!(behavioral_rule(PersonaId::Athena, &state).is_some());
    }
}
