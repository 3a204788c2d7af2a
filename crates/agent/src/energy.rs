//! Sampling temperature, energy drain, and the forced-recharge (dream-cycle
//! trigger) check (§4.3).

use rand::Rng;

use crate::drives::AgentState;

pub const ENERGY_MIN_DEFAULT: f32 = 8.0;
pub const ENERGY_MAX_DEFAULT: f32 = 15.0;
pub const SAFETY_THRESHOLD_DEFAULT: f32 = 35.0;
pub const RECHARGE_CONSCIOUS_WINDOW: usize = 5;

/// `T = clamp(0.60 + 0.03*(id-ego) - 0.02*(superego-ego) + 0.015*C, 0.25, 0.95)`.
pub fn temperature(state: &AgentState) -> f32 {
    let c = state.conflict_index();
    let t = 0.60 + 0.03 * (state.id_strength - state.ego_strength)
        - 0.02 * (state.superego_strength - state.ego_strength)
        + 0.015 * c;
    t.clamp(0.25, 0.95)
}

/// Drain `uniform(e_min, e_max) + 0.4*C`, capped at `2*e_max`, subtracted
/// from current energy and floored at 0.
pub fn drain_energy(state: &mut AgentState, rng: &mut impl Rng, e_min: f32, e_max: f32) {
    let c = state.conflict_index();
    let base = rng.gen_range(e_min..=e_max);
    let drain = (base + 0.4 * c).min(2.0 * e_max);
    state.energy_level = (state.energy_level - drain).max(0.0);
}

/// `true` once energy has drained to or below `safety_threshold` — the
/// dream-cycle forced-recharge trigger.
pub fn needs_forced_recharge(state: &AgentState, safety_threshold: f32) -> bool {
    state.energy_level <= safety_threshold
}

/// Apply a forced recharge: keep only the last `keep` conscious entries,
/// move every subconscious entry into the conscious window (caller is
/// responsible for the actual LTM promotion — this only resets the local
/// bookkeeping fields), and reset energy to 100.
pub fn force_recharge(state: &mut AgentState, keep: usize) {
    let start = state.conscious_window.len().saturating_sub(keep);
    state.conscious_window.drain(0..start);
    state.subconscious_count = 0;
    state.energy_level = 100.0;
}
