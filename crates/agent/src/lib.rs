//! Per-agent drive state, conflict/dissent derivations, sampling temperature,
//! energy/pressure dynamics, and static persona configuration (§4.3).

pub mod drives;
pub mod energy;
pub mod length;
pub mod persona;
pub mod pressure;

pub use drives::{AgentState, ResponseKind, behavioral_rule, update_drives};
pub use energy::{drain_energy, force_recharge, needs_forced_recharge, temperature};
pub use length::enforce_word_cap;
pub use persona::{Persona, PersonaId, persona};
pub use pressure::{PressureInputs, stagnation, update_pressure, update_unresolved_counter, word_cap_for_pressure};
