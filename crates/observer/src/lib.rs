//! Need-based intervention: five ordered detectors over the recent dialogue,
//! and templated generation for whichever fires first (§4.4).

pub mod detect;
pub mod intervene;

pub use detect::{Detector, ObservedTurn, detect};
pub use intervene::{FALLBACK_INTERVENTION, generate_intervention, intervention_prompt};
