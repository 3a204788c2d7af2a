//! The turn-based dialogue driver: speaker selection, seed-strategy choice,
//! topic rotation, and the per-turn contract wiring agent state, memory, the
//! observer, prompt rendering, and the LLM adapter together (§4.1).

pub mod seed;
pub mod session;
pub mod speaker;

pub use seed::{SeedStrategy, format_seed, seed_for_turn};
pub use session::{DialogueSession, StopReason, TopicRing, Utterance};
pub use speaker::{allow_fixy, recent_participation, select_next_speaker};
