//! Orchestration layer: wires config, memory, the LLM backend, and the
//! dialogue driver together into one runnable session, and owns the final
//! session-dump persistence (§5, §6).

mod session;

pub use entelgia_dialogue::Utterance;
pub use session::{MetricsSnapshot, SessionDump, persist_session_dump, run_session, run_session_with};
