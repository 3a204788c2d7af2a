//! Exact prompt rendering for the dialogue driver (§4.3).

pub mod render;

pub use render::{LtmSnippet, PromptInputs, RecentTurn, build_prompt};
