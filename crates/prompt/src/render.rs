//! The fixed, section-by-section prompt template (§4.3). Rendering is
//! pinned — tests compare literal output — because it affects downstream LLM
//! behavior.

use entelgia_agent::{AgentState, Persona, PersonaId, persona};

const MAX_RECENT_TURNS: usize = 8;
const MAX_TURN_CHARS: usize = 500;
const MAX_STM_ENTRIES: usize = 6;
const MAX_STM_CHARS: usize = 400;
const MAX_LTM_ENTRIES: usize = 5;
const MAX_LTM_CHARS: usize = 600;
const LTM_STAR_THRESHOLD: f32 = 0.7;
const WORD_LIMIT_INSTRUCTION: usize = 150;

/// One already-rendered dialogue turn, oldest-to-caller-supplied order not
/// assumed — callers pass the turns they want shown, already in the order
/// they should appear.
#[derive(Debug, Clone)]
pub struct RecentTurn {
    pub role: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct LtmSnippet {
    pub content: String,
    pub importance: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub speaker: PersonaId,
    pub state: &'a AgentState,
    pub behavioral_rule: Option<&'static str>,
    pub seed: &'a str,
    pub recent_turns: &'a [RecentTurn],
    pub stm_entries: &'a [String],
    pub ltm_entries: &'a [LtmSnippet],
}

/// Render the full prompt: persona block, drive & style block, behavioral
/// rule, seed, last 8 dialogue turns, last 6 STM entries, top-5 LTM entries,
/// explicit word-limit instruction — each section separated by a blank line,
/// in that fixed order.
pub fn build_prompt(inputs: &PromptInputs<'_>) -> String {
    let persona_cfg = persona(inputs.speaker);

    let mut sections = Vec::new();
    sections.push(persona_block(persona_cfg));
    sections.push(drive_and_style_block(inputs.speaker, inputs.state));
    if let Some(rule) = inputs.behavioral_rule {
        sections.push(format!("Behavioral rule: {rule}"));
    }
    sections.push(format!("Seed: {}", inputs.seed));
    sections.push(recent_turns_block(inputs.recent_turns));
    sections.push(stm_block(inputs.stm_entries));
    sections.push(ltm_block(inputs.ltm_entries));
    sections.push(format!(
        "Respond in no more than {WORD_LIMIT_INSTRUCTION} words, in character as {}.",
        persona_cfg.id.name()
    ));

    sections.join("\n\n")
}

fn persona_block(persona: &Persona) -> String {
    format!(
        "You are {}, pronoun {}.\nCore traits: {}.\nSpeech patterns: {}.\nThinking style: {}.",
        persona.id.name(),
        persona.pronoun,
        persona.core_traits.join(", "),
        persona.speech_patterns.join(", "),
        persona.thinking_style,
    )
}

fn drive_and_style_block(speaker: PersonaId, state: &AgentState) -> String {
    format!(
        "Drives — id: {:.2}, ego: {:.2}, superego: {:.2}, self-awareness: {:.2}.\n\
         Conflict index: {:.2}. Dissent level: {:.2}. Debate style: {}.\n\
         Energy: {:.1}. Pressure: {:.2}.\nSpeaker: {speaker}.",
        state.id_strength,
        state.ego_strength,
        state.superego_strength,
        state.self_awareness,
        state.conflict_index(),
        state.dissent_level(),
        state.style(),
        state.energy_level,
        state.pressure,
    )
}

fn recent_turns_block(turns: &[RecentTurn]) -> String {
    let start = turns.len().saturating_sub(MAX_RECENT_TURNS);
    let lines: Vec<String> = turns[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role, truncate_at_sentence_boundary(&turn.text, MAX_TURN_CHARS)))
        .collect();
    format!("Recent dialogue:\n{}", lines.join("\n"))
}

fn stm_block(entries: &[String]) -> String {
    let start = entries.len().saturating_sub(MAX_STM_ENTRIES);
    let lines: Vec<String> = entries[start..]
        .iter()
        .map(|entry| format!("- {}", truncate_chars(entry, MAX_STM_CHARS)))
        .collect();
    format!("Recent private memory:\n{}", lines.join("\n"))
}

fn ltm_block(entries: &[LtmSnippet]) -> String {
    let top = &entries[..entries.len().min(MAX_LTM_ENTRIES)];
    let lines: Vec<String> = top
        .iter()
        .map(|snippet| {
            let star = if snippet.importance.unwrap_or(0.0) > LTM_STAR_THRESHOLD { "*" } else { "" };
            format!("- {}{}", star, truncate_chars(&snippet.content, MAX_LTM_CHARS))
        })
        .collect();
    format!("Long-term memory:\n{}", lines.join("\n"))
}

/// Truncate to at most `max_chars` characters, preferring the last sentence
/// boundary within that window.
fn truncate_at_sentence_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let capped: String = text.chars().take(max_chars).collect();
    match capped.rfind(['.', '!', '?']) {
        Some(idx) => capped[..=idx].to_string(),
        None => capped,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
