//! Intervention generation: a per-detector instruction template combined
//! with the last 6 truncated turns, sent to the LLM at temperature 0.4.
//! Failure yields a fixed fallback utterance and still counts as an
//! intervention.

use entelgia_llm::LlmAdapter;

use crate::detect::{Detector, ObservedTurn};

const INTERVENTION_TEMPERATURE: f32 = 0.4;
const CONTEXT_TURN_COUNT: usize = 6;
const CONTEXT_TRUNCATE_CHARS: usize = 200;

pub const FALLBACK_INTERVENTION: &str = "I notice we might benefit from a fresh perspective here.";

fn instruction_for(detector: Detector) -> &'static str {
    match detector {
        Detector::CircularReasoning => {
            "You are Fixy, the meta-cognitive observer. The dialogue has circled back to the same \
             points multiple times. Generate a brief intervention (2-4 sentences) that: \
             1. Names the circular pattern you observe. 2. Suggests a specific reframe or new angle. \
             3. Helps break the loop."
        }
        Detector::HighConflictNoResolution => {
            "You are Fixy, the meta-cognitive observer. The dialogue has high conflict without moving \
             toward synthesis. Generate a brief intervention (2-4 sentences) that: 1. Acknowledges the \
             tension. 2. Points out the complementary aspects being missed. 3. Suggests a bridging \
             perspective."
        }
        Detector::ShallowDiscussion => {
            "You are Fixy, the meta-cognitive observer. The dialogue has stayed at a surface level for \
             a while. Generate a brief intervention (2-4 sentences) that: 1. Notes the pattern of \
             surface-level engagement. 2. Suggests going deeper. 3. Offers a specific deeper question \
             or angle."
        }
        Detector::MissedSynthesis => {
            "You are Fixy, the meta-cognitive observer. There's an obvious synthesis opportunity being \
             missed. Generate a brief intervention (2-4 sentences) that: 1. Points out the \
             complementary ideas. 2. Suggests how they might connect. 3. Encourages integration."
        }
        Detector::ScheduledMetaReflection => {
            "You are Fixy, the meta-cognitive observer. It's time for meta-reflection on the dialogue. \
             Generate a brief intervention (2-4 sentences) that: 1. Reflects on what's been \
             accomplished. 2. Notes what patterns have emerged. 3. Suggests where to go next."
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}

fn intervention_context(recent_turns: &[ObservedTurn]) -> String {
    let start = recent_turns.len().saturating_sub(CONTEXT_TURN_COUNT);
    recent_turns[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role, truncate(&turn.text, CONTEXT_TRUNCATE_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full intervention prompt for `detector` against `recent_turns`.
pub fn intervention_prompt(detector: Detector, recent_turns: &[ObservedTurn]) -> String {
    format!(
        "{}\n\nRECENT DIALOGUE:\n{}\n\nGenerate your intervention (2-4 sentences, direct and concrete):",
        instruction_for(detector),
        intervention_context(recent_turns),
    )
}

/// Generate the intervention text for `detector`. On any generation failure
/// (including the adapter's own retries being exhausted), returns
/// [`FALLBACK_INTERVENTION`] — this still counts as an intervention having
/// occurred, per the error-handling taxonomy.
pub async fn generate_intervention(
    adapter: &LlmAdapter,
    model: &str,
    detector: Detector,
    recent_turns: &[ObservedTurn],
) -> String {
    let prompt = intervention_prompt(detector, recent_turns);
    let (text, is_sentinel) = adapter
        .generate_with_resilience(model, &prompt, INTERVENTION_TEMPERATURE)
        .await;

    if is_sentinel || text.trim().is_empty() {
        FALLBACK_INTERVENTION.to_string()
    } else {
        text.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, text: &str) -> ObservedTurn {
        ObservedTurn { role: role.to_string(), text: text.to_string() }
    }

    #[test]
    fn intervention_prompt_includes_instruction_and_context() {
        let turns = vec![turn("Socrates", "what is justice"), turn("Athena", "justice is fairness")];
        let prompt = intervention_prompt(Detector::CircularReasoning, &turns);
        assert!(prompt.contains("circled back"));
        assert!(prompt.contains("Socrates: what is justice"));
    }

    #[test]
    fn intervention_context_keeps_only_last_six_turns() {
        let turns: Vec<ObservedTurn> = (0..10).map(|i| turn("Socrates", &format!("turn {i}"))).collect();
        let context = intervention_context(&turns);
        assert!(!context.contains("turn 0"));
        assert!(context.contains("turn 9"));
    }

    #[test]
    fn truncate_appends_ellipsis_past_char_cap() {
        let long = "x".repeat(300);
        let truncated = truncate(&long, 200);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }

    struct AlwaysFailsBackend;

    #[async_trait::async_trait]
    impl entelgia_llm::GenerationBackend for AlwaysFailsBackend {
        async fn generate(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String, entelgia_llm::LlmError> {
            Err(entelgia_llm::LlmError::Connection("refused".to_string()))
        }
        async fn classify_emotion(&self, _text: &str) -> Result<(String, f32), entelgia_llm::LlmError> {
            Err(entelgia_llm::LlmError::Malformed("n/a".to_string()))
        }
    }

    #[tokio::test]
    async fn falls_back_to_fixed_utterance_on_generation_failure() {
        let adapter = LlmAdapter::new(std::sync::Arc::new(AlwaysFailsBackend))
            .with_retries(0)
            .with_deadline(std::time::Duration::from_millis(20));
        let turns = vec![turn("Socrates", "what is justice")];
        let text = generate_intervention(&adapter, "phi", Detector::CircularReasoning, &turns).await;
        assert_eq!(text, FALLBACK_INTERVENTION);
    }
}
