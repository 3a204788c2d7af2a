//! Dream-cycle consolidation: pure prompt building, promotion selection, and
//! defense classification. The actual LLM round trip is the caller's
//! responsibility (`entelgia-dialogue`) — this module mirrors the split the
//! reference sleep-cycle code uses, where the memory crate only ever
//! builds prompts and interprets their structure, never talks to the
//! network itself.

use crate::schema::StmEntry;

pub const DREAM_EVERY_N_TURNS_DEFAULT: u64 = 7;
pub const REFLECTION_STM_WINDOW: usize = 60;
pub const PROMOTION_STM_WINDOW: usize = 40;
pub const PROMOTE_IMPORTANCE_THRESHOLD_DEFAULT: f32 = 0.72;
pub const PROMOTE_EMOTION_THRESHOLD_DEFAULT: f32 = 0.65;
pub const REFLECTION_MAX_WORDS: usize = 180;

const REPRESSION_INTENSITY_THRESHOLD: f32 = 0.75;
const REPRESSED_EMOTIONS: &[&str] = &["anger", "fear", "shame", "guilt", "anxiety", "disgust"];
const SUPPRESSION_TRIGGER_WORDS: &[&str] = &[
    "forbidden",
    "wrong",
    "bad",
    "evil",
    "dangerous",
    "secret",
    "hidden",
    "private",
    "shameful",
];

/// Build the reflection prompt over the last [`REFLECTION_STM_WINDOW`] STM
/// entries. The caller passes the already-windowed slice.
pub fn reflection_prompt(agent_name: &str, recent_entries: &[StmEntry]) -> String {
    let transcript = recent_entries
        .iter()
        .map(|entry| format!("- {}", entry.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are {agent_name}, reflecting privately on your recent exchanges.\n\
         Recent memory:\n{transcript}\n\n\
         Write a short reflection (no more than {REFLECTION_MAX_WORDS} words) \
         on what these exchanges reveal, in your own voice."
    )
}

/// Hard-cap a reflection reply to [`REFLECTION_MAX_WORDS`] words.
pub fn truncate_reflection(reflection: &str) -> String {
    let words: Vec<&str> = reflection.split_whitespace().collect();
    if words.len() <= REFLECTION_MAX_WORDS {
        reflection.trim().to_string()
    } else {
        words[..REFLECTION_MAX_WORDS].join(" ")
    }
}

/// A single promotion decision over one of the last [`PROMOTION_STM_WINDOW`]
/// STM entries.
#[derive(Debug, Clone)]
pub struct PromotionCandidate<'a> {
    pub entry: &'a StmEntry,
    pub intrusive: bool,
    pub suppressed: bool,
}

/// Select entries eligible for promotion to conscious LTM: `importance >=
/// importance_threshold` or `emotion_intensity >= emotion_threshold`, and
/// classify each for repression/suppression before storage.
pub fn select_promotions<'a>(
    recent_entries: &'a [StmEntry],
    importance_threshold: f32,
    emotion_threshold: f32,
) -> Vec<PromotionCandidate<'a>> {
    recent_entries
        .iter()
        .filter(|entry| {
            let importance_ok = entry.importance.unwrap_or(0.0) >= importance_threshold;
            let emotion_ok = entry.emotion_intensity.unwrap_or(0.0) >= emotion_threshold;
            importance_ok || emotion_ok
        })
        .map(|entry| {
            let (intrusive, suppressed) = classify_defenses(
                &entry.content,
                entry.emotion.as_deref(),
                entry.emotion_intensity.unwrap_or(0.0),
            );
            PromotionCandidate {
                entry,
                intrusive,
                suppressed,
            }
        })
        .collect()
}

/// `intrusive` (repressed marker) fires for high-intensity negative
/// emotions; `suppressed` fires when the content contains a forbidden-topic
/// trigger word.
pub fn classify_defenses(content: &str, emotion: Option<&str>, intensity: f32) -> (bool, bool) {
    let intrusive = emotion
        .map(|label| REPRESSED_EMOTIONS.contains(&label.to_lowercase().as_str()))
        .unwrap_or(false)
        && intensity > REPRESSION_INTENSITY_THRESHOLD;

    let lower = content.to_lowercase();
    let suppressed = SUPPRESSION_TRIGGER_WORDS
        .iter()
        .any(|word| lower.contains(word));

    (intrusive, suppressed)
}
