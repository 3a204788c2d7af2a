//! `DialogueSession`: the per-turn driver (§4.1) tying agent state, memory,
//! the observer, prompt rendering, and the LLM adapter together.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use entelgia_agent::{
    AgentState, PersonaId, ResponseKind, behavioral_rule, drain_energy, enforce_word_cap, force_recharge,
    needs_forced_recharge, persona, temperature, update_drives,
};
use entelgia_config::AppConfig;
use entelgia_llm::LlmAdapter;
use entelgia_memory::{MemoryCore, MemoryLayer, MemorySource, StmEntry};
use entelgia_observer::{self as observer, ObservedTurn};
use entelgia_prompt::{LtmSnippet, PromptInputs, RecentTurn, build_prompt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::seed;
use crate::speaker;

/// One entry in the dialogue log. `role` is one of `Socrates`, `Athena`,
/// `Fixy`, or `seed` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub role: String,
    pub text: String,
    pub emotion_label: Option<String>,
    pub emotion_intensity: f32,
    pub importance: f32,
    pub topic_label: String,
    pub turn_index: u64,
}

/// A fixed ordered list of topic labels with a cursor advanced every full
/// round (every even turn, per the driver contract).
#[derive(Debug, Clone)]
pub struct TopicRing {
    topics: Vec<String>,
    cursor: usize,
}

impl TopicRing {
    pub fn new(topics: Vec<String>) -> Self {
        assert!(!topics.is_empty(), "TopicRing needs at least one topic");
        Self { topics, cursor: 0 }
    }

    pub fn current(&self) -> &str {
        &self.topics[self.cursor]
    }

    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.topics.len();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxTurns,
    Timeout,
    StopWord,
}

const ENERGY_MIN: f32 = entelgia_agent::energy::ENERGY_MIN_DEFAULT;
const ENERGY_MAX: f32 = entelgia_agent::energy::ENERGY_MAX_DEFAULT;
const SAFETY_THRESHOLD: f32 = entelgia_agent::energy::SAFETY_THRESHOLD_DEFAULT;
const RECHARGE_WINDOW: usize = entelgia_agent::energy::RECHARGE_CONSCIOUS_WINDOW;
const DREAM_REFLECTION_TEMPERATURE: f32 = 0.6;
const RECENT_DIALOG_WINDOW: usize = 3;
const OBSERVER_WINDOW: usize = 10;

fn agent_key(persona: PersonaId) -> String {
    persona.name().to_lowercase()
}

/// Heuristic post-hoc salience score. Not specified by the distilled spec
/// beyond its `[0,1]` range and its use in dream-cycle promotion; this
/// synthesis is recorded as an Open Question resolution in `DESIGN.md`.
fn estimate_importance(text: &str, emotion_intensity: f32) -> f32 {
    let word_count = text.split_whitespace().count() as f32;
    let length_term = (word_count / 40.0).min(1.0);
    (0.25 + 0.45 * emotion_intensity + 0.30 * length_term).clamp(0.0, 1.0)
}

/// Maps a classified emotion into the drive-update response kind. Not
/// specified by the distilled spec; recorded as an Open Question resolution.
fn response_kind_for(emotion_label: &str, intensity: f32) -> ResponseKind {
    match emotion_label.to_lowercase().as_str() {
        "anger" | "frustration" | "contempt" if intensity >= 0.5 => ResponseKind::Aggressive,
        "shame" | "guilt" | "regret" => ResponseKind::Guilt,
        "curiosity" | "calm" | "thoughtful" | "contemplative" => ResponseKind::Reflective,
        _ => ResponseKind::Baseline,
    }
}

fn model_for(config: &AppConfig, persona: PersonaId) -> &str {
    match persona {
        PersonaId::Socrates => &config.models.socrates,
        PersonaId::Athena => &config.models.athena,
        PersonaId::Fixy => &config.models.fixy,
    }
}

pub struct DialogueSession {
    pub id: Uuid,
    config: AppConfig,
    memory: MemoryCore,
    llm: LlmAdapter,
    rng: StdRng,
    topic_ring: TopicRing,
    agent_states: HashMap<PersonaId, AgentState>,
    dialogue_log: Vec<Utterance>,
    turns_since_observer: Option<u64>,
    unresolved_open_questions: u32,
    start_time: Instant,
    stop_regex: Regex,
}

impl DialogueSession {
    pub fn new(config: AppConfig, memory: MemoryCore, llm: LlmAdapter, topics: Vec<String>, rng_seed: u64) -> Self {
        let seed_text = config.dialogue.seed_topic.clone();
        let mut agent_states = HashMap::new();
        for p in PersonaId::protagonists() {
            agent_states.insert(p, AgentState::default());
        }

        let seed_topic_label = topics.first().cloned().unwrap_or_else(|| seed_text.clone());
        let dialogue_log = vec![Utterance {
            role: "seed".to_string(),
            text: seed_text,
            emotion_label: None,
            emotion_intensity: 0.0,
            importance: 0.0,
            topic_label: seed_topic_label,
            turn_index: 0,
        }];

        Self {
            id: Uuid::new_v4(),
            config,
            memory,
            llm,
            rng: StdRng::seed_from_u64(rng_seed),
            topic_ring: TopicRing::new(topics),
            agent_states,
            dialogue_log,
            turns_since_observer: None,
            unresolved_open_questions: 0,
            start_time: Instant::now(),
            stop_regex: Regex::new(r"(?i)\b(stop|quit|bye)\b").expect("static regex is valid"),
        }
    }

    pub fn dialogue_log(&self) -> &[Utterance] {
        &self.dialogue_log
    }

    fn history_roles(&self) -> Vec<PersonaId> {
        self.dialogue_log[1..]
            .iter()
            .filter_map(|u| parse_role(&u.role))
            .collect()
    }

    fn last_two_roles(&self) -> Vec<PersonaId> {
        self.dialogue_log[1..]
            .iter()
            .rev()
            .filter_map(|u| parse_role(&u.role))
            .take(2)
            .collect()
    }

    fn recent_dialog_text(&self, window: usize) -> String {
        self.dialogue_log
            .iter()
            .rev()
            .take(window)
            .map(|u| u.text.clone())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run turns until a stop condition is reached, returning the reason.
    pub async fn run(&mut self) -> Result<StopReason> {
        loop {
            if let Some(reason) = self.run_turn().await? {
                return Ok(reason);
            }
        }
    }

    /// Drive exactly one "round" of the per-turn contract (one main turn,
    /// plus an optional detector-triggered Observer interjection). Returns
    /// `Some(reason)` once a stop condition fires.
    #[instrument(skip(self))]
    pub async fn run_turn(&mut self) -> Result<Option<StopReason>> {
        if self.turn_count() >= self.config.dialogue.max_turns {
            return Ok(Some(StopReason::MaxTurns));
        }
        if self.start_time.elapsed() >= Duration::from_secs(self.config.dialogue.timeout_minutes * 60) {
            return Ok(Some(StopReason::Timeout));
        }

        let next_turn_index = self.dialogue_log.len() as u64;
        let topic = self.topic_ring.current().to_string();

        let roster = PersonaId::protagonists();
        let history = self.history_roles();
        let last_two = self.last_two_roles();
        let last_five_texts: Vec<String> =
            self.dialogue_log[1..].iter().rev().take(5).map(|u| u.text.clone()).collect();
        let (fixy_allowed, fixy_probability) =
            speaker::allow_fixy(next_turn_index, self.turns_since_observer, &last_five_texts);

        let agent_states = &self.agent_states;
        let conflict_index_fn = move |p: PersonaId| agent_states.get(&p).map(AgentState::conflict_index).unwrap_or(0.0);

        let speaker = speaker::select_next_speaker(
            &roster,
            &last_two,
            &history,
            fixy_allowed,
            fixy_probability,
            &conflict_index_fn,
            &mut self.rng,
        );

        if speaker == PersonaId::Fixy {
            self.run_observer_turn(next_turn_index, &topic).await?;
        } else {
            self.run_protagonist_turn(speaker, next_turn_index, &topic).await?;

            // Step 6: the detector-driven interjection, distinct from the
            // probabilistic pick above — never back-to-back with it.
            let observer_gap_ok = self.turns_since_observer.map(|g| g >= 3).unwrap_or(true);
            if observer_gap_ok {
                let observed = self.observed_window();
                if let Some(detector) = observer::detect(&observed, next_turn_index + 1) {
                    self.append_observer_intervention(next_turn_index + 1, &topic, detector).await?;
                }
            }
        }

        if let Some(gap) = self.turns_since_observer {
            self.turns_since_observer = Some(gap + 1);
        }

        if next_turn_index % 2 == 0 {
            self.topic_ring.advance();
        }

        if self.dialogue_log.last().map(|u| self.stop_regex.is_match(&u.text)).unwrap_or(false) {
            return Ok(Some(StopReason::StopWord));
        }

        // Dream cycle fires on two independent triggers: the per-protagonist
        // cadence, and a force-recharge whenever any agent has drained to
        // the safety threshold — checked every turn, not just on cadence.
        let cadence_hit = self.turn_count() % self.config.dialogue.dream_every_n_turns == 0;
        for protagonist in PersonaId::protagonists() {
            let needs_recharge = self
                .agent_states
                .get(&protagonist)
                .map(|s| needs_forced_recharge(s, SAFETY_THRESHOLD))
                .unwrap_or(false);
            if cadence_hit || needs_recharge {
                self.run_dream_cycle(protagonist).await?;
            }
        }

        Ok(None)
    }

    fn turn_count(&self) -> u64 {
        self.dialogue_log.len() as u64 - 1
    }

    fn observed_window(&self) -> Vec<ObservedTurn> {
        self.dialogue_log[1..]
            .iter()
            .rev()
            .take(OBSERVER_WINDOW)
            .rev()
            .map(|u| ObservedTurn { role: u.role.clone(), text: u.text.clone() })
            .collect()
    }

    async fn run_protagonist_turn(&mut self, speaker: PersonaId, turn_index: u64, topic: &str) -> Result<()> {
        let state = self.agent_states.get(&speaker).cloned().unwrap_or_default();
        let rule = behavioral_rule(speaker, &state);
        let last_emotion = self.dialogue_log.last().and_then(|u| u.emotion_label.clone());
        let (_, seed_text) = seed::seed_for_turn(turn_index, state.conflict_index(), last_emotion.as_deref(), topic, &mut self.rng);
        let sampling_temperature = temperature(&state);

        let recent_turns: Vec<RecentTurn> = self
            .dialogue_log
            .iter()
            .map(|u| RecentTurn { role: u.role.clone(), text: u.text.clone() })
            .collect();

        let agent = agent_key(speaker);
        let stm_entries: Vec<String> =
            self.memory.stm_load(&agent)?.into_iter().map(|entry| entry.content).collect();

        let recent_dialog_text = self.recent_dialog_text(RECENT_DIALOG_WINDOW);
        let ltm_entries: Vec<LtmSnippet> = self
            .memory
            .relevant_ltm(&agent, topic, &recent_dialog_text, 5)?
            .into_iter()
            .map(|(record, _)| LtmSnippet { content: record.content, importance: record.importance })
            .collect();

        let prompt = build_prompt(&PromptInputs {
            speaker,
            state: &state,
            behavioral_rule: rule,
            seed: &seed_text,
            recent_turns: &recent_turns,
            stm_entries: &stm_entries,
            ltm_entries: &ltm_entries,
        });

        let model = model_for(&self.config, speaker).to_string();
        let (raw_text, is_sentinel) = self.llm.generate_with_resilience(&model, &prompt, sampling_temperature).await;

        let (emotion_label, emotion_intensity) = if is_sentinel {
            ("neutral".to_string(), 0.2)
        } else {
            self.llm.classify_emotion_with_default(&raw_text).await
        };

        let word_cap = entelgia_agent::word_cap_for_pressure(state.pressure);
        let text = enforce_word_cap(&raw_text, word_cap);
        let importance = estimate_importance(&text, emotion_intensity);

        self.apply_post_turn_updates(speaker, &text, &emotion_label, emotion_intensity);

        self.append_utterance(Utterance {
            role: speaker.name().to_string(),
            text,
            emotion_label: Some(emotion_label),
            emotion_intensity,
            importance,
            topic_label: topic.to_string(),
            turn_index,
        })
        .await?;

        Ok(())
    }

    fn apply_post_turn_updates(
        &mut self,
        speaker: PersonaId,
        text: &str,
        emotion_label: &str,
        emotion_intensity: f32,
    ) {
        let previous_text = self.dialogue_log.last().map(|u| u.text.clone()).unwrap_or_default();
        let stagnation = entelgia_agent::stagnation(text, &previous_text);

        let state = self.agent_states.entry(speaker).or_default();
        let kind = response_kind_for(emotion_label, emotion_intensity);
        update_drives(state, kind, Some(emotion_label), emotion_intensity);
        drain_energy(state, &mut self.rng, ENERGY_MIN, ENERGY_MAX);

        self.unresolved_open_questions =
            entelgia_agent::update_unresolved_counter(self.unresolved_open_questions, &previous_text, text);

        let conflict = state.conflict_index();
        let energy = state.energy_level;
        let pressure = entelgia_agent::update_pressure(
            state.pressure,
            entelgia_agent::PressureInputs {
                conflict_index: conflict,
                unresolved_open_questions: self.unresolved_open_questions,
                energy,
                stagnation,
            },
        );
        let state = self.agent_states.entry(speaker).or_default();
        state.pressure = pressure;
    }

    async fn run_observer_turn(&mut self, turn_index: u64, topic: &str) -> Result<()> {
        let observed = self.observed_window();
        let detector = observer::detect(&observed, turn_index).unwrap_or(entelgia_observer::Detector::ScheduledMetaReflection);
        self.append_observer_intervention(turn_index, topic, detector).await
    }

    async fn append_observer_intervention(
        &mut self,
        turn_index: u64,
        topic: &str,
        detector: entelgia_observer::Detector,
    ) -> Result<()> {
        let observed = self.observed_window();
        let model = self.config.models.fixy.clone();
        let text = observer::generate_intervention(&self.llm, &model, detector, &observed).await;
        let (emotion_label, emotion_intensity) = self.llm.classify_emotion_with_default(&text).await;
        let importance = estimate_importance(&text, emotion_intensity);

        self.append_utterance(Utterance {
            role: PersonaId::Fixy.name().to_string(),
            text,
            emotion_label: Some(emotion_label),
            emotion_intensity,
            importance,
            topic_label: topic.to_string(),
            turn_index,
        })
        .await?;

        self.turns_since_observer = Some(0);
        Ok(())
    }

    async fn append_utterance(&mut self, utterance: Utterance) -> Result<()> {
        let agent = utterance.role.to_lowercase();
        self.memory
            .stm_append(
                &agent,
                StmEntry {
                    agent: agent.clone(),
                    content: utterance.text.clone(),
                    topic: Some(utterance.topic_label.clone()),
                    emotion: utterance.emotion_label.clone(),
                    emotion_intensity: Some(utterance.emotion_intensity),
                    importance: Some(utterance.importance),
                    timestamp: Utc::now(),
                },
            )
            .await?;

        self.memory.ltm_insert(
            &agent,
            MemoryLayer::Subconscious,
            utterance.text.clone(),
            Some(utterance.topic_label.clone()),
            utterance.emotion_label.clone(),
            Some(utterance.emotion_intensity),
            Some(utterance.importance),
            MemorySource::Stm,
            None,
            false,
            false,
        )?;

        info!(role = %utterance.role, turn_index = utterance.turn_index, "turn appended");
        self.dialogue_log.push(utterance);
        Ok(())
    }

    async fn run_dream_cycle(&mut self, protagonist: PersonaId) -> Result<()> {
        let agent = agent_key(protagonist);
        let entries = self.memory.stm_load(&agent)?;

        let reflection_window: Vec<StmEntry> =
            entries.iter().rev().take(entelgia_memory::dream::REFLECTION_STM_WINDOW).rev().cloned().collect();
        let prompt = entelgia_memory::dream::reflection_prompt(persona(protagonist).id.name(), &reflection_window);
        let model = model_for(&self.config, protagonist).to_string();
        let (raw_reflection, _) = self.llm.generate_with_resilience(&model, &prompt, DREAM_REFLECTION_TEMPERATURE).await;
        let reflection = entelgia_memory::dream::truncate_reflection(&raw_reflection);
        self.memory.insert_dream_reflection(&agent, reflection)?;

        let promotion_window: Vec<StmEntry> =
            entries.iter().rev().take(entelgia_memory::dream::PROMOTION_STM_WINDOW).rev().cloned().collect();
        self.memory.promote_stm_entries(
            &agent,
            &promotion_window,
            self.config.memory.promote_importance_threshold,
            self.config.memory.promote_emotion_threshold,
        )?;

        let needs_recharge = self
            .agent_states
            .get(&protagonist)
            .map(|s| needs_forced_recharge(s, SAFETY_THRESHOLD))
            .unwrap_or(false);
        if needs_recharge {
            if let Some(state) = self.agent_states.get_mut(&protagonist) {
                force_recharge(state, RECHARGE_WINDOW);
            }
        }

        Ok(())
    }
}

fn parse_role(role: &str) -> Option<PersonaId> {
    match role {
        "Socrates" => Some(PersonaId::Socrates),
        "Athena" => Some(PersonaId::Athena),
        "Fixy" => Some(PersonaId::Fixy),
        _ => None,
    }
}
