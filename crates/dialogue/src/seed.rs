//! Seed-strategy selection: which cognitive move the driver asks the
//! speaker to make this turn, and the formatted seed string (§4.1).

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStrategy {
    AgreeAndExpand,
    QuestionAssumption,
    Synthesize,
    ConstructiveDisagree,
    ExploreImplication,
    IntroduceAnalogy,
    MetaReflect,
}

impl SeedStrategy {
    fn template(self) -> &'static str {
        match self {
            SeedStrategy::AgreeAndExpand => "Build on what was just said about {topic} — agree, then push it further.",
            SeedStrategy::QuestionAssumption => "Question the unstated assumption behind the last claim about {topic}.",
            SeedStrategy::Synthesize => "Find the synthesis that reconciles the competing views on {topic}.",
            SeedStrategy::ConstructiveDisagree => "Disagree with the last point about {topic}, constructively, and say why.",
            SeedStrategy::ExploreImplication => "Explore a concrete implication of the last claim about {topic}.",
            SeedStrategy::IntroduceAnalogy => "Introduce an analogy that illuminates {topic} from a new angle.",
            SeedStrategy::MetaReflect => "Step back and reflect on the shape of this dialogue about {topic} so far.",
        }
    }
}

/// Format the strategy's template with the active `topic` label.
pub fn format_seed(strategy: SeedStrategy, topic: &str) -> String {
    strategy.template().replace("{topic}", topic)
}

const WEIGHTED_STRATEGIES: &[(SeedStrategy, f64)] = &[
    (SeedStrategy::AgreeAndExpand, 0.15),
    (SeedStrategy::QuestionAssumption, 0.20),
    (SeedStrategy::Synthesize, 0.10),
    (SeedStrategy::ConstructiveDisagree, 0.25),
    (SeedStrategy::ExploreImplication, 0.15),
    (SeedStrategy::IntroduceAnalogy, 0.10),
    (SeedStrategy::MetaReflect, 0.05),
];

fn weighted_choice(rng: &mut impl Rng) -> SeedStrategy {
    let total: f64 = WEIGHTED_STRATEGIES.iter().map(|(_, w)| w).sum();
    let mut roll = rng.r#gen::<f64>() * total;
    for (strategy, weight) in WEIGHTED_STRATEGIES {
        if roll < *weight {
            return *strategy;
        }
        roll -= weight;
    }
    WEIGHTED_STRATEGIES.last().unwrap().0
}

const ANGER_FRUSTRATION: &[&str] = &["anger", "frustration"];

/// Choose the seed strategy for this turn and format it against `topic`.
///
/// - `turn_index % 7 == 0 && turn_index > 0` => `MetaReflect`.
/// - else `conflict_index(speaker) > 8` => `Synthesize`.
/// - else last turn's emotion in {anger, frustration} => `AgreeAndExpand`.
/// - else a weighted random draw.
pub fn seed_for_turn(
    turn_index: u64,
    speaker_conflict_index: f32,
    last_emotion: Option<&str>,
    topic: &str,
    rng: &mut impl Rng,
) -> (SeedStrategy, String) {
    let strategy = if turn_index % 7 == 0 && turn_index > 0 {
        SeedStrategy::MetaReflect
    } else if speaker_conflict_index > 8.0 {
        SeedStrategy::Synthesize
    } else if last_emotion
        .map(|e| ANGER_FRUSTRATION.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
    {
        SeedStrategy::AgreeAndExpand
    } else {
        weighted_choice(rng)
    };

    (strategy, format_seed(strategy, topic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn meta_reflect_on_multiples_of_seven_past_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let (strategy, _) = seed_for_turn(7, 0.0, None, "justice", &mut rng);
        assert_eq!(strategy, SeedStrategy::MetaReflect);
        let (strategy, _) = seed_for_turn(0, 0.0, None, "justice", &mut rng);
        assert_ne!(strategy, SeedStrategy::MetaReflect);
    }

    #[test]
    fn synthesize_on_high_conflict() {
        let mut rng = StdRng::seed_from_u64(1);
        let (strategy, _) = seed_for_turn(3, 9.0, None, "justice", &mut rng);
        assert_eq!(strategy, SeedStrategy::Synthesize);
    }

    #[test]
    fn agree_and_expand_after_anger_or_frustration() {
        let mut rng = StdRng::seed_from_u64(1);
        let (strategy, _) = seed_for_turn(3, 0.0, Some("anger"), "justice", &mut rng);
        assert_eq!(strategy, SeedStrategy::AgreeAndExpand);
    }

    #[test]
    fn template_is_formatted_with_topic() {
        let seed = format_seed(SeedStrategy::QuestionAssumption, "free will");
        assert!(seed.contains("free will"));
        assert!(!seed.contains("{topic}"));
    }

    #[test]
    fn weighted_choice_only_returns_known_strategies() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let (strategy, _) = seed_for_turn(3, 0.0, None, "topic", &mut rng);
            assert!(WEIGHTED_STRATEGIES.iter().any(|(s, _)| *s == strategy));
        }
    }
}
