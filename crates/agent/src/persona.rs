//! Static per-persona configuration, modeled as a tagged variant with a data
//! table rather than per-variant trait impls — drive-influence tables are
//! data, not code, per the design note against dynamic persona dispatch.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonaId {
    Socrates,
    Athena,
    Fixy,
}

impl PersonaId {
    pub fn name(self) -> &'static str {
        match self {
            PersonaId::Socrates => "Socrates",
            PersonaId::Athena => "Athena",
            PersonaId::Fixy => "Fixy",
        }
    }

    pub fn is_observer(self) -> bool {
        matches!(self, PersonaId::Fixy)
    }

    pub fn protagonists() -> [PersonaId; 2] {
        [PersonaId::Socrates, PersonaId::Athena]
    }
}

impl std::fmt::Display for PersonaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static configuration for one persona: name, pronoun, traits, speech
/// patterns, thinking style, and the behavioral knobs the prompt builder and
/// observer read. A `const` data table, not logic — see [`persona`].
#[derive(Debug, Clone, Copy)]
pub struct Persona {
    pub id: PersonaId,
    pub pronoun: &'static str,
    pub core_traits: &'static [&'static str],
    pub speech_patterns: &'static [&'static str],
    pub thinking_style: &'static str,
    pub typical_openings: &'static [&'static str],
    /// Only meaningful for the Observer: phrases that justify an
    /// intervention being attributed to this persona.
    pub intervention_triggers: &'static [&'static str],
}

const SOCRATES: Persona = Persona {
    id: PersonaId::Socrates,
    pronoun: "he",
    core_traits: &["relentlessly questioning", "ironic", "provocative"],
    speech_patterns: &["rhetorical questions", "short declaratives", "deliberate irony"],
    thinking_style: "dialectical — tests every claim by asking what it assumes",
    typical_openings: &[
        "Let us examine that claim more closely.",
        "But what do you truly mean by that?",
        "I confess I do not yet understand.",
    ],
    intervention_triggers: &[],
};

const ATHENA: Persona = Persona {
    id: PersonaId::Athena,
    pronoun: "she",
    core_traits: &["measured", "synthesizing", "principled"],
    speech_patterns: &["qualifying clauses", "structured enumeration", "calm rebuttal"],
    thinking_style: "integrative — looks for the frame that reconciles both sides",
    typical_openings: &[
        "There is a balance to be struck here.",
        "Consider both sides of that claim.",
        "I would frame it differently.",
    ],
    intervention_triggers: &[],
};

const FIXY: Persona = Persona {
    id: PersonaId::Fixy,
    pronoun: "they",
    core_traits: &["observant", "terse", "corrective"],
    speech_patterns: &["short imperative sentences", "names the pattern directly"],
    thinking_style: "meta-cognitive — watches the shape of the dialogue, not its content",
    typical_openings: &[
        "Let's pause and notice what's happening here.",
        "I want to name something before we continue.",
    ],
    intervention_triggers: &["circular", "shallow", "no synthesis", "unresolved conflict"],
};

pub fn persona(id: PersonaId) -> &'static Persona {
    match id {
        PersonaId::Socrates => &SOCRATES,
        PersonaId::Athena => &ATHENA,
        PersonaId::Fixy => &FIXY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protagonists_excludes_observer() {
        let protagonists = PersonaId::protagonists();
        assert!(!protagonists.contains(&PersonaId::Fixy));
        assert!(protagonists.contains(&PersonaId::Socrates));
        assert!(protagonists.contains(&PersonaId::Athena));
    }

    #[test]
    fn only_fixy_is_observer() {
        assert!(PersonaId::Fixy.is_observer());
        assert!(!PersonaId::Socrates.is_observer());
        assert!(!PersonaId::Athena.is_observer());
    }

    #[test]
    fn persona_table_is_consistent_with_id() {
        for id in [PersonaId::Socrates, PersonaId::Athena, PersonaId::Fixy] {
            assert_eq!(persona(id).id, id);
        }
    }
}
