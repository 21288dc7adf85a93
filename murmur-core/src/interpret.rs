//! Interpretation of backend completions
//!
//! Turns free-form completion text into an optional persona rewrite and an
//! ordered list of [`ActionLine`]s. Interpretation is pure; applying the result
//! (persona mutation, memory append, dispatch) is the runtime's job.
//!
//! ```text
//! Hello there.                    -> Speech("say Hello there.")   (low autonomy)
//! Emote polishes a glass          -> Emote("Emote polishes a glass")
//! :'s eyes narrow                 -> Emote(":'s eyes narrow")
//! get lantern                     -> RawCommand("get lantern")    (high autonomy)
//! WAIT                            -> Wait                         (whole response only)
//! ```
//!
//! Lines that already carry a directive are dispatched exactly as written. Only
//! bare lines from a low-autonomy agent are wrapped in a `say` directive.

use regex::Regex;
use std::sync::LazyLock;

use crate::persona::{AutonomyTier, PersonaState};
use crate::prompt::PromptConfig;

static SPEECH_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^say\s+\S").expect("valid speech regex"));

static EMOTE_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^emote\s+\S").expect("valid emote regex"));

static EMOTE_SHORTHAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:\s*\S").expect("valid shorthand regex"));

/// One interpreted line of a completion.
///
/// Every variant except `Wait` carries the exact command handed to the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionLine {
    /// Spoken aloud
    Speech(String),
    /// Narrated gesture
    Emote(String),
    /// Any other in-world command (high autonomy only)
    RawCommand(String),
    /// Explicitly do nothing
    Wait,
}

impl ActionLine {
    /// Command string for the world's command interface. `Wait` has none.
    pub fn to_command(&self) -> Option<&str> {
        match self {
            ActionLine::Speech(command)
            | ActionLine::Emote(command)
            | ActionLine::RawCommand(command) => Some(command),
            ActionLine::Wait => None,
        }
    }
}

/// Result of interpreting one completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpretation {
    /// New base instructions, present only for mutation-enabled personas
    pub persona_update: Option<String>,
    /// Visible response to record under the assistant role
    pub visible: Option<String>,
    /// Lines to dispatch, in completion order
    pub actions: Vec<ActionLine>,
}

impl Interpretation {
    /// Whether nothing at all should happen
    pub fn is_noop(&self) -> bool {
        self.persona_update.is_none()
            && self.visible.is_none()
            && self.actions.iter().all(|a| *a == ActionLine::Wait)
    }
}

/// Parses completion text using the configured marker and sentinel
#[derive(Debug, Clone)]
pub struct ResponseInterpreter {
    mutation_marker: String,
    no_action_token: String,
}

impl ResponseInterpreter {
    pub fn new(mutation_marker: impl Into<String>, no_action_token: impl Into<String>) -> Self {
        Self {
            mutation_marker: mutation_marker.into(),
            no_action_token: no_action_token.into(),
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(config.mutation_marker.clone(), config.no_action_token.clone())
    }

    /// Interpret `raw` for an agent with `persona`.
    pub fn interpret(&self, raw: &str, persona: &PersonaState) -> Interpretation {
        let mut interpretation = Interpretation::default();

        let mut response = raw.trim();
        if response.is_empty() {
            return interpretation;
        }

        if let Some((visible, new_persona)) = response.split_once(self.mutation_marker.as_str()) {
            let new_persona = new_persona.trim();
            if persona.mutation_enabled && !new_persona.is_empty() {
                interpretation.persona_update = Some(new_persona.to_string());
            }
            response = visible.trim();
            if response.is_empty() {
                return interpretation;
            }
        }

        // The sentinel only counts as the whole response.
        if response.eq_ignore_ascii_case(&self.no_action_token) {
            interpretation.actions.push(ActionLine::Wait);
            return interpretation;
        }

        interpretation.visible = Some(response.to_string());
        interpretation.actions = response
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Self::classify(line, persona.autonomy_tier))
            .collect();

        interpretation
    }

    /// Classify a single non-empty line of a multi-line response.
    pub fn classify(line: &str, tier: AutonomyTier) -> ActionLine {
        let line = line.trim();

        if SPEECH_DIRECTIVE.is_match(line) {
            return ActionLine::Speech(line.to_string());
        }
        if EMOTE_DIRECTIVE.is_match(line) || EMOTE_SHORTHAND.is_match(line) {
            return ActionLine::Emote(line.to_string());
        }

        match tier {
            AutonomyTier::High => ActionLine::RawCommand(line.to_string()),
            AutonomyTier::Low => ActionLine::Speech(format!("say {}", line)),
        }
    }
}

impl Default for ResponseInterpreter {
    fn default() -> Self {
        Self::from_config(&PromptConfig::default())
    }
}
