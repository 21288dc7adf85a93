//! Prompt composition for reactive and ambient requests

use serde::{Deserialize, Serialize};

use crate::conversation::MemorySnapshot;
use crate::llm::{LLMRequest, Message};
use crate::persona::{AutonomyTier, PersonaState};
use crate::stimulus::Location;

const DEFAULT_CAPABILITY_CLAUSE: &str = "[System: You are currently 'Awakened'. You can evolve your personality. If recent events change your outlook, append '{marker} <new personality description>' to your response.]";

const DEFAULT_AMBIENT_LOW: &str = "You are in {location}. It is quiet. Do you want to do something? Reply with an emote or say, or '{sentinel}' to do nothing.";

const DEFAULT_AMBIENT_HIGH: &str = "You are in {location}. You have full autonomy. Do you want to take an action? Reply with a command like 'look', 'get <item>', 'drop <item>', 'move <direction>', or 'say <text>', 'emote <text>'. Reply '{sentinel}' to do nothing.";

/// Prompt wording and directive tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Token that introduces a persona rewrite in a completion
    pub mutation_marker: String,

    /// Completion text meaning "do nothing"
    pub no_action_token: String,

    /// Appended to the instructions of mutation-enabled personas. `{marker}` is substituted.
    pub capability_clause: String,

    /// Ambient prompt for low-autonomy agents. `{location}` and `{sentinel}` are substituted.
    pub ambient_low: String,

    /// Ambient prompt for high-autonomy agents
    pub ambient_high: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            mutation_marker: "UPDATE_PROMPT:".to_string(),
            no_action_token: "WAIT".to_string(),
            capability_clause: DEFAULT_CAPABILITY_CLAUSE.to_string(),
            ambient_low: DEFAULT_AMBIENT_LOW.to_string(),
            ambient_high: DEFAULT_AMBIENT_HIGH.to_string(),
        }
    }
}

/// A request ready for the backend. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Persona instructions, plus the capability clause when mutation is enabled
    pub system_instructions: String,
    /// Conversation messages in order, ending with the new text
    pub messages: Vec<Message>,
    /// The text this request answers
    pub new_text: String,
}

impl CompletionRequest {
    /// Convert to a provider request, system message first.
    pub fn to_llm_request(&self, max_tokens: usize, temperature: Option<f32>) -> LLMRequest {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(Message::system(self.system_instructions.clone()));
        messages.extend(self.messages.iter().cloned());

        LLMRequest {
            messages,
            temperature,
            max_tokens: Some(max_tokens),
        }
    }
}

/// Builds completion requests from a persona, a memory snapshot and new text
#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    config: PromptConfig,
}

impl PromptComposer {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// System instructions for `persona`
    pub fn system_instructions(&self, persona: &PersonaState) -> String {
        if !persona.mutation_enabled {
            return persona.base_instructions.clone();
        }
        let clause = self
            .config
            .capability_clause
            .replace("{marker}", &self.config.mutation_marker);
        format!("{}\n\n{}", persona.base_instructions, clause)
    }

    /// Compose a request answering `new_text`.
    ///
    /// When the newest remembered utterance already equals `new_text` it is not repeated.
    pub fn compose(
        &self,
        persona: &PersonaState,
        history: &MemorySnapshot,
        new_text: &str,
    ) -> CompletionRequest {
        let mut messages: Vec<Message> = history.iter().map(|u| u.to_message()).collect();

        let already_recorded = history.last().is_some_and(|u| u.content == new_text);
        if !new_text.is_empty() && !already_recorded {
            messages.push(Message::user(new_text));
        }

        CompletionRequest {
            system_instructions: self.system_instructions(persona),
            messages,
            new_text: new_text.to_string(),
        }
    }

    /// Compose a self-initiated request for an agent standing at `location`.
    pub fn compose_ambient(
        &self,
        persona: &PersonaState,
        history: &MemorySnapshot,
        location: &Location,
    ) -> CompletionRequest {
        let prompt = self.ambient_prompt(persona.autonomy_tier, location);
        self.compose(persona, history, &prompt)
    }

    /// Ambient wording for `tier`
    pub fn ambient_prompt(&self, tier: AutonomyTier, location: &Location) -> String {
        let template = match tier {
            AutonomyTier::Low => &self.config.ambient_low,
            AutonomyTier::High => &self.config.ambient_high,
        };
        template
            .replace("{location}", &location.name)
            .replace("{sentinel}", &self.config.no_action_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ConversationMemory, UtteranceRole};
    use crate::llm::MessageRole;

    fn history(entries: &[(UtteranceRole, &str)]) -> MemorySnapshot {
        let mut memory = ConversationMemory::new(10);
        for (role, content) in entries {
            memory.append(*role, *content);
        }
        memory.snapshot()
    }

    #[test]
    fn test_instructions_without_mutation() {
        let composer = PromptComposer::default();
        let persona = PersonaState::new("You are a blacksmith.");
        assert_eq!(composer.system_instructions(&persona), "You are a blacksmith.");
    }

    #[test]
    fn test_instructions_with_capability_clause() {
        let composer = PromptComposer::default();
        let persona = PersonaState::new("You are a blacksmith.").with_mutation(true);
        let instructions = composer.system_instructions(&persona);
        assert!(instructions.starts_with("You are a blacksmith.\n\n[System:"));
        assert!(instructions.contains("append 'UPDATE_PROMPT: <new personality description>'"));
    }

    #[test]
    fn test_new_text_appended() {
        let composer = PromptComposer::default();
        let snapshot = history(&[
            (UtteranceRole::User, "Bob says: hi"),
            (UtteranceRole::Assistant, "say Hello"),
        ]);

        let request = composer.compose(&PersonaState::default(), &snapshot, "Bob says: bye");
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[2], Message::user("Bob says: bye"));
        assert_eq!(request.new_text, "Bob says: bye");
    }

    #[test]
    fn test_recorded_text_not_duplicated() {
        let composer = PromptComposer::default();
        let snapshot = history(&[
            (UtteranceRole::Assistant, "say Hello"),
            (UtteranceRole::User, "Bob says: how are you?"),
        ]);

        let request =
            composer.compose(&PersonaState::default(), &snapshot, "Bob says: how are you?");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, "Bob says: how are you?");
    }

    #[test]
    fn test_ambient_prompt_by_tier() {
        let composer = PromptComposer::default();
        let tavern = Location::new("room#1", "the tavern");

        let low = composer.ambient_prompt(AutonomyTier::Low, &tavern);
        assert_eq!(
            low,
            "You are in the tavern. It is quiet. Do you want to do something? Reply with an emote or say, or 'WAIT' to do nothing."
        );

        let high = composer.ambient_prompt(AutonomyTier::High, &tavern);
        assert!(high.starts_with("You are in the tavern. You have full autonomy."));
        assert!(high.ends_with("Reply 'WAIT' to do nothing."));
    }

    #[test]
    fn test_ambient_compose_appends_prompt() {
        let composer = PromptComposer::default();
        let snapshot = history(&[(UtteranceRole::Assistant, "emote yawns")]);
        let forge = Location::named("forge");
        let request = composer.compose_ambient(&PersonaState::default(), &snapshot, &forge);

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].role, MessageRole::User);
        assert!(request.new_text.starts_with("You are in forge."));
    }

    #[test]
    fn test_to_llm_request() {
        let composer = PromptComposer::default();
        let persona = PersonaState::new("You are a cat.");
        let request = composer.compose(&persona, &history(&[]), "Bob says: meow");
        let llm = request.to_llm_request(150, None);

        assert_eq!(llm.messages[0], Message::system("You are a cat."));
        assert_eq!(llm.messages[1], Message::user("Bob says: meow"));
        assert_eq!(llm.max_tokens, Some(150));
    }
}
