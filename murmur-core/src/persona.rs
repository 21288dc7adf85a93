//! Persona descriptor for an agent

use serde::{Deserialize, Serialize};

/// Default instructions for a freshly spawned agent
pub const DEFAULT_INSTRUCTIONS: &str =
    "You are a generic NPC in a fantasy world. You are helpful and polite.";

/// How much freedom an agent has when acting on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutonomyTier {
    /// Only speaks and emotes; unrecognised lines become speech
    #[default]
    Low,
    /// Unrecognised lines are attempted as raw in-world commands
    High,
}

impl std::str::FromStr for AutonomyTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(AutonomyTier::Low),
            "high" => Ok(AutonomyTier::High),
            other => Err(format!("Invalid autonomy tier: {}", other)),
        }
    }
}

/// Mutable persona of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaState {
    /// System instructions describing who the agent is
    pub base_instructions: String,

    /// Autonomy tier
    pub autonomy_tier: AutonomyTier,

    /// Whether the agent may rewrite its own instructions
    pub mutation_enabled: bool,
}

impl PersonaState {
    pub fn new(base_instructions: impl Into<String>) -> Self {
        Self {
            base_instructions: base_instructions.into(),
            autonomy_tier: AutonomyTier::Low,
            mutation_enabled: false,
        }
    }

    pub fn with_autonomy(mut self, tier: AutonomyTier) -> Self {
        self.autonomy_tier = tier;
        self
    }

    pub fn with_mutation(mut self, enabled: bool) -> Self {
        self.mutation_enabled = enabled;
        self
    }

    /// Replace the base instructions if mutation is enabled and the new text is non-blank.
    ///
    /// Returns `true` when the persona changed.
    pub fn mutate(&mut self, new_instructions: &str) -> bool {
        let trimmed = new_instructions.trim();
        if !self.mutation_enabled || trimmed.is_empty() {
            return false;
        }
        self.base_instructions = trimmed.to_string();
        true
    }
}

impl Default for PersonaState {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_requires_flag() {
        let mut persona = PersonaState::new("You are a guard.");
        assert!(!persona.mutate("You are a pirate."));
        assert_eq!(persona.base_instructions, "You are a guard.");

        let mut persona = persona.with_mutation(true);
        assert!(persona.mutate("  You are a pirate.  "));
        assert_eq!(persona.base_instructions, "You are a pirate.");
    }

    #[test]
    fn test_blank_mutation_ignored() {
        let mut persona = PersonaState::default().with_mutation(true);
        assert!(!persona.mutate("   \n"));
        assert_eq!(persona.base_instructions, DEFAULT_INSTRUCTIONS);
    }

    #[test]
    fn test_autonomy_parse() {
        assert_eq!("HIGH".parse::<AutonomyTier>().unwrap(), AutonomyTier::High);
        assert_eq!("low".parse::<AutonomyTier>().unwrap(), AutonomyTier::Low);
        assert!("medium".parse::<AutonomyTier>().is_err());
    }
}
