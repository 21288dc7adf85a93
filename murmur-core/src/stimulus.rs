//! Inbound conversational events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an in-world object (agent, player, or other NPC)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentRef(String);

impl AgentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AgentRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A place in the world, compared by key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Stable identifier of the room
    pub key: String,
    /// Display name used in ambient prompts
    pub name: String,
}

impl Location {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }

    /// A location whose display name is its key
    pub fn named(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
        }
    }
}

/// Text delivered by the messaging hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundText {
    /// Plain text
    Plain(String),
    /// Text accompanied by structured metadata; only the text is used
    Structured {
        text: String,
        #[serde(default)]
        data: serde_json::Value,
    },
}

impl InboundText {
    /// The text a stimulus responds to
    pub fn primary(&self) -> &str {
        match self {
            InboundText::Plain(text) => text,
            InboundText::Structured { text, .. } => text,
        }
    }
}

impl From<&str> for InboundText {
    fn from(text: &str) -> Self {
        InboundText::Plain(text.to_string())
    }
}

impl From<String> for InboundText {
    fn from(text: String) -> Self {
        InboundText::Plain(text)
    }
}

/// An inbound conversational event. Ephemeral; never persisted.
#[derive(Debug, Clone)]
pub struct Stimulus {
    /// Who produced the text
    pub speaker: AgentRef,
    /// Display name used when recording the utterance
    pub speaker_name: String,
    /// What was said
    pub text: InboundText,
    /// Where the speaker is, if anywhere
    pub speaker_location: Option<Location>,
    /// Whether the speaker is itself driven by a dialogue engine
    pub speaker_is_automated: bool,
}

impl Stimulus {
    pub fn new(
        speaker: impl Into<AgentRef>,
        text: impl Into<InboundText>,
        speaker_location: Option<Location>,
    ) -> Self {
        let speaker = speaker.into();
        Self {
            speaker_name: speaker.as_str().to_string(),
            speaker,
            text: text.into(),
            speaker_location,
            speaker_is_automated: false,
        }
    }

    pub fn with_speaker_name(mut self, name: impl Into<String>) -> Self {
        self.speaker_name = name.into();
        self
    }

    pub fn automated(mut self, automated: bool) -> Self {
        self.speaker_is_automated = automated;
        self
    }

    /// Memory entry recorded for this stimulus, e.g. `Bob says: hello`
    pub fn utterance(&self) -> String {
        format!("{} says: {}", self.speaker_name, self.text.primary().trim())
    }
}
