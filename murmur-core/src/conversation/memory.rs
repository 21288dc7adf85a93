//! Bounded conversation memory

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::llm::{Message, MessageRole};

/// Default number of utterances an agent remembers
pub const DEFAULT_MEMORY_SIZE: usize = 10;

/// Who produced an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtteranceRole {
    /// Someone speaking to the agent
    User,
    /// The agent itself
    Assistant,
}

impl From<UtteranceRole> for MessageRole {
    fn from(role: UtteranceRole) -> Self {
        match role {
            UtteranceRole::User => MessageRole::User,
            UtteranceRole::Assistant => MessageRole::Assistant,
        }
    }
}

/// A single remembered utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: UtteranceRole,
    pub content: String,
}

impl Utterance {
    pub fn new(role: UtteranceRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(UtteranceRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(UtteranceRole::Assistant, content)
    }

    /// Convert to an LLM message
    pub fn to_message(&self) -> Message {
        Message {
            role: self.role.into(),
            content: self.content.clone(),
        }
    }
}

/// Immutable, ordered copy of a memory at one point in time.
///
/// Cloning is cheap; later appends to the source memory are not observed.
pub type MemorySnapshot = Arc<[Utterance]>;

/// Ordered utterance log holding at most `capacity` entries.
///
/// The oldest entries are evicted first when the bound is exceeded.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    entries: VecDeque<Utterance>,
    capacity: usize,
}

impl ConversationMemory {
    /// Create an empty memory. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuild a memory from persisted entries, keeping only the newest `capacity`.
    pub fn from_entries(capacity: usize, entries: impl IntoIterator<Item = Utterance>) -> Self {
        let mut memory = Self::new(capacity);
        for entry in entries {
            memory.push(entry);
        }
        memory
    }

    /// Append to the tail, evicting from the head while over capacity.
    pub fn append(&mut self, role: UtteranceRole, content: impl Into<String>) {
        self.push(Utterance::new(role, content));
    }

    fn push(&mut self, utterance: Utterance) {
        self.entries.push_back(utterance);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Ordered copy of the current entries
    pub fn snapshot(&self) -> MemorySnapshot {
        self.entries.iter().cloned().collect()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&Utterance> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}
