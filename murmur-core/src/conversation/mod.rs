//! Conversation Memory
//!
//! Bounded, role-tagged utterance log kept per agent.
//!
//! # Example
//!
//! ```rust
//! use murmur_core::conversation::{ConversationMemory, UtteranceRole};
//!
//! let mut memory = ConversationMemory::new(2);
//! memory.append(UtteranceRole::User, "Bob says: hello");
//! memory.append(UtteranceRole::Assistant, "say Well met, Bob.");
//! memory.append(UtteranceRole::User, "Bob says: bye");
//!
//! assert_eq!(memory.len(), 2);
//! assert_eq!(memory.snapshot()[0].content, "say Well met, Bob.");
//! ```

mod memory;

pub use memory::{
    ConversationMemory, DEFAULT_MEMORY_SIZE, MemorySnapshot, Utterance, UtteranceRole,
};
