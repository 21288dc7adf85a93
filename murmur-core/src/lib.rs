//! # Murmur - Dialogue and Action Engine for Non-Player Agents
//!
//! Murmur turns what players say, and the passing of time, into requests to a
//! text-generation backend, and turns the backend's free-form replies back into
//! in-world speech and commands. Along the way it enforces:
//! - Per-agent cooldowns and at most one request in flight
//! - Anti-feedback protection between automated speakers
//! - Bounded conversational memory
//! - Optional self-directed persona rewrites
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use murmur_core::prelude::*;
//!
//! struct Tavern;
//!
//! impl World for Tavern {
//!     fn execute(
//!         &mut self,
//!         agent: &AgentRef,
//!         command: &str,
//!     ) -> std::result::Result<(), DispatchError> {
//!         println!("{agent}: {command}");
//!         Ok(())
//!     }
//!
//!     fn location_of(&self, _agent: &AgentRef) -> Option<Location> {
//!         Some(Location::new("room#1", "the tavern"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = MurmurConfig::load()?;
//!     let (runtime, handle) = Runtime::from_config(&config, Tavern)?;
//!     tokio::spawn(runtime.run());
//!
//!     let barkeep = Agent::builder()
//!         .id("npc#1")
//!         .persona(PersonaState::new("You are Mira, a tired barkeep."))
//!         .build()?;
//!     handle.spawn_agent(barkeep).await?;
//!
//!     let here = Some(Location::new("room#1", "the tavern"));
//!     let stimulus = Stimulus::new("player#1", "Any rooms free?", here).with_speaker_name("Bob");
//!     handle.deliver("npc#1", stimulus).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! stimulus -> StimulusGate -> ConversationMemory -> PromptComposer -> CompletionClient
//!                                                                        |
//!     World <- ActionDispatcher <- (persona rewrite) <- ResponseInterpreter
//! ```
//!
//! The [`AutonomyScheduler`](scheduler::AutonomyScheduler) feeds the same
//! pipeline from a timer, bypassing the gate. Everything except the backend call
//! runs on the single [`Runtime`](runtime::Runtime) task.
//!
//! ## Feature Flags
//!
//! - `llm-openai` (default): OpenAI-compatible chat completions backend

pub mod agent;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod interpret;
pub mod llm;
pub mod persona;
pub mod prompt;
pub mod runtime;
pub mod scheduler;
pub mod stimulus;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentBuilder, AgentSettings, AgentSnapshot, RequestOrigin};
    pub use crate::completion::{CompletionClient, CompletionOutcome, PendingCompletion};
    pub use crate::config::{LLMProviderConfig, MurmurConfig, RuntimeConfig};
    pub use crate::conversation::{ConversationMemory, MemorySnapshot, Utterance, UtteranceRole};
    pub use crate::dispatch::{ActionDispatcher, DispatchError, World};
    pub use crate::error::{MurmurError, Result};
    pub use crate::gate::{Rejection, StimulusGate};
    pub use crate::interpret::{ActionLine, Interpretation, ResponseInterpreter};
    pub use crate::llm::{LLMProvider, LLMProviderFactory, LLMRequest, LLMResponse, Message};
    pub use crate::persona::{AutonomyTier, PersonaState};
    pub use crate::prompt::{CompletionRequest, PromptComposer, PromptConfig};
    pub use crate::runtime::{Runtime, RuntimeEvent, RuntimeHandle};
    pub use crate::scheduler::{AutonomyScheduler, SchedulerState, TickDecision};
    pub use crate::stimulus::{AgentRef, InboundText, Location, Stimulus};
}
