//! Core agent implementation
//!
//! An [`Agent`] is an NPC's dialogue engine: its persona, bounded conversation
//! memory, cooldown, in-flight request and ambient scheduler. Agents are owned
//! by the [`Runtime`](crate::runtime::Runtime) and only ever touched from its
//! loop, so none of this state is shared or locked.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::completion::{PendingCompletion, RequestId};
use crate::conversation::{ConversationMemory, DEFAULT_MEMORY_SIZE, Utterance, UtteranceRole};
use crate::error::{MurmurError, Result};
use crate::persona::PersonaState;
use crate::scheduler::{AutonomyScheduler, MAX_INTERVAL};
use crate::stimulus::AgentRef;

/// Persisted per-agent settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Persona the agent starts with
    pub persona: PersonaState,

    /// Minimum seconds between two submitted requests
    pub cooldown_secs: u64,

    /// Number of utterances remembered
    pub memory_size: usize,

    /// Seconds between ambient ticks (0 disables autonomy)
    pub ambient_interval_secs: u64,

    /// Whether the dialogue engine is switched on
    pub enabled: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            persona: PersonaState::default(),
            cooldown_secs: 5,
            memory_size: DEFAULT_MEMORY_SIZE,
            ambient_interval_secs: 0,
            enabled: true,
        }
    }
}

/// What triggered a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Answering an admitted stimulus from `speaker`
    Reactive { speaker: AgentRef },
    /// Self-initiated on an ambient tick
    Ambient,
}

/// The request an agent is waiting on
#[derive(Debug)]
pub struct InFlight {
    pub request: PendingCompletion,
    pub origin: RequestOrigin,
}

/// Serialisable image of an agent. The last response time is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentRef,
    pub settings: AgentSettings,
    pub history: Vec<Utterance>,
}

/// An NPC's dialogue engine
///
/// # Example
///
/// ```rust
/// use murmur_core::agent::{Agent, AgentSettings};
///
/// let agent = Agent::builder()
///     .id("npc#12")
///     .settings(AgentSettings::default())
///     .build()
///     .expect("valid agent");
///
/// assert!(agent.is_enabled());
/// assert!(agent.memory().is_empty());
/// ```
#[derive(Debug)]
pub struct Agent {
    id: AgentRef,
    persona: PersonaState,
    memory: ConversationMemory,
    cooldown: Duration,
    enabled: bool,
    alive: bool,
    last_response: Option<Instant>,
    in_flight: Option<InFlight>,
    scheduler: AutonomyScheduler,
}

impl Agent {
    /// Create a new agent builder
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Rebuild an agent from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot settings are invalid.
    pub fn restore(snapshot: AgentSnapshot) -> Result<Self> {
        Agent::builder()
            .id(snapshot.id)
            .settings(snapshot.settings)
            .history(snapshot.history)
            .build()
    }

    pub fn id(&self) -> &AgentRef {
        &self.id
    }

    pub fn persona(&self) -> &PersonaState {
        &self.persona
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Record an utterance in conversation memory
    pub fn record(&mut self, role: UtteranceRole, content: impl Into<String>) {
        self.memory.append(role, content);
    }

    /// Replace the base instructions. Returns `true` if the persona changed.
    pub fn apply_persona_update(&mut self, new_instructions: &str) -> bool {
        self.persona.mutate(new_instructions)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the agent still exists
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Time of the most recent submitted request
    pub fn last_response(&self) -> Option<Instant> {
        self.last_response
    }

    /// Whether at least one cooldown has passed since the last request
    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.last_response {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        }
    }

    /// Stamp a submitted request. The timestamp never moves backwards.
    pub fn mark_responded(&mut self, at: Instant) {
        self.last_response = Some(match self.last_response {
            Some(last) => last.max(at),
            None => at,
        });
    }

    /// Whether a request is in flight
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    /// Record a newly submitted request. A request still in flight is cancelled.
    pub fn begin_request(&mut self, request: PendingCompletion, origin: RequestOrigin) {
        if let Some(previous) = self.in_flight.take() {
            previous.request.cancel();
        }
        self.in_flight = Some(InFlight { request, origin });
    }

    /// Clear the in-flight request if it is `id`. Stale ids leave the agent untouched.
    pub fn finish_request(&mut self, id: RequestId) -> Option<InFlight> {
        if self.in_flight.as_ref().is_some_and(|f| f.request.id == id) {
            self.in_flight.take()
        } else {
            None
        }
    }

    pub fn scheduler(&self) -> &AutonomyScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut AutonomyScheduler {
        &mut self.scheduler
    }

    /// Start the ambient timer, posting this agent's id on `ticks`.
    pub fn arm_autonomy(&mut self, ticks: mpsc::Sender<AgentRef>) -> bool {
        let id = self.id.clone();
        self.scheduler.arm(id, ticks)
    }

    /// Stop the timer and cancel any in-flight request. The agent is dead afterwards.
    pub fn destroy(&mut self) {
        self.alive = false;
        self.scheduler.stop();
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.request.cancel();
        }
    }

    /// Current settings, reflecting any persona mutation and enable toggle
    pub fn settings(&self) -> AgentSettings {
        AgentSettings {
            persona: self.persona.clone(),
            cooldown_secs: self.cooldown.as_secs(),
            memory_size: self.memory.capacity(),
            ambient_interval_secs: self.scheduler.interval().as_secs(),
            enabled: self.enabled,
        }
    }

    /// Serialisable image of this agent
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id.clone(),
            settings: self.settings(),
            history: self.memory.snapshot().to_vec(),
        }
    }
}

/// Builder for [`Agent`]
#[derive(Debug, Default)]
pub struct AgentBuilder {
    id: Option<AgentRef>,
    settings: AgentSettings,
    persona: Option<PersonaState>,
    history: Vec<Utterance>,
}

impl AgentBuilder {
    /// Create a new agent builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set agent ID
    pub fn id(mut self, id: impl Into<AgentRef>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set agent settings
    pub fn settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Override the persona in the settings
    pub fn persona(mut self, persona: PersonaState) -> Self {
        self.persona = Some(persona);
        self
    }

    /// Seed conversation memory. Only the newest `memory_size` entries are kept.
    pub fn history(mut self, history: Vec<Utterance>) -> Self {
        self.history = history;
        self
    }

    /// Build the agent
    pub fn build(self) -> Result<Agent> {
        let id = self
            .id
            .ok_or_else(|| MurmurError::Configuration("Agent ID is required".to_string()))?;

        if id.as_str().trim().is_empty() {
            return Err(MurmurError::Configuration(
                "Agent ID must not be empty".to_string(),
            ));
        }
        if self.settings.memory_size == 0 {
            return Err(MurmurError::Configuration(format!(
                "Agent {} memory_size must be greater than zero",
                id
            )));
        }
        if self.settings.ambient_interval_secs > MAX_INTERVAL.as_secs() {
            return Err(MurmurError::Configuration(format!(
                "Agent {} ambient_interval_secs must be at most {}",
                id,
                MAX_INTERVAL.as_secs()
            )));
        }

        let persona = self.persona.unwrap_or(self.settings.persona);

        Ok(Agent {
            id,
            persona,
            memory: ConversationMemory::from_entries(self.settings.memory_size, self.history),
            cooldown: Duration::from_secs(self.settings.cooldown_secs),
            enabled: self.settings.enabled,
            alive: true,
            last_response: None,
            in_flight: None,
            scheduler: AutonomyScheduler::new(Duration::from_secs(
                self.settings.ambient_interval_secs,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionClient;
    use crate::persona::AutonomyTier;
    use crate::prompt::CompletionRequest;

    #[test]
    fn test_agent_creation() {
        let agent = Agent::builder()
            .id("npc#1")
            .build()
            .expect("Failed to create agent");

        assert_eq!(agent.id().as_str(), "npc#1");
        assert!(agent.is_enabled());
        assert!(agent.is_alive());
        assert!(!agent.is_busy());
        assert_eq!(agent.memory().capacity(), 10);
        assert_eq!(agent.cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn test_agent_requires_id() {
        assert!(Agent::builder().build().is_err());
        assert!(Agent::builder().id("  ").build().is_err());
    }

    #[test]
    fn test_zero_memory_rejected() {
        let result = Agent::builder()
            .id("npc#1")
            .settings(AgentSettings {
                memory_size: 0,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(MurmurError::Configuration(_))));
    }

    #[test]
    fn test_oversized_ambient_interval_rejected() {
        let result = Agent::builder()
            .id("npc#1")
            .settings(AgentSettings {
                ambient_interval_secs: u64::MAX,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(MurmurError::Configuration(_))));
    }

    #[test]
    fn test_cooldown_and_monotonic_timestamp() {
        let mut agent = Agent::builder()
            .id("npc#1")
            .build()
            .expect("Failed to create agent");
        let t0 = Instant::now();
        assert!(agent.cooldown_elapsed(t0));

        agent.mark_responded(t0 + Duration::from_secs(10));
        agent.mark_responded(t0);
        assert_eq!(agent.last_response(), Some(t0 + Duration::from_secs(10)));

        assert!(!agent.cooldown_elapsed(t0 + Duration::from_secs(14)));
        assert!(agent.cooldown_elapsed(t0 + Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn test_stale_request_ignored() {
        let (tx, _rx) = mpsc::channel(4);
        let client = CompletionClient::new(None, tx);
        let mut agent = Agent::builder()
            .id("npc#1")
            .build()
            .expect("Failed to create agent");

        let request = CompletionRequest {
            system_instructions: String::new(),
            messages: Vec::new(),
            new_text: String::new(),
        };
        let pending = client.submit(agent.id().clone(), request);
        let id = pending.id;
        agent.begin_request(pending, RequestOrigin::Ambient);
        assert!(agent.is_busy());

        assert!(agent.finish_request(uuid::Uuid::new_v4()).is_none());
        assert!(agent.is_busy());

        let finished = agent.finish_request(id).expect("matching id");
        assert_eq!(finished.origin, RequestOrigin::Ambient);
        assert!(!agent.is_busy());
    }

    #[test]
    fn test_snapshot_restore() {
        let settings = AgentSettings {
            persona: PersonaState::new("You are Mira.")
                .with_autonomy(AutonomyTier::High)
                .with_mutation(true),
            cooldown_secs: 2,
            memory_size: 3,
            ambient_interval_secs: 45,
            enabled: true,
        };
        let mut agent = Agent::builder()
            .id("npc#7")
            .settings(settings)
            .build()
            .expect("Failed to create agent");

        for i in 0..5 {
            agent.record(UtteranceRole::User, format!("Bob says: {}", i));
        }
        assert!(agent.apply_persona_update("You are Mira, now wary."));
        agent.set_enabled(false);

        let snapshot = agent.snapshot();
        assert_eq!(snapshot.history.len(), 3);
        assert_eq!(snapshot.history[0].content, "Bob says: 2");

        let json = serde_json::to_string(&snapshot).expect("serialize");
        let restored =
            Agent::restore(serde_json::from_str(&json).expect("deserialize")).expect("restore");

        assert_eq!(restored.persona().base_instructions, "You are Mira, now wary.");
        assert!(!restored.is_enabled());
        assert_eq!(restored.memory().len(), 3);
        assert_eq!(restored.scheduler().interval(), Duration::from_secs(45));
        assert!(restored.last_response().is_none());
    }

    #[test]
    fn test_destroy_stops_scheduler() {
        let mut agent = Agent::builder()
            .id("npc#1")
            .build()
            .expect("Failed to create agent");
        agent.destroy();
        assert!(!agent.is_alive());
        assert_eq!(
            agent.scheduler().state(),
            crate::scheduler::SchedulerState::Idle
        );
    }
}
