//! Shared fixtures: a recording world and a scripted backend

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use murmur_core::llm::{LLMProvider, LLMRequest, LLMResponse};
use murmur_core::prelude::*;

pub const NPC: &str = "npc#1";
pub const PLAYER: &str = "player#1";

pub fn tavern() -> Location {
    Location::new("room#1", "the tavern")
}

#[derive(Debug, Default)]
pub struct WorldLog {
    pub locations: HashMap<AgentRef, Location>,
    pub commands: Vec<(AgentRef, String, Instant)>,
    pub told: Vec<(AgentRef, String)>,
    pub refused: Vec<String>,
}

/// World whose state stays observable while the runtime owns it
#[derive(Debug, Clone, Default)]
pub struct RecordingWorld {
    log: Arc<Mutex<WorldLog>>,
}

impl RecordingWorld {
    /// NPC and player standing in the tavern
    pub fn tavern() -> Self {
        let world = Self::default();
        world.place(NPC, tavern());
        world.place(PLAYER, tavern());
        world
    }

    pub fn place(&self, who: &str, location: Location) {
        self.log
            .lock()
            .unwrap()
            .locations
            .insert(AgentRef::new(who), location);
    }

    pub fn remove(&self, who: &str) {
        self.log.lock().unwrap().locations.remove(&AgentRef::new(who));
    }

    pub fn refuse(&self, command: &str) {
        self.log.lock().unwrap().refused.push(command.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .commands
            .iter()
            .map(|(_, command, _)| command.clone())
            .collect()
    }

    pub fn command_times(&self) -> Vec<Instant> {
        self.log
            .lock()
            .unwrap()
            .commands
            .iter()
            .map(|(_, _, at)| *at)
            .collect()
    }

    pub fn told(&self) -> Vec<(AgentRef, String)> {
        self.log.lock().unwrap().told.clone()
    }
}

impl World for RecordingWorld {
    fn execute(
        &mut self,
        agent: &AgentRef,
        command: &str,
    ) -> std::result::Result<(), DispatchError> {
        let mut log = self.log.lock().unwrap();
        if log.refused.iter().any(|r| r == command) {
            return Err(DispatchError::Rejected(format!("Huh? '{}'", command)));
        }
        log.commands
            .push((agent.clone(), command.to_string(), Instant::now()));
        Ok(())
    }

    fn location_of(&self, agent: &AgentRef) -> Option<Location> {
        self.log.lock().unwrap().locations.get(agent).cloned()
    }

    fn tell(&mut self, recipient: &AgentRef, text: &str) {
        self.log
            .lock()
            .unwrap()
            .told
            .push((recipient.clone(), text.to_string()));
    }
}

/// Backend replaying canned replies in order, then empty text
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Hold every reply for `delay` of (tokio) time
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(LLMResponse {
                content,
                usage: None,
            }),
            Some(Err(message)) => Err(MurmurError::Backend(message)),
            None => Ok(LLMResponse {
                content: String::new(),
                usage: None,
            }),
        }
    }
}

pub fn settings(cooldown_secs: u64) -> AgentSettings {
    AgentSettings {
        persona: PersonaState::new("You are Mira, a tired barkeep."),
        cooldown_secs,
        ..Default::default()
    }
}

pub fn npc(settings: AgentSettings) -> Agent {
    Agent::builder()
        .id(NPC)
        .settings(settings)
        .build()
        .expect("Failed to create agent")
}

pub fn player_says(text: &str) -> Stimulus {
    Stimulus::new(PLAYER, text, Some(tavern())).with_speaker_name("Bob")
}

/// Start a runtime over `world` backed by `provider`
pub fn start(
    config: &MurmurConfig,
    world: RecordingWorld,
    provider: Option<Arc<ScriptedProvider>>,
) -> RuntimeHandle {
    let provider = provider.map(|p| p as Arc<dyn LLMProvider>);
    let (runtime, handle) = Runtime::new(config, world, provider);
    tokio::spawn(runtime.run());
    handle
}

/// Let every runnable task finish. Under paused time this also advances the clock by 1ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
