//! The simulation loop
//!
//! A [`Runtime`] owns every spawned agent and the [`World`]. It runs as one
//! task, so all agent state (memory, persona, cooldown, in-flight request) is
//! only mutated from here. Backend calls run on worker tasks and come back as
//! [`CompletionOutcome`]s; ambient timers post agent ids on the tick channel.
//!
//! ```rust,no_run
//! use murmur_core::prelude::*;
//!
//! # struct Tavern;
//! # impl World for Tavern {
//! #     fn execute(
//! #         &mut self,
//! #         _: &AgentRef,
//! #         _: &str,
//! #     ) -> std::result::Result<(), DispatchError> {
//! #         Ok(())
//! #     }
//! #     fn location_of(&self, _: &AgentRef) -> Option<Location> {
//! #         Some(Location::named("tavern"))
//! #     }
//! # }
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let config = MurmurConfig::load()?;
//! let (runtime, handle) = Runtime::from_config(&config, Tavern)?;
//! tokio::spawn(runtime.run());
//!
//! let agent = Agent::builder().id("npc#1").settings(config.agent.clone()).build()?;
//! handle.spawn_agent(agent).await?;
//! handle
//!     .deliver("npc#1", Stimulus::new("player#1", "hello", Some(Location::named("tavern"))))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::agent::{Agent, AgentSnapshot, RequestOrigin};
use crate::completion::{CompletionClient, CompletionOutcome};
use crate::config::MurmurConfig;
use crate::conversation::UtteranceRole;
use crate::dispatch::{ActionDispatcher, World};
use crate::error::{MurmurError, Result};
use crate::gate::StimulusGate;
use crate::interpret::ResponseInterpreter;
use crate::llm::{LLMProvider, LLMProviderFactory};
use crate::prompt::{CompletionRequest, PromptComposer};
use crate::scheduler::{AutonomyScheduler, TickDecision};
use crate::stimulus::{AgentRef, Stimulus};

/// Control events accepted by the runtime
#[derive(Debug)]
pub enum RuntimeEvent {
    /// Inbound text for `target` from the world's messaging hook
    Inbound { target: AgentRef, stimulus: Stimulus },
    Spawn {
        agent: Box<Agent>,
        reply: oneshot::Sender<Result<()>>,
    },
    Despawn {
        agent: AgentRef,
        reply: oneshot::Sender<Result<AgentSnapshot>>,
    },
    SetEnabled {
        agent: AgentRef,
        enabled: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        agent: AgentRef,
        reply: oneshot::Sender<Result<AgentSnapshot>>,
    },
    Shutdown,
}

/// Cloneable handle for driving a running [`Runtime`]
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    events: mpsc::Sender<RuntimeEvent>,
}

impl RuntimeHandle {
    async fn send(&self, event: RuntimeEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| MurmurError::RuntimeClosed)
    }

    async fn request<T>(
        &self,
        event: impl FnOnce(oneshot::Sender<Result<T>>) -> RuntimeEvent,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(event(reply)).await?;
        response.await.map_err(|_| MurmurError::RuntimeClosed)?
    }

    /// Hand `agent` to the runtime and start its ambient timer.
    ///
    /// # Errors
    ///
    /// Returns [`MurmurError::DuplicateAgent`] if an agent with the same id runs.
    pub async fn spawn_agent(&self, agent: Agent) -> Result<()> {
        self.request(|reply| RuntimeEvent::Spawn {
            agent: Box::new(agent),
            reply,
        })
        .await
    }

    /// Destroy an agent, returning its final snapshot.
    pub async fn despawn_agent(&self, agent: impl Into<AgentRef>) -> Result<AgentSnapshot> {
        let agent = agent.into();
        self.request(|reply| RuntimeEvent::Despawn { agent, reply })
            .await
    }

    /// Deliver inbound text to `target`. Fire and forget.
    pub async fn deliver(&self, target: impl Into<AgentRef>, stimulus: Stimulus) -> Result<()> {
        self.send(RuntimeEvent::Inbound {
            target: target.into(),
            stimulus,
        })
        .await
    }

    /// Switch an agent's dialogue engine on or off
    pub async fn set_enabled(&self, agent: impl Into<AgentRef>, enabled: bool) -> Result<()> {
        let agent = agent.into();
        self.request(|reply| RuntimeEvent::SetEnabled {
            agent,
            enabled,
            reply,
        })
        .await
    }

    /// Current snapshot of an agent
    pub async fn snapshot(&self, agent: impl Into<AgentRef>) -> Result<AgentSnapshot> {
        let agent = agent.into();
        self.request(|reply| RuntimeEvent::Snapshot { agent, reply })
            .await
    }

    /// Stop the runtime. Pending events before this one are still processed.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(RuntimeEvent::Shutdown).await
    }
}

/// Single-threaded owner of all agents and the world
pub struct Runtime<W: World> {
    world: W,
    agents: HashMap<AgentRef, Agent>,
    composer: PromptComposer,
    interpreter: ResponseInterpreter,
    client: CompletionClient,
    fallback_line: Option<String>,
    events: mpsc::Receiver<RuntimeEvent>,
    outcomes: mpsc::Receiver<CompletionOutcome>,
    ticks: mpsc::Receiver<AgentRef>,
    ticks_tx: mpsc::Sender<AgentRef>,
}

impl<W: World> Runtime<W> {
    /// Create a runtime around `world`. With `provider == None` every request resolves empty.
    pub fn new(
        config: &MurmurConfig,
        world: W,
        provider: Option<Arc<dyn LLMProvider>>,
    ) -> (Self, RuntimeHandle) {
        let capacity = config.runtime.event_buffer.max(1);
        let (events_tx, events) = mpsc::channel(capacity);
        let (outcomes_tx, outcomes) = mpsc::channel(capacity);
        let (ticks_tx, ticks) = mpsc::channel(capacity);

        let client = CompletionClient::new(provider, outcomes_tx)
            .with_max_tokens(config.runtime.max_output_tokens)
            .with_temperature(config.runtime.temperature);

        let runtime = Self {
            world,
            agents: HashMap::new(),
            composer: PromptComposer::new(config.prompts.clone()),
            interpreter: ResponseInterpreter::from_config(&config.prompts),
            client,
            fallback_line: config.runtime.fallback_line.clone(),
            events,
            outcomes,
            ticks,
            ticks_tx,
        };

        (runtime, RuntimeHandle { events: events_tx })
    }

    /// Create a runtime with the backend described by `config.llm`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be constructed.
    pub fn from_config(config: &MurmurConfig, world: W) -> Result<(Self, RuntimeHandle)> {
        let provider = LLMProviderFactory::from_config(config.llm.as_ref())?;
        Ok(Self::new(config, world, provider))
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Process events until shutdown or until every handle is dropped.
    ///
    /// Returns the world so callers can inspect it afterwards.
    pub async fn run(mut self) -> W {
        tracing::info!(backend = self.client.is_enabled(), "Runtime started");

        loop {
            tokio::select! {
                biased;
                Some(outcome) = self.outcomes.recv() => self.handle_completion(outcome),
                Some(agent) = self.ticks.recv() => self.handle_tick(&agent),
                event = self.events.recv() => match event {
                    Some(RuntimeEvent::Shutdown) | None => break,
                    Some(event) => self.handle_event(event),
                },
            }
        }

        for agent in self.agents.values_mut() {
            agent.destroy();
        }
        tracing::info!(agents = self.agents.len(), "Runtime stopped");
        self.world
    }

    fn handle_event(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Inbound { target, stimulus } => self.handle_stimulus(&target, stimulus),
            RuntimeEvent::Spawn { agent, reply } => {
                let _ = reply.send(self.spawn_agent(*agent));
            }
            RuntimeEvent::Despawn { agent, reply } => {
                let _ = reply.send(self.despawn_agent(&agent));
            }
            RuntimeEvent::SetEnabled {
                agent,
                enabled,
                reply,
            } => {
                let result = match self.agents.get_mut(&agent) {
                    Some(a) => {
                        a.set_enabled(enabled);
                        tracing::info!(agent = %agent, enabled, "Dialogue engine toggled");
                        Ok(())
                    }
                    None => Err(MurmurError::AgentNotFound(agent.to_string())),
                };
                let _ = reply.send(result);
            }
            RuntimeEvent::Snapshot { agent, reply } => {
                let result = self
                    .agents
                    .get(&agent)
                    .map(Agent::snapshot)
                    .ok_or_else(|| MurmurError::AgentNotFound(agent.to_string()));
                let _ = reply.send(result);
            }
            RuntimeEvent::Shutdown => {}
        }
    }

    fn spawn_agent(&mut self, mut agent: Agent) -> Result<()> {
        let id = agent.id().clone();
        if self.agents.contains_key(&id) {
            return Err(MurmurError::DuplicateAgent(id.to_string()));
        }

        let autonomous = agent.arm_autonomy(self.ticks_tx.clone());
        tracing::info!(
            agent = %id,
            autonomous,
            tier = ?agent.persona().autonomy_tier,
            "Agent spawned"
        );
        self.agents.insert(id, agent);
        Ok(())
    }

    fn despawn_agent(&mut self, id: &AgentRef) -> Result<AgentSnapshot> {
        let mut agent = self
            .agents
            .remove(id)
            .ok_or_else(|| MurmurError::AgentNotFound(id.to_string()))?;

        let was_busy = agent.is_busy();
        agent.destroy();
        tracing::info!(agent = %id, cancelled_request = was_busy, "Agent despawned");
        Ok(agent.snapshot())
    }

    fn handle_stimulus(&mut self, target: &AgentRef, stimulus: Stimulus) {
        let Some(agent) = self.agents.get_mut(target) else {
            tracing::debug!(agent = %target, "Stimulus for unknown agent dropped");
            return;
        };

        let location = self.world.location_of(target);
        let now = Instant::now();

        let admitted = match StimulusGate::admit(&stimulus, agent, location.as_ref(), now) {
            Ok(admitted) => admitted,
            Err(reason) => {
                tracing::debug!(
                    agent = %target,
                    speaker = %stimulus.speaker,
                    %reason,
                    "Stimulus rejected"
                );
                return;
            }
        };

        agent.record(UtteranceRole::User, admitted.utterance.clone());
        let request = self.composer.compose(
            agent.persona(),
            &agent.memory().snapshot(),
            &admitted.utterance,
        );
        let origin = RequestOrigin::Reactive {
            speaker: stimulus.speaker,
        };
        submit(&self.client, agent, request, origin, now);
    }

    fn handle_tick(&mut self, id: &AgentRef) {
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        if !agent.scheduler_mut().begin_tick() {
            return;
        }

        let location = self.world.location_of(id);
        let now = Instant::now();

        match AutonomyScheduler::evaluate(agent, location.as_ref(), now) {
            TickDecision::Fire(location) => {
                let request = self.composer.compose_ambient(
                    agent.persona(),
                    &agent.memory().snapshot(),
                    &location,
                );
                submit(&self.client, agent, request, RequestOrigin::Ambient, now);
            }
            TickDecision::Skip(reason) => {
                tracing::debug!(agent = %id, ?reason, "Ambient tick skipped");
            }
        }

        agent.scheduler_mut().finish_tick();
    }

    fn handle_completion(&mut self, outcome: CompletionOutcome) {
        let CompletionOutcome {
            request_id,
            agent: id,
            result,
        } = outcome;

        let Some(agent) = self.agents.get_mut(&id) else {
            tracing::debug!(agent = %id, %request_id, "Completion for departed agent dropped");
            return;
        };
        let Some(in_flight) = agent.finish_request(request_id) else {
            tracing::debug!(agent = %id, %request_id, "Stale completion dropped");
            return;
        };

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(agent = %id, error = %e, "Completion failed; no action taken");
                if let (RequestOrigin::Reactive { speaker }, Some(line)) =
                    (&in_flight.origin, self.fallback_line.as_deref())
                {
                    self.world.tell(speaker, line);
                }
                return;
            }
        };

        let interpretation = self.interpreter.interpret(&text, agent.persona());

        if let Some(update) = &interpretation.persona_update
            && agent.apply_persona_update(update)
        {
            tracing::info!(agent = %id, "Persona rewritten by agent");
        }

        if let Some(visible) = &interpretation.visible {
            agent.record(UtteranceRole::Assistant, visible.clone());
        }

        if interpretation.actions.is_empty() {
            return;
        }
        let report = ActionDispatcher::dispatch_all(&mut self.world, &id, &interpretation.actions);
        tracing::debug!(
            agent = %id,
            dispatched = report.dispatched,
            skipped = report.skipped,
            failed = report.failed,
            "Actions dispatched"
        );
    }
}

fn submit(
    client: &CompletionClient,
    agent: &mut Agent,
    request: CompletionRequest,
    origin: RequestOrigin,
    now: Instant,
) {
    agent.mark_responded(now);
    let pending = client.submit(agent.id().clone(), request);
    tracing::info!(
        agent = %agent.id(),
        request_id = %pending.id,
        ?origin,
        "Completion submitted"
    );
    agent.begin_request(pending, origin);
}
