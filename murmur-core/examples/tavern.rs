//! Tavern example: two NPCs and a player, no network needed
//!
//! A canned backend stands in for the language model so the whole pipeline
//! (gate, memory, prompt, interpretation, dispatch) can be watched offline.
//! The bard is marked as automated when it speaks, so the barkeep never
//! answers it and the two can't talk each other into a loop.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use murmur_core::llm::{LLMProvider, LLMRequest, LLMResponse};
use murmur_core::prelude::*;

struct CannedBackend;

#[async_trait]
impl LLMProvider for CannedBackend {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let last = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let content = if last.contains("It is quiet") {
            "emote polishes a glass".to_string()
        } else if last.contains("room") {
            "say Two silver a night.\n:gestures at the stairs".to_string()
        } else {
            "WAIT".to_string()
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(LLMResponse {
            content,
            usage: None,
        })
    }
}

struct Tavern;

impl World for Tavern {
    fn execute(
        &mut self,
        agent: &AgentRef,
        command: &str,
    ) -> std::result::Result<(), DispatchError> {
        println!("  {} > {}", agent, command);
        Ok(())
    }

    fn location_of(&self, _agent: &AgentRef) -> Option<Location> {
        Some(Location::new("room#1", "the Gilded Lantern"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = MurmurConfig::default();
    let (runtime, handle) = Runtime::new(&config, Tavern, Some(Arc::new(CannedBackend)));
    let task = tokio::spawn(runtime.run());

    let barkeep = Agent::builder()
        .id("npc#mira")
        .settings(AgentSettings {
            persona: PersonaState::new("You are Mira, the barkeep of the Gilded Lantern."),
            cooldown_secs: 1,
            ambient_interval_secs: 3,
            ..Default::default()
        })
        .build()?;
    handle.spawn_agent(barkeep).await?;

    let here = Some(Location::new("room#1", "the Gilded Lantern"));

    println!("Bob asks for a room");
    handle
        .deliver(
            "npc#mira",
            Stimulus::new("player#bob", "Do you have a room?", here.clone())
                .with_speaker_name("Bob"),
        )
        .await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("The bard sings (ignored: automated speaker)");
    handle
        .deliver(
            "npc#mira",
            Stimulus::new("npc#bard", "Fa la la!", here)
                .with_speaker_name("Pip")
                .automated(true),
        )
        .await?;

    println!("Waiting for Mira to get bored");
    tokio::time::sleep(Duration::from_secs(4)).await;

    let snapshot = handle.despawn_agent("npc#mira").await?;
    println!("Mira remembers:");
    for utterance in &snapshot.history {
        println!("  {:?}: {}", utterance.role, utterance.content);
    }

    handle.shutdown().await?;
    let _ = task.await;
    Ok(())
}
