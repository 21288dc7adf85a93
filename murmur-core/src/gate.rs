//! Admission filter for inbound stimuli

use std::fmt;
use tokio::time::Instant;

use crate::agent::Agent;
use crate::stimulus::{Location, Stimulus};

/// Why a stimulus was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The agent heard itself
    SelfSpeech,
    /// The speaker runs its own dialogue engine; answering would risk a feedback loop
    AutomatedSpeaker,
    /// The agent's dialogue engine is switched off
    Disabled,
    /// A completion for this agent is still in flight
    Busy,
    /// The agent responded too recently
    CoolingDown,
    /// Speaker and agent are not in the same place
    LocationMismatch,
    /// Nothing was said
    EmptyText,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::SelfSpeech => "speaker is the agent itself",
            Rejection::AutomatedSpeaker => "speaker is automated",
            Rejection::Disabled => "agent is disabled",
            Rejection::Busy => "request already in flight",
            Rejection::CoolingDown => "agent is cooling down",
            Rejection::LocationMismatch => "speaker is elsewhere",
            Rejection::EmptyText => "empty text",
        };
        f.write_str(reason)
    }
}

/// An admitted stimulus, reduced to the utterance to remember and answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    pub utterance: String,
}

/// Synchronous, side-effect free admission filter
pub struct StimulusGate;

impl StimulusGate {
    /// Decide whether `agent`, standing at `agent_location`, answers `stimulus` at `now`.
    pub fn admit(
        stimulus: &Stimulus,
        agent: &Agent,
        agent_location: Option<&Location>,
        now: Instant,
    ) -> Result<Admitted, Rejection> {
        if stimulus.speaker == *agent.id() {
            return Err(Rejection::SelfSpeech);
        }
        if stimulus.speaker_is_automated {
            return Err(Rejection::AutomatedSpeaker);
        }
        if !agent.is_enabled() {
            return Err(Rejection::Disabled);
        }
        if agent.is_busy() {
            return Err(Rejection::Busy);
        }
        if !agent.cooldown_elapsed(now) {
            return Err(Rejection::CoolingDown);
        }
        match (agent_location, stimulus.speaker_location.as_ref()) {
            (Some(here), Some(there)) if here.key == there.key => {}
            _ => return Err(Rejection::LocationMismatch),
        }
        if stimulus.text.primary().trim().is_empty() {
            return Err(Rejection::EmptyText);
        }

        Ok(Admitted {
            utterance: stimulus.utterance(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentSettings};
    use std::time::Duration;

    fn tavern() -> Location {
        Location::new("room#1", "the Prancing Pony")
    }

    fn agent(cooldown_secs: u64) -> Agent {
        Agent::builder()
            .id("npc#1")
            .settings(AgentSettings {
                cooldown_secs,
                ..Default::default()
            })
            .build()
            .expect("Failed to create agent")
    }

    fn player_says(text: &str) -> Stimulus {
        Stimulus::new("player#1", text, Some(tavern())).with_speaker_name("Bob")
    }

    #[test]
    fn test_admits_player_in_same_room() {
        let agent = agent(5);
        let decision =
            StimulusGate::admit(&player_says("hello"), &agent, Some(&tavern()), Instant::now());
        assert_eq!(
            decision,
            Ok(Admitted {
                utterance: "Bob says: hello".to_string()
            })
        );
    }

    #[test]
    fn test_rejects_self() {
        let agent = agent(0);
        let stimulus = Stimulus::new("npc#1", "hello", Some(tavern()));
        assert_eq!(
            StimulusGate::admit(&stimulus, &agent, Some(&tavern()), Instant::now()),
            Err(Rejection::SelfSpeech)
        );
    }

    #[test]
    fn test_rejects_automated_speaker() {
        let agent = agent(0);
        let stimulus = player_says("hello").automated(true);
        assert_eq!(
            StimulusGate::admit(&stimulus, &agent, Some(&tavern()), Instant::now()),
            Err(Rejection::AutomatedSpeaker)
        );
    }

    #[test]
    fn test_rejects_other_room_and_nowhere() {
        let agent = agent(0);
        let elsewhere = Stimulus::new("player#1", "hello", Some(Location::named("street")));
        assert_eq!(
            StimulusGate::admit(&elsewhere, &agent, Some(&tavern()), Instant::now()),
            Err(Rejection::LocationMismatch)
        );

        let nowhere = Stimulus::new("player#1", "hello", None);
        assert_eq!(
            StimulusGate::admit(&nowhere, &agent, Some(&tavern()), Instant::now()),
            Err(Rejection::LocationMismatch)
        );

        assert_eq!(
            StimulusGate::admit(&player_says("hello"), &agent, None, Instant::now()),
            Err(Rejection::LocationMismatch)
        );
    }

    #[test]
    fn test_rejects_during_cooldown() {
        let mut agent = agent(5);
        let start = Instant::now();
        agent.mark_responded(start);

        assert_eq!(
            StimulusGate::admit(
                &player_says("hello"),
                &agent,
                Some(&tavern()),
                start + Duration::from_secs(4)
            ),
            Err(Rejection::CoolingDown)
        );
        assert!(StimulusGate::admit(
            &player_says("hello"),
            &agent,
            Some(&tavern()),
            start + Duration::from_secs(5)
        )
        .is_ok());
    }

    #[test]
    fn test_rejects_disabled_and_empty() {
        let mut agent = agent(0);
        assert_eq!(
            StimulusGate::admit(&player_says("   "), &agent, Some(&tavern()), Instant::now()),
            Err(Rejection::EmptyText)
        );

        agent.set_enabled(false);
        assert_eq!(
            StimulusGate::admit(&player_says("hello"), &agent, Some(&tavern()), Instant::now()),
            Err(Rejection::Disabled)
        );
    }
}
