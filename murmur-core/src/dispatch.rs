//! The world's command interface and action dispatch
//!
//! The engine never touches world state directly. Every interpreted line is
//! issued through [`World::execute`] exactly as a player command would be, so
//! in-world effects are the world's business.

use crate::interpret::ActionLine;
use crate::stimulus::{AgentRef, Location};

/// Failure to issue a command on behalf of an agent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The world refused the command
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The agent no longer exists in the world
    #[error("agent {0} no longer exists")]
    AgentGone(AgentRef),

    /// The agent exists but is nowhere
    #[error("agent {0} has no location")]
    NoLocation(AgentRef),
}

/// Host world an agent lives in
pub trait World: Send + 'static {
    /// Issue `command` as if `agent` had typed it.
    fn execute(&mut self, agent: &AgentRef, command: &str) -> Result<(), DispatchError>;

    /// Current location of `agent`, or `None` if it is nowhere or gone
    fn location_of(&self, agent: &AgentRef) -> Option<Location>;

    /// Show a private line to a single object.
    fn tell(&mut self, recipient: &AgentRef, text: &str) {
        let _ = (recipient, text);
    }
}

/// Counts from one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatched: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Issues interpreted action lines through the world
pub struct ActionDispatcher;

impl ActionDispatcher {
    /// Issue one line for `agent`. `Wait` issues nothing and returns `Ok(false)`.
    pub fn dispatch<W: World + ?Sized>(
        world: &mut W,
        agent: &AgentRef,
        line: &ActionLine,
    ) -> Result<bool, DispatchError> {
        let Some(command) = line.to_command() else {
            return Ok(false);
        };

        if world.location_of(agent).is_none() {
            return Err(DispatchError::NoLocation(agent.clone()));
        }

        world.execute(agent, command)?;
        Ok(true)
    }

    /// Issue `lines` in order. A failed line is logged and the rest still run.
    pub fn dispatch_all<W: World + ?Sized>(
        world: &mut W,
        agent: &AgentRef,
        lines: &[ActionLine],
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for line in lines {
            match Self::dispatch(world, agent, line) {
                Ok(true) => report.dispatched += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(
                        agent = %agent,
                        line = ?line,
                        error = %e,
                        "Action dispatch failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Room {
        occupants: HashMap<AgentRef, Location>,
        log: Vec<(AgentRef, String)>,
        refuse: Vec<String>,
    }

    impl World for Room {
        fn execute(&mut self, agent: &AgentRef, command: &str) -> Result<(), DispatchError> {
            if self.refuse.iter().any(|r| r == command) {
                return Err(DispatchError::Rejected(format!("unknown command '{}'", command)));
            }
            self.log.push((agent.clone(), command.to_string()));
            Ok(())
        }

        fn location_of(&self, agent: &AgentRef) -> Option<Location> {
            self.occupants.get(agent).cloned()
        }
    }

    fn room_with(agent: &str) -> Room {
        let mut room = Room::default();
        room.occupants
            .insert(AgentRef::new(agent), Location::named("tavern"));
        room
    }

    #[test]
    fn test_dispatch_renders_commands() {
        let mut room = room_with("npc#1");
        let agent = AgentRef::new("npc#1");

        let report = ActionDispatcher::dispatch_all(
            &mut room,
            &agent,
            &[
                ActionLine::Speech("say Hello".to_string()),
                ActionLine::Wait,
                ActionLine::Emote("emote bows".to_string()),
                ActionLine::RawCommand("get mug".to_string()),
            ],
        );

        assert_eq!(
            report,
            DispatchReport {
                dispatched: 3,
                skipped: 1,
                failed: 0
            }
        );
        let commands: Vec<&str> = room.log.iter().map(|(_, c)| c.as_str()).collect();
        assert_eq!(commands, vec!["say Hello", "emote bows", "get mug"]);
    }

    #[test]
    fn test_failure_does_not_stop_remaining_lines() {
        let mut room = room_with("npc#1");
        room.refuse.push("fly away".to_string());

        let report = ActionDispatcher::dispatch_all(
            &mut room,
            &AgentRef::new("npc#1"),
            &[
                ActionLine::RawCommand("fly away".to_string()),
                ActionLine::Speech("say Never mind.".to_string()),
            ],
        );

        assert_eq!(report.failed, 1);
        assert_eq!(report.dispatched, 1);
        assert_eq!(room.log.len(), 1);
    }

    #[test]
    fn test_agent_without_location_dispatches_nothing() {
        let mut room = Room::default();
        let agent = AgentRef::new("npc#1");

        let line = ActionLine::Speech("say Hi".to_string());
        let result = ActionDispatcher::dispatch(&mut room, &agent, &line);
        assert_eq!(result, Err(DispatchError::NoLocation(agent)));
        assert!(room.log.is_empty());
    }
}
