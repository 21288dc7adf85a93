//! Murmur CLI - talk to a single NPC in a one-room world

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use murmur_core::prelude::*;

const PLAYER_ID: &str = "player#1";
const NPC_ID: &str = "npc#1";

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Murmur NPC dialogue engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to murmur.toml and MURMUR_* variables)
    #[arg(short, long, global = true, env = "MURMUR_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with an NPC standing in the same room
    Chat(ChatArgs),
    /// Print the effective configuration as JSON
    Config,
    /// Version information
    Version,
}

#[derive(Args)]
struct ChatArgs {
    /// NPC display name
    #[arg(short, long, default_value = "Mira")]
    name: String,

    /// Your display name
    #[arg(long, default_value = "Traveller")]
    player: String,

    /// Persona instructions (overrides configuration)
    #[arg(short, long)]
    persona: Option<String>,

    /// Autonomy tier: low or high
    #[arg(short, long)]
    autonomy: Option<AutonomyTier>,

    /// Seconds between ambient ticks (0 disables)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Minimum seconds between responses
    #[arg(long)]
    cooldown: Option<u64>,

    /// Allow the NPC to rewrite its own persona
    #[arg(short, long)]
    mutation: bool,

    /// Room the conversation happens in
    #[arg(long, default_value = "the Gilded Lantern")]
    room: String,
}

/// One room holding the player and the NPC. NPC commands are narrated to stdout.
struct ToyWorld {
    npc_name: String,
    room: Location,
}

impl ToyWorld {
    fn narrate(&self, command: &str) -> String {
        if let Some(pose) = command.strip_prefix(':') {
            let pose = pose.trim_start();
            // Possessive poses attach to the name: ":'s eyes narrow"
            return if pose.starts_with('\'') {
                format!("{}{}", self.npc_name, pose)
            } else {
                format!("{} {}", self.npc_name, pose)
            };
        }

        let (verb, rest) = command.split_once(' ').unwrap_or((command, ""));
        match verb.to_lowercase().as_str() {
            "say" => format!("{} says, \"{}\"", self.npc_name, rest),
            "emote" => format!("{} {}", self.npc_name, rest),
            _ => format!("{} tries to: {}", self.npc_name, command),
        }
    }
}

impl World for ToyWorld {
    fn execute(
        &mut self,
        _agent: &AgentRef,
        command: &str,
    ) -> std::result::Result<(), DispatchError> {
        if command.trim().is_empty() {
            return Err(DispatchError::Rejected("empty command".to_string()));
        }
        println!("{}", self.narrate(command));
        Ok(())
    }

    fn location_of(&self, agent: &AgentRef) -> Option<Location> {
        match agent.as_str() {
            PLAYER_ID | NPC_ID => Some(self.room.clone()),
            _ => None,
        }
    }

    fn tell(&mut self, _recipient: &AgentRef, text: &str) {
        println!("[{}]", text);
    }
}

fn load_config(path: Option<&Path>) -> Result<MurmurConfig> {
    let config = match path {
        Some(path) => MurmurConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MurmurConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

async fn chat(config: MurmurConfig, args: ChatArgs) -> Result<()> {
    let mut settings = config.agent.clone();
    if let Some(persona) = args.persona {
        settings.persona.base_instructions = persona;
    }
    if let Some(tier) = args.autonomy {
        settings.persona.autonomy_tier = tier;
    }
    if let Some(interval) = args.interval {
        settings.ambient_interval_secs = interval;
    }
    if let Some(cooldown) = args.cooldown {
        settings.cooldown_secs = cooldown;
    }
    if args.mutation {
        settings.persona.mutation_enabled = true;
    }

    let world = ToyWorld {
        npc_name: args.name.clone(),
        room: Location::new("room#1", args.room.clone()),
    };
    let room = world.room.clone();

    let (runtime, handle) = Runtime::from_config(&config, world)?;
    let runtime_task = tokio::spawn(runtime.run());

    let agent = Agent::builder().id(NPC_ID).settings(settings).build()?;
    handle.spawn_agent(agent).await?;
    tracing::debug!(npc = %args.name, room = %room.name, "Chat session started");

    println!(
        "You are in {}. {} is here. Type to talk; /snapshot, /toggle or /quit.",
        room.name, args.name
    );

    let mut enabled = true;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/snapshot" => {
                let snapshot = handle.snapshot(NPC_ID).await?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            "/toggle" => {
                enabled = !enabled;
                handle.set_enabled(NPC_ID, enabled).await?;
                let mood = if enabled { "attentive" } else { "ignoring you" };
                println!("[{} is now {}]", args.name, mood);
            }
            text => {
                let stimulus = Stimulus::new(PLAYER_ID, text, Some(room.clone()))
                    .with_speaker_name(args.player.clone());
                handle.deliver(NPC_ID, stimulus).await?;
            }
        }
    }

    handle.shutdown().await?;
    runtime_task.await.context("runtime task panicked")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat(args) => {
            let config = load_config(cli.config.as_deref())?;
            chat(config, args).await?;
        }
        Commands::Config => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(llm) = config.llm.as_mut()
                && llm.api_key.is_some()
            {
                llm.api_key = Some("<redacted>".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Version => {
            println!("murmur {}", env!("CARGO_PKG_VERSION"));
            println!("murmur-core {}", murmur_core::VERSION);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> ToyWorld {
        ToyWorld {
            npc_name: "Mira".to_string(),
            room: Location::named("tavern"),
        }
    }

    #[test]
    fn test_narration() {
        let world = world();
        assert_eq!(world.narrate("say Welcome in."), "Mira says, \"Welcome in.\"");
        assert_eq!(world.narrate("emote polishes a glass"), "Mira polishes a glass");
        assert_eq!(world.narrate("Say Evening."), "Mira says, \"Evening.\"");
        assert_eq!(world.narrate(":shrugs"), "Mira shrugs");
        assert_eq!(world.narrate(":'s eyes narrow"), "Mira's eyes narrow");
        assert_eq!(world.narrate("get lantern"), "Mira tries to: get lantern");
    }

    #[test]
    fn test_only_player_and_npc_are_present() {
        let world = world();
        assert!(world.location_of(&AgentRef::new(PLAYER_ID)).is_some());
        assert!(world.location_of(&AgentRef::new("npc#2")).is_none());
    }

    #[test]
    fn test_cli_parses_chat_flags() {
        let cli = Cli::try_parse_from([
            "murmur",
            "chat",
            "--name",
            "Bram",
            "--autonomy",
            "high",
            "--interval",
            "45",
            "--mutation",
        ])
        .expect("valid arguments");

        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.name, "Bram");
                assert_eq!(args.autonomy, Some(AutonomyTier::High));
                assert_eq!(args.interval, Some(45));
                assert!(args.mutation);
            }
            _ => panic!("expected chat"),
        }
    }
}
