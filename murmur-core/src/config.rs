//! Configuration types for the Murmur engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::agent::AgentSettings;
use crate::error::{MurmurError, Result};
use crate::prompt::PromptConfig;
use crate::scheduler::MAX_INTERVAL;

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Main configuration for the Murmur engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MurmurConfig {
    /// Generative backend configuration (optional; OpenAI defaults apply when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LLMProviderConfig>,

    /// Settings applied to newly spawned agents
    pub agent: AgentSettings,

    /// Prompt wording and directive tokens
    pub prompts: PromptConfig,

    /// Simulation runtime settings
    pub runtime: RuntimeConfig,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMProvider,

    /// Model name
    pub model: String,

    /// API key (prefer `OPENAI_API_KEY`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL for compatible endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Upper bound on a single backend call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for LLMProviderConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    #[default]
    OpenAI,
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the simulation event channel
    pub event_buffer: usize,

    /// `max_tokens` sent with every completion request
    pub max_output_tokens: usize,

    /// Sampling temperature (backend default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Line privately shown to the speaker when the backend fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_line: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer: 256,
            max_output_tokens: 150,
            temperature: None,
            fallback_line: None,
        }
    }
}

impl MurmurConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `murmur.toml` in the working directory
    /// 3. File named by `MURMUR_CONFIG_PATH`
    /// 4. `MURMUR_`-prefixed environment variables (`__` separates nested keys)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Toml},
        };

        let mut figment = Figment::new().merge(Toml::file("murmur.toml"));

        if let Ok(path) = std::env::var("MURMUR_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: MurmurConfig = figment
            .merge(Env::prefixed("MURMUR_").split("__"))
            .extract()
            .map_err(|e| {
                MurmurError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Toml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(MurmurError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: MurmurConfig = Figment::new().merge(Toml::file(path)).extract().map_err(|e| {
            MurmurError::Configuration(format!("Failed to load configuration file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.agent.memory_size == 0 {
            return Err(MurmurError::Configuration(
                "agent.memory_size must be greater than zero".to_string(),
            ));
        }
        if self.agent.ambient_interval_secs > MAX_INTERVAL.as_secs() {
            return Err(MurmurError::Configuration(format!(
                "agent.ambient_interval_secs must be at most {}",
                MAX_INTERVAL.as_secs()
            )));
        }
        if self.runtime.event_buffer == 0 {
            return Err(MurmurError::Configuration(
                "runtime.event_buffer must be greater than zero".to_string(),
            ));
        }
        if self.runtime.max_output_tokens == 0 {
            return Err(MurmurError::Configuration(
                "runtime.max_output_tokens must be greater than zero".to_string(),
            ));
        }
        if self.prompts.mutation_marker.trim().is_empty() {
            return Err(MurmurError::Configuration(
                "prompts.mutation_marker must not be empty".to_string(),
            ));
        }
        if self.prompts.no_action_token.trim().is_empty() {
            return Err(MurmurError::Configuration(
                "prompts.no_action_token must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
