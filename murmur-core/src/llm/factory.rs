//! Factory for creating LLM providers from configuration

use crate::config::{LLMProvider as LLMProviderType, LLMProviderConfig};
use crate::error::Result;
use crate::llm::LLMProvider;
use std::sync::Arc;

#[cfg(feature = "llm-openai")]
use crate::llm::providers::openai::OpenAIProvider;

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration.
    ///
    /// Returns `Ok(None)` when no credential is available: the engine then runs
    /// with generation disabled rather than failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unavailable in this build or its
    /// HTTP client cannot be constructed.
    pub fn create(config: &LLMProviderConfig) -> Result<Option<Arc<dyn LLMProvider>>> {
        match config.provider {
            #[cfg(feature = "llm-openai")]
            LLMProviderType::OpenAI => {
                let Some(api_key) = resolve_credential(
                    config.api_key.as_deref(),
                    std::env::var("OPENAI_API_KEY").ok(),
                ) else {
                    tracing::warn!("OPENAI_API_KEY not found; NPC dialogue generation is disabled");
                    return Ok(None);
                };

                let mut provider = OpenAIProvider::new(api_key, config.model.clone())
                    .with_timeout(config.timeout)?;

                if let Some(base_url) = config
                    .base_url
                    .clone()
                    .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
                {
                    provider = provider.with_base_url(base_url);
                }

                tracing::info!(model = %config.model, "OpenAI provider configured");
                Ok(Some(Arc::new(provider)))
            }

            #[cfg(not(feature = "llm-openai"))]
            LLMProviderType::OpenAI => Err(crate::error::MurmurError::Configuration(
                "OpenAI provider requires 'llm-openai' feature".to_string(),
            )),
        }
    }

    /// Create from `MurmurConfig::llm`, using OpenAI defaults when the section is absent.
    pub fn from_config(config: Option<&LLMProviderConfig>) -> Result<Option<Arc<dyn LLMProvider>>> {
        match config {
            Some(cfg) => Self::create(cfg),
            None => Self::create(&LLMProviderConfig::default()),
        }
    }
}

/// Pick the configured key, falling back to the environment. Blank keys count as absent.
#[cfg_attr(not(feature = "llm-openai"), allow(dead_code))]
fn resolve_credential(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .map(str::to_string)
        .or(from_env)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}
