//! Asynchronous boundary to the generative backend
//!
//! [`CompletionClient::submit`] never waits on the backend. The call runs on a
//! spawned worker task and its outcome is delivered exactly once over a
//! single-consumer channel, to be applied by the simulation loop.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::error::MurmurError;
use crate::llm::LLMProvider;
use crate::prompt::CompletionRequest;
use crate::stimulus::AgentRef;

/// Identifier of one submitted request
pub type RequestId = Uuid;

/// Terminal result of a request: completion text or the backend fault
pub type CompletionResult = std::result::Result<String, MurmurError>;

/// A resolved request, marshalled back to the simulation loop
#[derive(Debug)]
pub struct CompletionOutcome {
    pub request_id: RequestId,
    pub agent: AgentRef,
    pub result: CompletionResult,
}

/// Handle to a submitted request
#[derive(Debug)]
pub struct PendingCompletion {
    pub id: RequestId,
    abort: AbortHandle,
}

impl PendingCompletion {
    /// Cancel the backend call. No outcome is delivered once the worker is aborted.
    pub fn cancel(&self) {
        self.abort.abort();
    }
}

/// Submits completion requests on behalf of agents
#[derive(Clone)]
pub struct CompletionClient {
    provider: Option<Arc<dyn LLMProvider>>,
    outcomes: mpsc::Sender<CompletionOutcome>,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("enabled", &self.is_enabled())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl CompletionClient {
    /// Create a client. With `provider == None` every submission resolves to empty text.
    pub fn new(
        provider: Option<Arc<dyn LLMProvider>>,
        outcomes: mpsc::Sender<CompletionOutcome>,
    ) -> Self {
        Self {
            provider,
            outcomes,
            max_tokens: 150,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature.map(|t| t.clamp(0.0, 2.0));
        self
    }

    /// Whether a backend credential was configured
    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Submit `request` for `agent`. Must be called from within a tokio runtime.
    pub fn submit(&self, agent: AgentRef, request: CompletionRequest) -> PendingCompletion {
        let id = Uuid::new_v4();
        let outcomes = self.outcomes.clone();
        let provider = self.provider.clone();
        let llm_request = request.to_llm_request(self.max_tokens, self.temperature);

        let handle = tokio::spawn(async move {
            let result = match provider {
                None => Ok(String::new()),
                Some(provider) => match provider.generate_request(&llm_request).await {
                    Ok(response) => {
                        if let Some(usage) = &response.usage {
                            tracing::debug!(
                                agent = %agent,
                                request_id = %id,
                                prompt_tokens = usage.prompt_tokens,
                                completion_tokens = usage.completion_tokens,
                                total_tokens = usage.total_tokens,
                                "Completion received"
                            );
                        }
                        Ok(response.content.trim().to_string())
                    }
                    Err(e) => {
                        tracing::warn!(
                            agent = %agent,
                            request_id = %id,
                            error = %e,
                            "Backend request failed"
                        );
                        Err(e)
                    }
                },
            };

            let outcome = CompletionOutcome {
                request_id: id,
                agent,
                result,
            };
            if outcomes.send(outcome).await.is_err() {
                tracing::debug!(request_id = %id, "Simulation loop gone; dropping completion");
            }
        });

        PendingCompletion {
            id,
            abort: handle.abort_handle(),
        }
    }
}
