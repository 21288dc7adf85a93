//! Error types for Murmur operations

/// Result type for Murmur operations
pub type Result<T> = std::result::Result<T, MurmurError>;

/// Error types for the Murmur engine
#[derive(Debug, thiserror::Error)]
pub enum MurmurError {
    /// Agent not found
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// An agent with the same reference is already spawned
    #[error("Agent already exists: {0}")]
    DuplicateAgent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generative backend error (transport or API)
    #[error("Backend error: {0}")]
    Backend(String),

    /// The runtime event loop has stopped
    #[error("Runtime is no longer running")]
    RuntimeClosed,

}

impl From<figment::Error> for MurmurError {
    fn from(err: figment::Error) -> Self {
        MurmurError::Configuration(err.to_string())
    }
}
