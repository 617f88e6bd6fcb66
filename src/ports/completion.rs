use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Authentication error: {0}")]
    Authentication(String),
}

impl CompletionError {
    /// Authentication and client errors will not succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Network(_)
            | CompletionError::RateLimited(_)
            | CompletionError::Malformed(_) => true,
            CompletionError::Api { status, .. } => *status >= 500,
            CompletionError::Authentication(_) => false,
        }
    }
}

/// AI text-completion provider: prompt in, free text out
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError>;
}
