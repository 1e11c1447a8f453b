//! Text-generation backend port and its adapters.

mod lmstudio;
mod ollama;
mod stub;

pub use lmstudio::{LmStudioClient, DEFAULT_LMSTUDIO_HOST, LMSTUDIO_FALLBACK_CONTEXT_LENGTH};
pub use ollama::{known_context_length, OllamaClient, DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_MODEL};
pub use stub::StubClient;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("provider error: {0}")]
    Provider(String),
}

impl LlmError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Whether another attempt may succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Provider(_))
    }
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// A backend that turns a prompt into raw text.
///
/// Implementations do no retrying and no parsing; both belong to the caller.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Short identifier for logs
    fn name(&self) -> &str;

    /// Model context window in tokens, when known
    fn context_length(&self) -> Option<usize> {
        None
    }

    /// Generate a response, failing with [`LlmError::Timeout`] once `timeout`
    /// has elapsed
    async fn analyze(&self, prompt: &str, timeout: Duration) -> LlmResult<String>;
}
