//! LLM client port for language-model completions.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed future type alias used by [`LlmClient`] to keep the trait dyn-compatible.
pub type LlmFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, GatewayError>> + Send + 'a>>;

/// A request to generate a completion from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model identifier (e.g. `"claude-sonnet-4-20250514"`).
    pub model: String,
    /// System prompt framing the task.
    pub system: String,
    /// The user content to send.
    pub prompt: String,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Caller-assigned label identifying the call site (e.g. `"code:app/models.py"`).
    ///
    /// Not sent to the model. Replay matches on it so concurrent calls stay
    /// deterministic.
    #[serde(default)]
    pub tag: String,
}

/// The response from an LLM completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text.
    pub text: String,
    /// Number of prompt tokens consumed.
    pub prompt_tokens: u32,
    /// Number of completion tokens generated.
    pub completion_tokens: u32,
}

/// A failed completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum GatewayError {
    /// Rate limit, timeout, 5xx or network failure; worth retrying.
    #[error("transient: {0}")]
    Transient(String),
    /// Authentication failure or malformed request; retrying cannot help.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl GatewayError {
    /// Returns `true` if the call may succeed when repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classifies an HTTP status returned by a provider.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = format!("HTTP {status}: {}", message.into());
        if status == 408 || status == 409 || status == 429 || status >= 500 {
            Self::Transient(message)
        } else {
            Self::Fatal(message)
        }
    }
}

/// Sends completion requests to a language model.
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given request.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transient`] for failures worth retrying and
    /// [`GatewayError::Fatal`] otherwise.
    fn complete(&self, request: &CompletionRequest) -> LlmFuture<'_>;
}

#[cfg(test)]
mod tests {
    use super::GatewayError;

    #[test]
    fn classifies_status_codes() {
        assert!(GatewayError::from_status(429, "slow down").is_retryable());
        assert!(GatewayError::from_status(503, "overloaded").is_retryable());
        assert!(GatewayError::from_status(529, "overloaded").is_retryable());
        assert!(!GatewayError::from_status(401, "bad key").is_retryable());
        assert!(!GatewayError::from_status(400, "bad request").is_retryable());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(GatewayError::Transient("timeout".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "transient", "message": "timeout"}));
    }
}
