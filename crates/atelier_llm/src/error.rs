//! Error types for the model-call boundary.

use thiserror::Error;

/// Result type alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors surfaced by the model-call boundary.
///
/// Retryability is a property of the variant, not of message text:
/// [`LlmError::is_transient`] is what the adapter's backoff loop
/// pattern-matches on.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("Transient upstream error (status {status}): {message}")]
    Transient { status: u16, message: String },

    #[error("Provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Failed to parse provider response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Whether the boundary should retry this failure with backoff.
    ///
    /// Rate limits, gateway errors, and network failures are transient;
    /// everything else surfaces immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Network(_))
    }

    /// Classify an HTTP status into a transient or permanent API error.
    pub fn from_status(status: u16, message: String) -> Self {
        if status == 429 || (500..=599).contains(&status) {
            Self::Transient { status, message }
        } else {
            Self::Api { status, message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        assert!(LlmError::from_status(429, "rate limited".into()).is_transient());
        assert!(LlmError::from_status(502, "bad gateway".into()).is_transient());
        assert!(LlmError::from_status(503, "unavailable".into()).is_transient());
        assert!(LlmError::Network("reset".into()).is_transient());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!LlmError::from_status(400, "bad request".into()).is_transient());
        assert!(!LlmError::from_status(401, "unauthorized".into()).is_transient());
        assert!(!LlmError::NotConfigured.is_transient());
        assert!(!LlmError::EmptyResponse.is_transient());
    }
}
