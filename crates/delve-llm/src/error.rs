//! Error types for the LLM-call adapter
//!
//! The orchestration core distinguishes exactly one special category,
//! "context/length-limit exceeded". Every other variant is handled as a
//! generic (possibly transient) failure.

/// LLM-call failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Provider throttled the request
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Input exceeded the model's maximum context size
    #[error("context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// Credentials rejected by the provider
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// No API key could be resolved for the model
    #[error("no API key configured for model {0}")]
    MissingApiKey(String),

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status not covered above
    #[error("provider returned HTTP {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Structured output did not match the requested schema
    #[error("failed to decode structured output: {0}")]
    Decode(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Check if this is the context/length-limit category
    #[inline]
    #[must_use]
    pub fn is_length_limit(&self) -> bool {
        matches!(self, Self::ContextLengthExceeded(_))
    }

    /// Check if a blind retry can succeed
    ///
    /// Length-limit errors are deterministic for a given input and are left to
    /// the owning stage's truncation policy.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::ContextLengthExceeded(_) | Self::Authentication(_) | Self::MissingApiKey(_)
        )
    }
}

/// Result alias for LLM calls
pub type LlmResult<T> = Result<T, LlmError>;
