//! Error types for the self-healing loop

use delve_llm::LlmError;
use std::path::PathBuf;

/// Self-healing error
#[derive(Debug, thiserror::Error)]
pub enum HealError {
    /// Patch or test generation failed after adapter retries
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    /// File could not be written or read
    #[error("I/O error on {path}: {message}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        message: String,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Stage table forbids this hop
    #[error("invalid healing transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state
        from: crate::state::HealState,
        /// Requested state
        to: crate::state::HealState,
    },
}

impl HealError {
    /// Check if re-running can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Io { .. } => true,
            Self::Config(_) | Self::InvalidTransition { .. } => false,
        }
    }
}
