//! Error types for the research pipeline
//!
//! Most failures inside the pipeline are turned into text that flows back to
//! the model (tool errors, rejections, sentinel strings). The variants here
//! are the ones that stop a stage:
//! - scope-stage LLM failures
//! - missing tools for a worker
//! - worker fan-out failures (caught by the supervisor)
//! - illegal stage transitions

use crate::stage::Stage;
use delve_llm::LlmError;
use std::path::PathBuf;

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Scope resolution could not reach a decision or brief
    #[error("scope resolution failed: {0}")]
    Scope(#[source] LlmError),

    /// Worker invoked with no configured tools
    #[error("no tools configured for research worker")]
    NoTools,

    /// A delegation in the fan-out failed
    #[error("delegation dispatch failed: {0}")]
    DispatchFailed(String),

    /// Stage table forbids this hop
    #[error("invalid stage transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current stage
        from: Stage,
        /// Requested stage
        to: Stage,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Check if a user turn could unblock the pipeline
    #[inline]
    #[must_use]
    pub fn requires_new_turn(&self) -> bool {
        matches!(self, Self::Scope(LlmError::ContextLengthExceeded(_)))
    }

    /// Check if re-running the same request can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Scope(e) => e.is_retryable(),
            Self::DispatchFailed(_) => true,
            Self::NoTools | Self::InvalidTransition { .. } | Self::Config(_) => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {message}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        message: String,
    },

    /// TOML did not parse
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// Parsed but semantically invalid
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Tool invocation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// Arguments missing or of the wrong shape
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool backend failed
    #[error("{0}")]
    Failed(String),

    /// Tool exceeded its own deadline
    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// Artifact store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Key escapes the store root or is empty
    #[error("invalid artifact key: {0}")]
    InvalidKey(String),

    /// Filesystem failure
    #[error("artifact store I/O error: {0}")]
    Io(#[from] std::io::Error),
}
