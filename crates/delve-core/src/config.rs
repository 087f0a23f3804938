//! Research pipeline configuration
//!
//! Every field has a default, so a partial TOML table is enough:
//!
//! ```toml
//! allow_clarification = false
//! max_concurrent_research_units = 3
//!
//! [research_model]
//! model = "openai:gpt-4.1-mini"
//! max_tokens = 8000
//! ```

use crate::error::ConfigError;
use delve_llm::ModelSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`ResearchConfig::workspace_root`]
pub const WORKSPACE_ROOT_VAR: &str = "WORKSPACE_ROOT";

/// Model identifier plus output cap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `provider:model` identifier
    pub model: String,
    /// Output token cap
    pub max_tokens: u32,
    /// Explicit API key (falls back to the provider env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ModelConfig {
    /// Create model config
    #[inline]
    #[must_use]
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            api_key: None,
        }
    }

    /// Settings passed to the LLM client
    #[must_use]
    pub fn settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            api_key: self.api_key.clone(),
        }
    }
}

/// Deep-research configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Ask the user a clarifying question before planning
    pub allow_clarification: bool,
    /// Attempts for structured-output calls
    pub max_structured_output_retries: u32,
    /// Delegations admitted per supervisor round
    pub max_concurrent_research_units: usize,
    /// Supervisor planning iterations
    pub max_researcher_iterations: usize,
    /// Tool-call iterations per worker
    pub max_react_tool_calls: usize,
    /// Model for scope, planning, and workers
    pub research_model: ModelConfig,
    /// Model for worker compression
    pub compression_model: ModelConfig,
    /// Model for the final report
    pub final_report_model: ModelConfig,
    /// Extra instructions describing externally provided tools
    pub mcp_prompt: Option<String>,
    /// Root directory for persisted artifacts
    pub workspace_root: Option<PathBuf>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            allow_clarification: true,
            max_structured_output_retries: 3,
            max_concurrent_research_units: 5,
            max_researcher_iterations: 6,
            max_react_tool_calls: 10,
            research_model: ModelConfig::new("openai:gpt-4.1", 10_000),
            compression_model: ModelConfig::new("openai:gpt-4.1", 8_192),
            final_report_model: ModelConfig::new("openai:gpt-4.1", 10_000),
            mcp_prompt: None,
            workspace_root: None,
        }
    }
}

impl ResearchConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With clarification enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_clarification(mut self, allow: bool) -> Self {
        self.allow_clarification = allow;
        self
    }

    /// With concurrency cap
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_units(mut self, max: usize) -> Self {
        self.max_concurrent_research_units = max;
        self
    }

    /// With supervisor iteration cap
    #[inline]
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_researcher_iterations = max;
        self
    }

    /// With worker tool-call cap
    #[inline]
    #[must_use]
    pub fn with_max_tool_calls(mut self, max: usize) -> Self {
        self.max_react_tool_calls = max;
        self
    }

    /// Use one model for every stage
    #[must_use]
    pub fn with_model(mut self, model: &ModelConfig) -> Self {
        self.research_model = model.clone();
        self.compression_model = model.clone();
        self.final_report_model = model.clone();
        self
    }

    /// With workspace root
    #[inline]
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Parse from a TOML document
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed TOML
    /// - `ConfigError::Invalid` if a cap is zero
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and apply environment overrides
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - see [`ResearchConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::from_toml_str(&text)?.with_env_overrides())
    }

    /// Apply `WORKSPACE_ROOT` if set
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(root) = std::env::var_os(WORKSPACE_ROOT_VAR).filter(|v| !v.is_empty()) {
            self.workspace_root = Some(PathBuf::from(root));
        }
        self
    }

    /// Reject caps that would make the pipeline do nothing
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let caps = [
            ("max_structured_output_retries", self.max_structured_output_retries as usize),
            ("max_concurrent_research_units", self.max_concurrent_research_units),
            ("max_researcher_iterations", self.max_researcher_iterations),
            ("max_react_tool_calls", self.max_react_tool_calls),
        ];
        if let Some((field, _)) = caps.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{field} must be at least 1")));
        }
        for (field, model) in [
            ("research_model", &self.research_model),
            ("compression_model", &self.compression_model),
            ("final_report_model", &self.final_report_model),
        ] {
            if model.model.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field}.model is empty")));
            }
        }
        Ok(())
    }
}
