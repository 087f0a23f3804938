//! Application configuration file
//!
//! One TOML document with `[llm]`, `[research]` and `[heal]` tables. Every
//! table and field is optional.

use anyhow::{Context, Result};
use delve_core::ResearchConfig;
use delve_heal::HealConfig;
use delve_llm::{LlmClient, OpenAiCompatModel, RetryPolicy, OPENAI_API_URL};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// `[llm]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct LlmSection {
    /// Chat-completions endpoint
    pub(crate) base_url: String,
    /// Attempts per call; defaults to the research structured-output retries
    pub(crate) retry_attempts: Option<u32>,
    /// Initial backoff between attempts
    pub(crate) retry_backoff_ms: u64,
    /// HTTP request timeout
    pub(crate) timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: OPENAI_API_URL.to_string(),
            retry_attempts: None,
            retry_backoff_ms: 500,
            timeout_secs: 120,
        }
    }
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) llm: LlmSection,
    pub(crate) research: ResearchConfig,
    pub(crate) heal: HealConfig,
}

impl AppConfig {
    /// Parse and validate a TOML document
    pub(crate) fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("failed to parse configuration")?;
        config.research.validate()?;
        config.heal.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else defaults; environment overrides apply
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        Ok(Self {
            research: config.research.with_env_overrides(),
            ..config
        })
    }

    /// Retry policy for the shared client
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        let attempts = self
            .llm
            .retry_attempts
            .unwrap_or(self.research.max_structured_output_retries);
        RetryPolicy::new(attempts, Duration::from_millis(self.llm.retry_backoff_ms))
    }

    /// Build the process-wide client
    pub(crate) fn client(&self) -> Result<LlmClient> {
        let model = OpenAiCompatModel::new(
            self.llm.base_url.clone(),
            Duration::from_secs(self.llm.timeout_secs),
        )
        .context("failed to build HTTP client")?;
        Ok(LlmClient::new(Arc::new(model)).with_retry(self.retry_policy()))
    }
}
