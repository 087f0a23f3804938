//! Self-healing configuration

use crate::error::HealError;
use delve_llm::ModelSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder replaced with the target path in command templates
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Self-healing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Patch attempts before giving up
    pub max_retries: u32,
    /// Hard timeout for one execution
    pub timeout_secs: u64,
    /// Working directory for executed commands
    pub work_dir: PathBuf,
    /// Command run when no test command is given
    pub compile_command: String,
    /// Framework named in test-generation prompts
    pub test_framework: String,
    /// Command that runs generated tests
    pub test_command: String,
    /// Model used for patches and tests
    pub model: ModelSettings,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_secs: 30,
            work_dir: PathBuf::from("."),
            compile_command: "python -m py_compile {file}".to_string(),
            test_framework: "pytest".to_string(),
            test_command: "pytest {file} -v".to_string(),
            model: ModelSettings::new("openai:gpt-4.1", 8_192),
        }
    }
}

impl HealConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With retry cap
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// With working directory
    #[inline]
    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: ModelSettings) -> Self {
        self.model = model;
        self
    }

    /// Execution timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Compile command for `file`
    #[must_use]
    pub fn compile_command_for(&self, file: &Path) -> String {
        render_command(&self.compile_command, file)
    }

    /// Test command for `file`
    #[must_use]
    pub fn test_command_for(&self, file: &Path) -> String {
        render_command(&self.test_command, file)
    }

    /// Parse from a TOML document
    ///
    /// # Errors
    /// `HealError::Config` on malformed TOML or zero caps.
    pub fn from_toml_str(text: &str) -> Result<Self, HealError> {
        let config: Self = toml::from_str(text).map_err(|e| HealError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `HealError::Io` if the file cannot be read, else as
    /// [`HealConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HealError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| HealError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject zero caps
    ///
    /// # Errors
    /// `HealError::Config` naming the offending field.
    pub fn validate(&self) -> Result<(), HealError> {
        if self.max_retries == 0 {
            return Err(HealError::Config("max_retries must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(HealError::Config("timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}

/// Substitute the `{file}` placeholder
#[must_use]
pub fn render_command(template: &str, file: &Path) -> String {
    template.replace(FILE_PLACEHOLDER, &file.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HealConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(
            config.compile_command_for(Path::new("src/app.py")),
            "python -m py_compile src/app.py"
        );
        assert_eq!(
            config.test_command_for(Path::new("test_app.py")),
            "pytest test_app.py -v"
        );
    }

    #[test]
    fn toml_overrides() {
        let config = HealConfig::from_toml_str(
            r#"
            max_retries = 5
            compile_command = "node --check {file}"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(
            config.compile_command_for(Path::new("a.js")),
            "node --check a.js"
        );
    }

    #[test]
    fn zero_retries_rejected() {
        assert!(HealConfig::from_toml_str("max_retries = 0").is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = HealConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, HealError::Io { .. }));
    }
}
