//! Execution outcomes and healing records

use serde::{Deserialize, Serialize};

/// Classified failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Parse failure
    Syntax,
    /// Missing module or symbol import
    Import,
    /// Wrong operand or argument type
    Type,
    /// Undefined name
    Name,
    /// Missing attribute
    Attribute,
    /// Test or assertion failure
    TestFailure,
    /// Timeout or other execution-level failure
    Runtime,
    /// Nothing matched
    Unknown,
}

impl ErrorCategory {
    /// Stable identifier used in prompts and reports
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax_error",
            Self::Import => "import_error",
            Self::Type => "type_error",
            Self::Name => "name_error",
            Self::Attribute => "attribute_error",
            Self::TestFailure => "test_failure",
            Self::Runtime => "runtime_error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running or testing a piece of code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Exit status was zero
    pub success: bool,
    /// Captured stdout
    pub stdout: String,
    /// Error text (stderr on failure)
    pub error: Option<String>,
    /// Category of `error`; `None` on success
    pub category: Option<ErrorCategory>,
    /// Process exit code, `-1` if the process did not finish
    pub exit_code: i32,
}

impl ExecutionOutcome {
    /// Successful run
    #[must_use]
    pub fn passed(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            error: None,
            category: None,
            exit_code: 0,
        }
    }

    /// Failed run
    #[must_use]
    pub fn failed(error: impl Into<String>, category: ErrorCategory, exit_code: i32) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            error: Some(error.into()),
            category: Some(category),
            exit_code,
        }
    }

    /// With captured stdout
    #[inline]
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Error text, empty on success
    #[must_use]
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    /// Category, `Unknown` if unset
    #[must_use]
    pub fn category_or_unknown(&self) -> ErrorCategory {
        self.category.unwrap_or(ErrorCategory::Unknown)
    }
}

/// One pass through the patch step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealingRecord {
    /// 1-based attempt number
    pub attempt: u32,
    /// Error text that triggered the patch
    pub error: String,
    /// Category of that error
    pub category: ErrorCategory,
    /// Code returned by the model
    pub patch: String,
    /// Result of executing the patch
    pub outcome: ExecutionOutcome,
}

/// Result of a healing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealingReport {
    /// Last execution succeeded
    pub success: bool,
    /// Last code version
    pub final_code: String,
    /// Patch attempts made
    pub attempts: u32,
    /// Every patch attempt, in order
    pub history: Vec<HealingRecord>,
    /// Human-readable summary
    pub message: String,
    /// Error text of the last failed execution
    pub last_error: Option<String>,
}

/// Result of heal, generate tests, run tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactorReport {
    /// Healing succeeded
    pub success: bool,
    /// Healed code
    pub code: String,
    /// Generated test code, if healing succeeded
    pub tests: Option<String>,
    /// Where the tests were written
    pub test_file: Option<String>,
    /// Generated tests passed
    pub test_passed: bool,
    /// Patch attempts used by healing
    pub healing_attempts: u32,
    /// Full healing report
    pub healing: HealingReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_identifiers() {
        assert_eq!(ErrorCategory::TestFailure.as_str(), "test_failure");
        assert_eq!(ErrorCategory::Runtime.to_string(), "runtime_error");
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::TestFailure).unwrap();
        assert_eq!(json, "\"test_failure\"");
    }

    #[test]
    fn failed_outcome_accessors() {
        let outcome = ExecutionOutcome::failed("boom", ErrorCategory::Type, 1).with_stdout("out");
        assert!(!outcome.success);
        assert_eq!(outcome.error_text(), "boom");
        assert_eq!(outcome.stdout, "out");
        assert_eq!(ExecutionOutcome::passed("").category_or_unknown(), ErrorCategory::Unknown);
    }
}
