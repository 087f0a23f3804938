//! Prompt templates for patching and test generation

use crate::outcome::ErrorCategory;

/// System prompt for patch generation
pub const PATCH_SYSTEM: &str = "You are an expert Python developer specializing in debugging \
and fixing code. Analyze the error and return a corrected version of the code that resolves it \
while preserving the original intent. Return ONLY the corrected code, with no explanations and \
no markdown formatting.";

/// System prompt for unit test generation
pub const TESTS_SYSTEM: &str = "You are an expert test engineer. Write comprehensive unit tests \
covering normal behaviour, edge cases and error handling. Return ONLY the test code, with no \
explanations and no markdown formatting.";

/// Placeholder used when no documentation accompanies a patch request
pub const NO_DOCS: &str = "No additional documentation provided";

/// User prompt for one patch attempt
#[must_use]
pub fn patch_request(
    code: &str,
    category: ErrorCategory,
    error: &str,
    attempt: u32,
    max_attempts: u32,
    docs: Option<&str>,
) -> String {
    let docs = docs.filter(|d| !d.trim().is_empty()).unwrap_or(NO_DOCS);
    format!(
        "## Original Code\n```python\n{code}\n```\n\n\
         ## Error Type\n{category}\n\n\
         ## Error Log\n```\n{error}\n```\n\n\
         ## Attempt Number\n{attempt} of {max_attempts}\n\n\
         ## Related Documentation\n{docs}\n\n\
         Return the fixed code."
    )
}

/// User prompt for test generation
#[must_use]
pub fn tests_request(code: &str, file_path: &str, framework: &str) -> String {
    format!(
        "Generate {framework} unit tests for the code in `{file_path}`.\n\n\
         ```python\n{code}\n```\n\n\
         Import the module under test by its file name and cover every public function."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_request_sections() {
        let prompt = patch_request("x = 1", ErrorCategory::Syntax, "bad", 2, 3, None);
        for section in [
            "## Original Code",
            "## Error Type\nsyntax_error",
            "## Error Log",
            "## Attempt Number\n2 of 3",
            "## Related Documentation\nNo additional documentation provided",
        ] {
            assert!(prompt.contains(section), "missing {section}");
        }
    }

    #[test]
    fn docs_are_included_when_present() {
        let prompt = patch_request("x", ErrorCategory::Unknown, "e", 1, 3, Some("use foo()"));
        assert!(prompt.contains("use foo()"));
        assert!(!prompt.contains(NO_DOCS));
    }

    #[test]
    fn tests_request_names_framework() {
        let prompt = tests_request("def f(): pass", "calc.py", "pytest");
        assert!(prompt.contains("pytest"));
        assert!(prompt.contains("calc.py"));
    }
}
