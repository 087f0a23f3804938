//! Error classification
//!
//! Ordered pattern table, matched case-insensitively against error text.
//! First match wins; `Unknown` is the fallback. `Runtime` is never produced
//! here, only by the executor for timeouts.

use crate::outcome::ErrorCategory;
use once_cell::sync::Lazy;
use regex::Regex;

static PATTERNS: Lazy<Vec<(ErrorCategory, Regex)>> = Lazy::new(|| {
    [
        (ErrorCategory::Syntax, r"syntaxerror|invalid syntax"),
        (
            ErrorCategory::Import,
            r"importerror|modulenotfounderror|no module named",
        ),
        (ErrorCategory::Type, r"typeerror"),
        (ErrorCategory::Name, r"nameerror|name .* is not defined"),
        (ErrorCategory::Attribute, r"attributeerror"),
        (ErrorCategory::TestFailure, r"failed|assertion|assertionerror"),
    ]
    .into_iter()
    .filter_map(|(category, pattern)| {
        Regex::new(&format!("(?i){pattern}"))
            .ok()
            .map(|re| (category, re))
    })
    .collect()
});

/// Classify error text into exactly one category
#[must_use]
pub fn classify(error: &str) -> ErrorCategory {
    if error.trim().is_empty() {
        return ErrorCategory::Unknown;
    }
    PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(error))
        .map_or(ErrorCategory::Unknown, |(category, _)| *category)
}
