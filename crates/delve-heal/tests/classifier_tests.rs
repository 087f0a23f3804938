//! Classifier properties.

use delve_heal::{classify, ErrorCategory};
use proptest::prelude::*;

proptest! {
    /// Whitespace-only text never matches a pattern.
    #[test]
    fn blank_text_is_unknown(text in "[ \t\n]{0,20}") {
        prop_assert_eq!(classify(&text), ErrorCategory::Unknown);
    }

    /// The classifier never emits the executor-only category.
    #[test]
    fn runtime_is_reserved(text in ".{0,200}") {
        prop_assert_ne!(classify(&text), ErrorCategory::Runtime);
    }

    /// Case does not change the verdict.
    #[test]
    fn case_insensitive(prefix in "[a-z ]{0,10}") {
        let lower = format!("{prefix}syntaxerror: bad token");
        prop_assert_eq!(classify(&lower), classify(&lower.to_uppercase()));
    }
}
