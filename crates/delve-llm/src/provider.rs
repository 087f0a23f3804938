//! Provider tables
//!
//! Model identifiers are `provider:model` strings (`openai:gpt-4.1`).
//! This module maps them to:
//! - the per-provider length-error pattern table
//! - the maximum context size (tokens), when known
//! - the environment variable holding the API key

/// Known providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// OpenAI (and compatible endpoints)
    OpenAi,
    /// Anthropic
    Anthropic,
    /// Google Gemini
    Google,
    /// OpenRouter
    OpenRouter,
    /// Anything else
    Unknown,
}

impl Provider {
    /// Detect provider from a model identifier
    #[must_use]
    pub fn detect(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        let prefix = model.split(':').next().unwrap_or_default();
        match prefix {
            "openai" => Provider::OpenAi,
            "anthropic" => Provider::Anthropic,
            "google" | "google_genai" | "gemini" => Provider::Google,
            "openrouter" => Provider::OpenRouter,
            _ if ["gpt-", "o1", "o3", "o4"].iter().any(|p| model.starts_with(p)) => {
                Provider::OpenAi
            }
            _ if model.starts_with("claude") => Provider::Anthropic,
            _ if model.starts_with("gemini") => Provider::Google,
            _ => Provider::Unknown,
        }
    }

    /// Lowercase substrings that identify a length-limit error
    #[must_use]
    pub fn length_error_patterns(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi | Provider::OpenRouter => &[
                "context_length_exceeded",
                "maximum context length",
                "reduce the length",
                "too many tokens",
            ],
            Provider::Anthropic => &["prompt is too long", "input length and `max_tokens` exceed"],
            Provider::Google => &[
                "resource_exhausted",
                "exceeds the maximum number of tokens",
                "input token count",
            ],
            Provider::Unknown => &[],
        }
    }

    /// Environment variable holding this provider's API key
    #[must_use]
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Google => Some("GOOGLE_API_KEY"),
            Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
            Provider::Unknown => None,
        }
    }
}

const GENERIC_LENGTH_PATTERNS: &[&str] = &[
    "context length",
    "context window",
    "token limit",
    "prompt is too long",
    "maximum context",
];

/// Check whether an error message reports a context/length-limit failure
#[must_use]
pub fn is_length_error(model: &str, message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    let provider = Provider::detect(model);
    provider
        .length_error_patterns()
        .iter()
        .chain(GENERIC_LENGTH_PATTERNS)
        .any(|pattern| message.contains(pattern))
}

/// Maximum input tokens per model family, most specific first
const MODEL_TOKEN_LIMITS: &[(&str, usize)] = &[
    ("gpt-4.1-mini", 1_047_576),
    ("gpt-4.1-nano", 1_047_576),
    ("gpt-4.1", 1_047_576),
    ("gpt-4o-mini", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4-turbo", 128_000),
    ("o4-mini", 200_000),
    ("o3-mini", 200_000),
    ("o3-pro", 200_000),
    ("o3", 200_000),
    ("o1-pro", 200_000),
    ("o1", 200_000),
    ("claude-opus-4", 200_000),
    ("claude-sonnet-4", 200_000),
    ("claude-3-7-sonnet", 200_000),
    ("claude-3-5-sonnet", 200_000),
    ("claude-3-5-haiku", 200_000),
    ("gemini-1.5-pro", 2_097_152),
    ("gemini-1.5-flash", 1_048_576),
    ("gemini-2.5-pro", 1_048_576),
    ("gemini-2.5-flash", 1_048_576),
    ("gemini-pro", 32_768),
    ("command-r-plus", 128_000),
    ("command-r", 128_000),
    ("mistral-large", 32_768),
    ("llama3.1", 128_000),
    ("llama3", 8_192),
];

/// Maximum context size (tokens) for a model, if known
#[must_use]
pub fn model_token_limit(model: &str) -> Option<usize> {
    let model = model.to_ascii_lowercase();
    MODEL_TOKEN_LIMITS
        .iter()
        .find(|(key, _)| model.contains(key))
        .map(|(_, limit)| *limit)
}

/// Resolve an API key: explicit value first, then the provider env var
#[must_use]
pub fn resolve_api_key(model: &str, explicit: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    Provider::detect(model)
        .api_key_var()
        .and_then(|var| std::env::var(var).ok())
        .filter(|k| !k.is_empty())
}

/// Strip the `provider:` prefix from a model identifier
#[must_use]
pub fn bare_model_name(model: &str) -> &str {
    model.split_once(':').map_or(model, |(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_provider_from_prefix() {
        assert_eq!(Provider::detect("openai:gpt-4.1"), Provider::OpenAi);
        assert_eq!(Provider::detect("anthropic:claude-sonnet-4"), Provider::Anthropic);
        assert_eq!(Provider::detect("google:gemini-1.5-pro"), Provider::Google);
        assert_eq!(Provider::detect("openrouter:openai/gpt-4.1"), Provider::OpenRouter);
        assert_eq!(Provider::detect("local:qwen"), Provider::Unknown);
    }

    #[test]
    fn openai_length_error_is_recognised() {
        assert!(is_length_error(
            "openai:gpt-4.1",
            "This model's maximum context length is 128000 tokens"
        ));
        assert!(is_length_error("openai:gpt-4o", "code: context_length_exceeded"));
        assert!(!is_length_error("openai:gpt-4o", "rate limit reached"));
    }

    #[test]
    fn anthropic_length_error_is_recognised() {
        assert!(is_length_error(
            "anthropic:claude-sonnet-4",
            "prompt is too long: 210000 tokens > 200000 maximum"
        ));
    }

    #[test]
    fn generic_patterns_apply_to_unknown_provider() {
        assert!(is_length_error("local:qwen", "exceeded the context window"));
        assert!(!is_length_error("local:qwen", "connection refused"));
    }

    #[test]
    fn token_limits_match_most_specific_family() {
        assert_eq!(model_token_limit("openai:gpt-4.1-mini"), Some(1_047_576));
        assert_eq!(model_token_limit("openai:gpt-4o-mini"), Some(128_000));
        assert_eq!(model_token_limit("anthropic:claude-3-5-haiku"), Some(200_000));
        assert_eq!(model_token_limit("local:unknown-model"), None);
    }

    #[test]
    fn explicit_api_key_wins() {
        assert_eq!(
            resolve_api_key("openai:gpt-4.1", Some("sk-explicit")),
            Some("sk-explicit".to_string())
        );
        assert_eq!(resolve_api_key("local:qwen", None), None);
    }

    #[test]
    fn bare_model_name_strips_prefix() {
        assert_eq!(bare_model_name("openai:gpt-4.1"), "gpt-4.1");
        assert_eq!(bare_model_name("gpt-4.1"), "gpt-4.1");
        assert_eq!(bare_model_name("openrouter:openai/gpt-4.1"), "openai/gpt-4.1");
    }
}
