//! Small text helpers shared by every stage

/// Remove a surrounding markdown code fence.
///
/// Only fixed patterns are handled: a leading "```" or "```lang" line and a
/// trailing "```". Text without a leading fence is returned trimmed.
#[must_use]
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    let is_lang_tag = |tag: &str| {
        tag.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'))
    };
    let body = match rest.split_once('\n') {
        Some((lang, body)) if is_lang_tag(lang) => body,
        _ => return trimmed.to_string(),
    };

    body.strip_suffix("```")
        .map(|b| b.strip_suffix('\n').unwrap_or(b))
        .unwrap_or(body)
        .to_string()
}

/// Keep at most `max_chars` characters (never splits a code point)
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Today's date as used in prompts, e.g. `Mon Jan 5, 2026`
#[must_use]
pub fn today_string() -> String {
    chrono::Local::now().format("%a %b %-d, %Y").to_string()
}
