//! Lossy input policies.
//!
//! Both functions here drop information on purpose. They are kept as
//! named, separately tested policies so that callers can see exactly
//! where text is altered before it is hashed, embedded, or stored.

/// Default cap on stored chunk length, in characters.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 8000;

/// Chunks shorter than this after sanitization are dropped.
pub const DEFAULT_MIN_CHUNK_CHARS: usize = 3;

/// Rough characters-per-token ratio used by [`estimate_tokens`].
pub const CHARS_PER_TOKEN: usize = 4;

/// Clean chunk content for storage.
///
/// - Removes NUL and other control characters, keeping `\n` and `\t`
///   (`\r` is dropped so line endings normalise to `\n`).
/// - Trims leading and trailing whitespace.
/// - Caps the result at `max_chars` characters.
pub fn sanitize(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

/// Whether sanitized content is too short to be worth storing.
pub fn is_near_empty(text: &str, min_chars: usize) -> bool {
    text.chars().filter(|c| !c.is_whitespace()).count() < min_chars.max(1)
}

/// Cheap token estimate: `ceil(chars / 4)`, at least 1 for non-empty text.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    if chars == 0 {
        0
    } else {
        chars.div_ceil(CHARS_PER_TOKEN)
    }
}

/// Truncate `text` so its estimated token count is at most `max_tokens`.
///
/// Returns the input unchanged when it already fits.
pub fn truncate_for_embedding(text: &str, max_tokens: usize) -> &str {
    if estimate_tokens(text) <= max_tokens {
        return text;
    }
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
