//! Budget allocation: deterministic prefix truncation measured in characters.

/// Longest prefix of `text` holding at most `max_units` characters
/// (Unicode scalar values). Never splits a character.
pub fn bound(text: &str, max_units: usize) -> String {
    match text.char_indices().nth(max_units) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
