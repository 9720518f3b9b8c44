//! Whitespace normalization and fixed-window chunking

/// Collapse every whitespace run to a single space and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized `text` into non-overlapping windows of `chunk_size`
/// characters, dropping windows that are blank
///
/// A `chunk_size` of zero yields no chunks.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    if chunk_size == 0 {
        return Vec::new();
    }

    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();

    chars
        .chunks(chunk_size)
        .map(|window| window.iter().collect::<String>())
        .filter(|window| !window.trim().is_empty())
        .collect()
}
