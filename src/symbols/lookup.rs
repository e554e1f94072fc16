use regex::Regex;
use tower_lsp_server::ls_types::{Position, Range};

use crate::text::PositionMapper;

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Identifier touching `position`, with its range.
pub fn word_at(text: &str, position: Position) -> Option<(String, Range)> {
    let mapper = PositionMapper::new(text);
    let offset = mapper.position_to_byte(position);
    let bytes = text.as_bytes();

    let mut start = offset;
    while start > 0 && is_word_byte(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = offset;
    while end < bytes.len() && is_word_byte(bytes[end]) {
        end += 1;
    }
    if start == end {
        return None;
    }
    Some((
        text[start..end].to_string(),
        mapper.byte_range_to_range(start, end),
    ))
}

/// Every whole-word occurrence of `word` in `text`.
pub fn find_references(text: &str, word: &str) -> Vec<Range> {
    if word.is_empty() {
        return Vec::new();
    }
    let Ok(pattern) = Regex::new(&format!(r"\b{}\b", regex::escape(word))) else {
        return Vec::new();
    };
    let mapper = PositionMapper::new(text);
    pattern
        .find_iter(text)
        .map(|m| mapper.byte_range_to_range(m.start(), m.end()))
        .collect()
}
