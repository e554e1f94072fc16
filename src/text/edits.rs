use tower_lsp_server::ls_types::TextDocumentContentChangeEvent;

use super::position::PositionMapper;

/// Apply `didChange` content changes in order.
///
/// A change without a range replaces the whole text. Ranged changes are
/// applied against the text produced by the previous change.
pub fn apply_content_changes(text: &str, changes: Vec<TextDocumentContentChangeEvent>) -> String {
    let mut current = text.to_string();
    for change in changes {
        match change.range {
            None => current = change.text,
            Some(range) => {
                let (start, end) = {
                    let mapper = PositionMapper::new(&current);
                    let start = mapper.position_to_byte(range.start);
                    let end = mapper.position_to_byte(range.end);
                    (start.min(end), start.max(end))
                };
                current.replace_range(start..end, &change.text);
            }
        }
    }
    current
}
