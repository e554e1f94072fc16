use tower_lsp_server::ls_types::{Position, Range};

/// Maps between LSP positions (UTF-16 columns) and byte offsets of one text.
pub struct PositionMapper<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> PositionMapper<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            line_starts: compute_line_starts(text),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Text of `line` without its terminator.
    pub fn line_text(&self, line: usize) -> Option<&'a str> {
        let start = *self.line_starts.get(line)?;
        let end = match self.line_starts.get(line + 1) {
            Some(next) => next - 1,
            None => self.text.len(),
        };
        let text = &self.text[start..end];
        Some(text.strip_suffix('\r').unwrap_or(text))
    }

    /// Byte offset of `position`. Columns past the line end clamp to the end;
    /// lines past the text clamp to the text end.
    pub fn position_to_byte(&self, position: Position) -> usize {
        let line = position.line as usize;
        let Some(line_start) = self.line_starts.get(line).copied() else {
            return self.text.len();
        };
        let line_text = self.line_text(line).unwrap_or("");
        let column = convert_utf16_to_byte_in_line(line_text, position.character as usize)
            .unwrap_or(line_text.len());
        line_start + column
    }

    pub fn byte_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts[line];
        let line_text = self.line_text(line).unwrap_or("");
        let within = (offset - line_start).min(line_text.len());
        Position {
            line: line as u32,
            character: utf16_column(line_text, within),
        }
    }

    pub fn byte_range_to_range(&self, start: usize, end: usize) -> Range {
        Range {
            start: self.byte_to_position(start),
            end: self.byte_to_position(end),
        }
    }
}

/// Byte offsets at which each line begins.
pub fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut line_starts = vec![0];
    line_starts.extend(
        text.bytes()
            .enumerate()
            .filter(|(_, byte)| *byte == b'\n')
            .map(|(index, _)| index + 1),
    );
    line_starts
}

/// Convert a UTF-16 column to a byte offset within a line.
/// Returns None if the column is past the end of the line.
pub fn convert_utf16_to_byte_in_line(line_text: &str, utf16_pos: usize) -> Option<usize> {
    let mut utf16_offset = 0;
    for (byte_offset, ch) in line_text.char_indices() {
        if utf16_offset >= utf16_pos {
            return Some(byte_offset);
        }
        utf16_offset += ch.len_utf16();
    }
    (utf16_offset >= utf16_pos).then_some(line_text.len())
}

/// UTF-16 column of a byte offset within a line. Offsets inside a multi-byte
/// character snap back to its start.
pub fn utf16_column(line_text: &str, byte_pos: usize) -> u32 {
    let mut byte_pos = byte_pos.min(line_text.len());
    while !line_text.is_char_boundary(byte_pos) {
        byte_pos -= 1;
    }
    line_text[..byte_pos].encode_utf16().count() as u32
}

/// Length of a line in UTF-16 code units.
pub fn utf16_len(line_text: &str) -> u32 {
    line_text.encode_utf16().count() as u32
}
