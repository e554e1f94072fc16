//! Line-oriented outline extraction.

use std::sync::LazyLock;

use regex::Regex;
use tower_lsp_server::ls_types::{DocumentSymbol, Position, Range, SymbolKind};

use crate::docs::{BUILTIN_FUNCTIONS, CONTROL_KEYWORDS, FIELD_TYPES};
use crate::text::{utf16_column, utf16_len};

static EVENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*event\s+(\w+)\s*\(([^)]*)\)\s*\{?").expect("valid event regex")
});

static FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:static\s+)?(?:inline\s+)?(\w+(?:\s*\*)?)\s+(\w+)\s*\(([^)]*)\)\s*\{?$")
        .expect("valid function regex")
});

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(face\s+vector|vertex\s+scalar|vertex\s+vector|scalar|vector|tensor|symmetric\s+tensor)\s+([^;]+);",
    )
    .expect("valid field regex")
});

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*\[").expect("valid field name regex"));

static GLOBAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:static\s+)?(?:const\s+)?(double|int|float|char|long|short|unsigned|size_t)\s+(\w+)\s*(?:=|;)",
    )
    .expect("valid global regex")
});

static TYPEDEF_STRUCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*typedef\s+struct\s*(?:\w*)\s*\{").expect("valid struct regex"));

static STRUCT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\}\s*(\w+)\s*;").expect("valid struct close regex"));

static DEFINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*#define\s+(\w+)(?:\(([^)]*)\))?\s+(.*)").expect("valid define regex")
});

static ENUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:typedef\s+)?enum\s*(\w*)\s*\{").expect("valid enum regex"));

const C_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "default", "break", "continue", "return",
    "goto", "sizeof", "typedef", "struct", "union", "enum", "static", "const", "volatile", "extern",
    "register", "auto", "inline", "restrict",
];

/// One outline entry with its nested children.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub detail: String,
    pub range: Range,
    pub selection_range: Range,
    /// Text of a `/** ... */` comment right above the declaration.
    pub documentation: Option<String>,
    pub children: Vec<OutlineSymbol>,
}

impl OutlineSymbol {
    fn on_line(
        name: &str,
        kind: SymbolKind,
        detail: String,
        line_no: usize,
        line: &str,
        name_byte: usize,
        documentation: Option<String>,
    ) -> Self {
        let line_no = line_no as u32;
        let start = utf16_column(line, name_byte);
        let selection_end = start + utf16_len(name);
        Self {
            name: name.to_string(),
            kind,
            detail,
            range: Range {
                start: Position { line: line_no, character: 0 },
                end: Position {
                    line: line_no,
                    character: utf16_len(line).max(selection_end),
                },
            },
            selection_range: Range {
                start: Position { line: line_no, character: start },
                end: Position { line: line_no, character: selection_end },
            },
            documentation,
            children: Vec::new(),
        }
    }

    #[allow(deprecated)]
    pub fn to_document_symbol(&self) -> DocumentSymbol {
        let children: Vec<DocumentSymbol> =
            self.children.iter().map(Self::to_document_symbol).collect();
        DocumentSymbol {
            name: self.name.clone(),
            detail: Some(self.detail.clone()),
            kind: self.kind,
            tags: None,
            deprecated: None,
            range: self.range,
            selection_range: self.selection_range,
            children: (!children.is_empty()).then_some(children),
        }
    }
}

fn is_c_or_control_keyword(word: &str) -> bool {
    C_KEYWORDS.contains(&word) || CONTROL_KEYWORDS.contains(&word)
}

fn is_builtin_or_keyword(word: &str) -> bool {
    is_c_or_control_keyword(word) || BUILTIN_FUNCTIONS.contains(&word) || FIELD_TYPES.contains(&word)
}

/// Tracks brace depth across lines, skipping literals and comments.
#[derive(Default)]
struct BraceDepth {
    depth: i32,
    in_block_comment: bool,
}

impl BraceDepth {
    /// Feed one line. Returns true when a `}` brought the depth back to zero.
    fn feed(&mut self, line: &str) -> bool {
        let mut closed_to_top = false;
        let mut in_string = false;
        let mut in_char = false;
        let mut escaped = false;
        let mut chars = line.chars().peekable();

        while let Some(ch) = chars.next() {
            let next = chars.peek().copied();
            if escaped {
                escaped = false;
                continue;
            }
            if self.in_block_comment {
                if ch == '*' && next == Some('/') {
                    chars.next();
                    self.in_block_comment = false;
                }
                continue;
            }
            if in_string || in_char {
                match ch {
                    '\\' => escaped = true,
                    '"' if in_string => in_string = false,
                    '\'' if in_char => in_char = false,
                    _ => {}
                }
                continue;
            }
            match ch {
                '/' if next == Some('/') => break,
                '/' if next == Some('*') => {
                    chars.next();
                    self.in_block_comment = true;
                }
                '"' => in_string = true,
                '\'' => in_char = true,
                '{' => self.depth += 1,
                '}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        closed_to_top = true;
                    }
                }
                _ => {}
            }
        }
        closed_to_top
    }
}

/// Doc comment ending on the nearest non-blank line above `line_no`.
///
/// Only `/**` and `/*!` comments count.
pub(crate) fn doc_comment_above(lines: &[&str], line_no: usize) -> Option<String> {
    let end = (0..line_no).rev().find(|&i| !lines[i].trim().is_empty())?;
    if !lines[end].contains("*/") {
        return None;
    }

    let mut start = end;
    loop {
        let line = lines[start];
        if line.contains("/**") || line.contains("/*!") {
            break;
        }
        if line.contains("/*") || start == 0 {
            return None;
        }
        start -= 1;
    }

    let raw = &lines[start..=end];
    let cleaned: Vec<String> = raw
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let mut value: &str = line;
            if index == 0 {
                value = strip_comment_open(value);
            }
            if index == raw.len() - 1 {
                value = value.trim_end();
                value = value.strip_suffix("*/").unwrap_or(value);
            }
            let trimmed = value.trim_start();
            match trimmed.strip_prefix('*') {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).to_string(),
                None => value.to_string(),
            }
        })
        .collect();

    let doc = cleaned.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

fn strip_comment_open(line: &str) -> &str {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix("/*") else {
        return line;
    };
    let rest = rest.trim_start_matches('*');
    rest.strip_prefix('!').unwrap_or(rest)
}

/// Outline of `text`: events, functions (with their field declarations
/// nested), top-level fields and globals, typedef structs, macros and enums.
pub fn extract_symbols(text: &str) -> Vec<OutlineSymbol> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    let mut symbols: Vec<OutlineSymbol> = Vec::new();
    let mut braces = BraceDepth::default();
    let mut container: Option<usize> = None;

    for (line_no, line) in lines.iter().copied().enumerate() {
        if braces.feed(line) {
            container = None;
        }

        if let Some(caps) = EVENT.captures(line) {
            let name = &caps[1];
            let name_byte = caps.get(1).map(|m| m.start()).unwrap_or(0);
            symbols.push(OutlineSymbol::on_line(
                name,
                SymbolKind::EVENT,
                format!("event ({})", caps[2].trim()),
                line_no,
                line,
                name_byte,
                doc_comment_above(&lines, line_no),
            ));
            container = Some(symbols.len() - 1);
            continue;
        }

        if let Some(caps) = FUNCTION.captures(line) {
            let name = &caps[2];
            if !is_c_or_control_keyword(name) {
                let name_byte = caps.get(2).map(|m| m.start()).unwrap_or(0);
                symbols.push(OutlineSymbol::on_line(
                    name,
                    SymbolKind::FUNCTION,
                    format!("{} {}({})", &caps[1], name, caps[3].trim()),
                    line_no,
                    line,
                    name_byte,
                    doc_comment_above(&lines, line_no),
                ));
                container = Some(symbols.len() - 1);
            }
            continue;
        }

        if let Some(caps) = FIELD.captures(line) {
            let field_type = &caps[1];
            let documentation = doc_comment_above(&lines, line_no);
            let Some(declarations) = caps.get(2) else {
                continue;
            };
            let mut offset = declarations.start();
            for declaration in declarations.as_str().split(',') {
                if let Some(name) = FIELD_NAME.captures(declaration).and_then(|c| c.get(1)) {
                    let field = OutlineSymbol::on_line(
                        name.as_str(),
                        SymbolKind::FIELD,
                        field_type.to_string(),
                        line_no,
                        line,
                        offset + name.start(),
                        documentation.clone(),
                    );
                    match container {
                        Some(index) => symbols[index].children.push(field),
                        None => symbols.push(field),
                    }
                }
                offset += declaration.len() + 1;
            }
            continue;
        }

        if let Some(caps) = GLOBAL.captures(line) {
            let name = &caps[2];
            if braces.depth == 0 && !is_builtin_or_keyword(name) {
                let name_byte = caps.get(2).map(|m| m.start()).unwrap_or(0);
                symbols.push(OutlineSymbol::on_line(
                    name,
                    SymbolKind::VARIABLE,
                    caps[1].to_string(),
                    line_no,
                    line,
                    name_byte,
                    doc_comment_above(&lines, line_no),
                ));
            }
            continue;
        }

        if TYPEDEF_STRUCT.is_match(line) {
            if let Some(symbol) = typedef_struct(&lines, line_no) {
                symbols.push(symbol);
            }
            continue;
        }

        if let Some(caps) = DEFINE.captures(line) {
            let name = &caps[1];
            let name_byte = caps.get(1).map(|m| m.start()).unwrap_or(0);
            let (kind, detail) = match caps.get(2) {
                Some(params) => (
                    SymbolKind::FUNCTION,
                    format!("#define {}({})", name, params.as_str()),
                ),
                None => (SymbolKind::CONSTANT, format!("#define {}", name)),
            };
            symbols.push(OutlineSymbol::on_line(
                name,
                kind,
                detail,
                line_no,
                line,
                name_byte,
                doc_comment_above(&lines, line_no),
            ));
            continue;
        }

        if let Some(caps) = ENUM.captures(line) {
            let (name, name_byte) = match caps.get(1).filter(|m| !m.as_str().is_empty()) {
                Some(m) => (m.as_str(), m.start()),
                None => ("anonymous", 0),
            };
            symbols.push(OutlineSymbol::on_line(
                name,
                SymbolKind::ENUM,
                "enum".to_string(),
                line_no,
                line,
                name_byte,
                doc_comment_above(&lines, line_no),
            ));
        }
    }

    symbols
}

/// A `typedef struct { ... } Name;` starting at `start`, spanning to its
/// closing line.
fn typedef_struct(lines: &[&str], start: usize) -> Option<OutlineSymbol> {
    let mut depth = 1;
    for (line_no, line) in lines.iter().enumerate().skip(start + 1) {
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
        if depth == 0 {
            let caps = STRUCT_CLOSE.captures(line)?;
            let name = caps.get(1)?;
            let mut symbol = OutlineSymbol::on_line(
                name.as_str(),
                SymbolKind::STRUCT,
                "typedef struct".to_string(),
                line_no,
                line,
                name.start(),
                doc_comment_above(lines, start),
            );
            symbol.range = Range {
                start: Position { line: start as u32, character: 0 },
                end: Position {
                    line: line_no as u32,
                    character: utf16_len(line),
                },
            };
            return Some(symbol);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(symbols: &[OutlineSymbol]) -> Vec<&str> {
        symbols.iter().map(|s| s.name.as_str()).collect()
    }

    const SIMULATION: &str = r#"#include "navier-stokes/centered.h"
#define LEVEL 8
#define SQ(x) ((x)*(x))

/** Volume fraction of the liquid. */
scalar f[], g[];
double Reynolds = 100.;

typedef struct {
  double x, y;
} Point2;

enum boundary { LEFT, RIGHT };

int main() {
  run();
}

/**
 * Refine around the interface.
 */
event adapt (i++) {
  scalar omega[];
  vorticity (u, omega);
}
"#;

    #[test]
    fn extracts_top_level_outline() {
        let symbols = extract_symbols(SIMULATION);
        assert_eq!(
            names(&symbols),
            ["LEVEL", "SQ", "f", "g", "Reynolds", "Point2", "boundary", "main", "adapt"]
        );
        let kinds: Vec<_> = symbols.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            [
                SymbolKind::CONSTANT,
                SymbolKind::FUNCTION,
                SymbolKind::FIELD,
                SymbolKind::FIELD,
                SymbolKind::VARIABLE,
                SymbolKind::STRUCT,
                SymbolKind::ENUM,
                SymbolKind::FUNCTION,
                SymbolKind::EVENT,
            ]
        );
    }

    #[test]
    fn fields_inside_events_are_nested() {
        let symbols = extract_symbols(SIMULATION);
        let adapt = symbols.iter().find(|s| s.name == "adapt").unwrap();
        assert_eq!(adapt.detail, "event (i++)");
        assert_eq!(names(&adapt.children), ["omega"]);
        assert_eq!(adapt.children[0].detail, "scalar");
    }

    #[test]
    fn selection_ranges_point_at_names() {
        let symbols = extract_symbols(SIMULATION);
        let g = symbols.iter().find(|s| s.name == "g").unwrap();
        assert_eq!(g.selection_range.start, Position { line: 5, character: 12 });
        assert_eq!(g.selection_range.end, Position { line: 5, character: 13 });

        let adapt = symbols.iter().find(|s| s.name == "adapt").unwrap();
        assert_eq!(adapt.selection_range.start.character, 6);
    }

    #[test]
    fn struct_range_spans_its_body() {
        let symbols = extract_symbols(SIMULATION);
        let point = symbols.iter().find(|s| s.name == "Point2").unwrap();
        assert_eq!(point.range.start.line, 8);
        assert_eq!(point.range.end.line, 10);
        assert_eq!(point.selection_range.start.line, 10);
    }

    #[test]
    fn doc_comments_are_attached() {
        let symbols = extract_symbols(SIMULATION);
        let f = symbols.iter().find(|s| s.name == "f").unwrap();
        assert_eq!(f.documentation.as_deref(), Some("Volume fraction of the liquid."));
        let adapt = symbols.iter().find(|s| s.name == "adapt").unwrap();
        assert_eq!(adapt.documentation.as_deref(), Some("Refine around the interface."));
        let main = symbols.iter().find(|s| s.name == "main").unwrap();
        assert_eq!(main.documentation, None);
    }

    #[test]
    fn plain_block_comment_is_not_documentation() {
        let lines = ["/* not a doc */", "int x = 1;"];
        assert_eq!(doc_comment_above(&lines, 1), None);
    }

    #[test]
    fn locals_and_control_statements_are_skipped() {
        let text = "int main() {\n  int local = 1;\n  else if (x) {\n  }\n}\nint after = 2;\n";
        let symbols = extract_symbols(text);
        assert_eq!(names(&symbols), ["main", "after"]);
    }

    #[test]
    fn braces_in_comments_do_not_change_depth() {
        let text = "/* { */\nint top = 1;\n";
        assert_eq!(names(&extract_symbols(text)), ["top"]);
    }

    #[test]
    fn document_symbol_conversion_keeps_children() {
        let symbols = extract_symbols("event init (t = 0) {\n  scalar a[];\n}\n");
        let converted = symbols[0].to_document_symbol();
        assert_eq!(converted.kind, SymbolKind::EVENT);
        assert_eq!(converted.children.map(|c| c.len()), Some(1));
    }
}
