//! Fast checks that need no compiler.

use std::sync::LazyLock;

use regex::Regex;
use tower_lsp_server::ls_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use super::SOURCE_LOCAL;
use crate::text::{utf16_column, utf16_len};

static FOREACH_WITHOUT_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*foreach\s*\([^)]*\)\s*$").expect("valid foreach regex"));

static FIELD_WITHOUT_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(scalar|vector)\s+(\w+)\s*;").expect("valid field regex"));

static EVENT_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*event\s+\w+\s+[^(]").expect("valid event regex"));

static EVENT_WITH_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*event\s+\w+\s*\(").expect("valid event regex"));

fn diagnostic(range: Range, severity: DiagnosticSeverity, message: impl Into<String>) -> Diagnostic {
    Diagnostic {
        range,
        severity: Some(severity),
        source: Some(SOURCE_LOCAL.to_string()),
        message: message.into(),
        ..Default::default()
    }
}

fn whole_line(line_no: usize, line: &str) -> Range {
    Range {
        start: Position { line: line_no as u32, character: 0 },
        end: Position { line: line_no as u32, character: utf16_len(line) },
    }
}

/// Heuristic diagnostics for common Basilisk mistakes.
pub fn quick_validate(text: &str) -> Vec<Diagnostic> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    let mut diagnostics = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if FOREACH_WITHOUT_BODY.is_match(line) && body_lacks_braces(&lines[index + 1..]) {
            diagnostics.push(diagnostic(
                whole_line(index, line),
                DiagnosticSeverity::HINT,
                "Consider using braces {} for foreach loops for clarity",
            ));
        }

        if let Some(caps) = FIELD_WITHOUT_BRACKETS.captures(line) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            diagnostics.push(diagnostic(
                Range {
                    start: Position {
                        line: index as u32,
                        character: utf16_column(line, whole.0),
                    },
                    end: Position {
                        line: index as u32,
                        character: utf16_column(line, whole.1),
                    },
                },
                DiagnosticSeverity::WARNING,
                format!(
                    "Field '{}' should be declared with [], e.g., '{} {}[]'",
                    &caps[2], &caps[1], &caps[2]
                ),
            ));
        }

        if EVENT_HEAD.is_match(line) && !EVENT_WITH_PARENS.is_match(line) {
            diagnostics.push(diagnostic(
                whole_line(index, line),
                DiagnosticSeverity::ERROR,
                "Event definition requires parentheses with timing parameters",
            ));
        }
    }

    diagnostics.extend(unbalanced_braces(&lines));
    diagnostics
}

/// The next non-blank line neither opens a block nor ends a statement.
fn body_lacks_braces(following: &[&str]) -> bool {
    match following.iter().map(|l| l.trim()).find(|l| !l.is_empty()) {
        Some(next) => !next.starts_with('{') && !next.ends_with(';'),
        None => false,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    LineComment,
    BlockComment,
    Str,
    Char,
}

/// Hints for every `{` without a matching `}` and every stray `}`.
fn unbalanced_braces(lines: &[&str]) -> Vec<Diagnostic> {
    let mut open: Vec<Position> = Vec::new();
    let mut diagnostics = Vec::new();
    let mut state = Lexical::Code;

    for (line_no, line) in lines.iter().enumerate() {
        if state == Lexical::LineComment {
            state = Lexical::Code;
        }
        let mut chars = line.char_indices().peekable();
        let mut escaped = false;

        while let Some((byte, ch)) = chars.next() {
            let next = chars.peek().map(|(_, c)| *c);
            match state {
                Lexical::Code => match ch {
                    '/' if next == Some('/') => {
                        state = Lexical::LineComment;
                        break;
                    }
                    '/' if next == Some('*') => {
                        chars.next();
                        state = Lexical::BlockComment;
                    }
                    '"' => state = Lexical::Str,
                    '\'' => state = Lexical::Char,
                    '{' => open.push(Position {
                        line: line_no as u32,
                        character: utf16_column(line, byte),
                    }),
                    '}' => {
                        if open.pop().is_none() {
                            let start = Position {
                                line: line_no as u32,
                                character: utf16_column(line, byte),
                            };
                            diagnostics.push(brace_hint(start, "Unmatched '}': no opening brace found"));
                        }
                    }
                    _ => {}
                },
                Lexical::BlockComment => {
                    if ch == '*' && next == Some('/') {
                        chars.next();
                        state = Lexical::Code;
                    }
                }
                Lexical::Str | Lexical::Char => {
                    let closing = if state == Lexical::Str { '"' } else { '\'' };
                    if escaped {
                        escaped = false;
                    } else if ch == '\\' {
                        escaped = true;
                    } else if ch == closing {
                        state = Lexical::Code;
                    }
                }
                Lexical::LineComment => break,
            }
        }

        // Unterminated literals end at the line break.
        if matches!(state, Lexical::Str | Lexical::Char) {
            state = Lexical::Code;
        }
    }

    for start in open {
        diagnostics.push(brace_hint(start, "Unmatched '{': no closing brace found"));
    }
    diagnostics.sort_by_key(|d| (d.range.start.line, d.range.start.character));
    diagnostics
}

fn brace_hint(start: Position, message: &str) -> Diagnostic {
    let end = Position {
        line: start.line,
        character: start.character + 1,
    };
    diagnostic(Range { start, end }, DiagnosticSeverity::HINT, message)
}
