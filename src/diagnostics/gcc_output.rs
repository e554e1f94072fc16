//! Parsing of gcc-style compiler output.

use std::sync::LazyLock;

use regex::Regex;
use tower_lsp_server::ls_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use super::SOURCE_QCC;

static WITH_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(\d+):(\d+):\s*(error|warning|note):\s*(.+)$")
        .expect("valid gcc output regex")
});

static WITHOUT_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(\d+):\s*(error|warning|note):\s*(.+)$").expect("valid gcc output regex")
});

static BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?):(\d+):\s*(.+)$").expect("valid gcc output regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerSeverity {
    Error,
    Warning,
    Note,
}

impl CompilerSeverity {
    fn parse(value: &str) -> Self {
        match value {
            "warning" => CompilerSeverity::Warning,
            "note" => CompilerSeverity::Note,
            _ => CompilerSeverity::Error,
        }
    }

    pub fn to_lsp(self) -> DiagnosticSeverity {
        match self {
            CompilerSeverity::Error => DiagnosticSeverity::ERROR,
            CompilerSeverity::Warning => DiagnosticSeverity::WARNING,
            CompilerSeverity::Note => DiagnosticSeverity::INFORMATION,
        }
    }
}

/// One `file:line[:col]: severity: message` line. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerMessage {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: CompilerSeverity,
    pub message: String,
}

impl CompilerMessage {
    /// A one-character diagnostic at the reported position.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let line = self.line.saturating_sub(1);
        let column = self.column.saturating_sub(1);
        Diagnostic {
            range: Range {
                start: Position { line, character: column },
                end: Position { line, character: column + 1 },
            },
            severity: Some(self.severity.to_lsp()),
            source: Some(SOURCE_QCC.to_string()),
            message: self.message.clone(),
            ..Default::default()
        }
    }
}

fn number(value: &str) -> Option<u32> {
    value.parse().ok()
}

fn parse_line(line: &str) -> Option<CompilerMessage> {
    if let Some(caps) = WITH_COLUMN.captures(line) {
        return Some(CompilerMessage {
            file: caps[1].to_string(),
            line: number(&caps[2])?,
            column: number(&caps[3])?,
            severity: CompilerSeverity::parse(&caps[4]),
            message: caps[5].to_string(),
        });
    }
    if let Some(caps) = WITHOUT_COLUMN.captures(line) {
        return Some(CompilerMessage {
            file: caps[1].to_string(),
            line: number(&caps[2])?,
            column: 1,
            severity: CompilerSeverity::parse(&caps[3]),
            message: caps[4].to_string(),
        });
    }
    let looks_like_error =
        line.contains("error") || line.contains("undefined") || line.contains("undeclared");
    if !looks_like_error {
        return None;
    }
    let caps = BARE.captures(line)?;
    Some(CompilerMessage {
        file: caps[1].to_string(),
        line: number(&caps[2])?,
        column: 1,
        severity: CompilerSeverity::Error,
        message: caps[3].to_string(),
    })
}

/// Every recognizable message in `output`, in order.
pub fn parse_gcc_output(output: &str) -> Vec<CompilerMessage> {
    output.lines().filter_map(parse_line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        "/tmp/basilisk_1_a.c:12:5: error: expected ';' before '}' token",
        "/tmp/basilisk_1_a.c", 12, 5, CompilerSeverity::Error, "expected ';' before '}' token"
    )]
    #[case("a.c:3:1: warning: unused variable 'x'", "a.c", 3, 1, CompilerSeverity::Warning, "unused variable 'x'")]
    #[case("a.c:7: note: declared here", "a.c", 7, 1, CompilerSeverity::Note, "declared here")]
    #[case("a.c:9: undefined reference to `foo'", "a.c", 9, 1, CompilerSeverity::Error, "undefined reference to `foo'")]
    fn recognized_formats(
        #[case] line: &str,
        #[case] file: &str,
        #[case] line_no: u32,
        #[case] column: u32,
        #[case] severity: CompilerSeverity,
        #[case] message: &str,
    ) {
        assert_eq!(
            parse_gcc_output(line),
            vec![CompilerMessage {
                file: file.to_string(),
                line: line_no,
                column,
                severity,
                message: message.to_string(),
            }]
        );
    }

    #[test]
    fn bare_lines_without_error_words_are_ignored() {
        assert!(parse_gcc_output("a.c:4: In function 'main'").is_empty());
        assert!(parse_gcc_output("compilation terminated.").is_empty());
    }

    #[test]
    fn crlf_output_is_handled() {
        let parsed = parse_gcc_output("a.c:1:2: error: boom\r\na.c:2:3: warning: hmm\r\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].message, "boom");
    }

    #[test]
    fn diagnostic_is_zero_based_one_char_wide() {
        let message = parse_gcc_output("a.c:12:5: note: here").remove(0);
        let diagnostic = message.to_diagnostic();
        assert_eq!(diagnostic.range.start, Position { line: 11, character: 4 });
        assert_eq!(diagnostic.range.end, Position { line: 11, character: 5 });
        assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::INFORMATION));
        assert_eq!(diagnostic.source.as_deref(), Some("qcc"));
    }

    #[test]
    fn line_zero_does_not_underflow() {
        let diagnostic = parse_gcc_output("a.c:0:0: error: x").remove(0).to_diagnostic();
        assert_eq!(diagnostic.range.start, Position { line: 0, character: 0 });
    }
}
