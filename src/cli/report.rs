use std::path::Path;

use tower_lsp_server::ls_types::{Diagnostic, DiagnosticSeverity};

pub fn severity_label(severity: Option<DiagnosticSeverity>) -> &'static str {
    match severity {
        Some(DiagnosticSeverity::ERROR) => "error",
        Some(DiagnosticSeverity::WARNING) => "warning",
        Some(DiagnosticSeverity::INFORMATION) => "info",
        _ => "hint",
    }
}

/// `<path>:<line>:<col>: <severity>: <source>: <message>`, 1-based.
pub fn format_diagnostic(path: &Path, diagnostic: &Diagnostic) -> String {
    let source = diagnostic
        .source
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("{}: ", s))
        .unwrap_or_default();
    format!(
        "{}:{}:{}: {}: {}{}",
        path.display(),
        diagnostic.range.start.line + 1,
        diagnostic.range.start.character + 1,
        severity_label(diagnostic.severity),
        source,
        diagnostic.message
    )
}

pub(crate) fn render_text(path: &Path, diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format_diagnostic(path, d) + "\n")
        .collect()
}

pub(crate) fn render_json(diagnostics: &[Diagnostic]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(diagnostics).map(|json| json + "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp_server::ls_types::{Position, Range};

    fn diagnostic(severity: Option<DiagnosticSeverity>, source: Option<&str>) -> Diagnostic {
        Diagnostic {
            range: Range {
                start: Position { line: 2, character: 4 },
                end: Position { line: 2, character: 9 },
            },
            severity,
            source: source.map(str::to_string),
            message: "Unmatched closing brace".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn text_lines_are_one_based() {
        let line = format_diagnostic(
            Path::new("/sim/drop.c"),
            &diagnostic(Some(DiagnosticSeverity::ERROR), Some("qcc")),
        );
        assert_eq!(line, "/sim/drop.c:3:5: error: qcc: Unmatched closing brace");
    }

    #[test]
    fn missing_source_and_severity() {
        let line = format_diagnostic(Path::new("a.c"), &diagnostic(None, None));
        assert_eq!(line, "a.c:3:5: hint: Unmatched closing brace");
        assert_eq!(severity_label(Some(DiagnosticSeverity::INFORMATION)), "info");
    }

    #[test]
    fn json_output_is_a_pretty_array() {
        let json = render_json(&[diagnostic(Some(DiagnosticSeverity::WARNING), Some("clangd"))]).unwrap();
        insta::assert_snapshot!(json.trim_end(), @r#"
        [
          {
            "range": {
              "start": {
                "line": 2,
                "character": 4
              },
              "end": {
                "line": 2,
                "character": 9
              }
            },
            "severity": 2,
            "source": "clangd",
            "message": "Unmatched closing brace"
          }
        ]
        "#);
    }
}
