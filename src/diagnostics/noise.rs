//! Suppression of clangd complaints caused by Basilisk syntax.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tower_lsp_server::ls_types::Diagnostic;

use crate::docs::{CONSTANTS, CONTROL_KEYWORDS, FIELD_TYPES, LOOP_VARIABLES};

static BASILISK_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    let tokens: Vec<String> = CONTROL_KEYWORDS
        .iter()
        .chain(FIELD_TYPES)
        .chain(CONSTANTS)
        .chain(LOOP_VARIABLES)
        .map(|token| regex::escape(token))
        .collect();
    Regex::new(&format!(r"\b({})\b", tokens.join("|"))).expect("valid token regex")
});

static BASILISK_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"#\s*include\s*[<"](?:grid/|navier-stokes/|two-phase|two-phase-generic|vof|run|events|common|utils|embed|curvature|fractions|conservation|view|output|draw)\.h"#,
    )
    .expect("valid include regex")
});

static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        "unknown type name",
        "a type specifier is required",
        "expected ';' after top level declarator",
        "definition of variable with array type needs an explicit size",
        "use of undeclared identifier",
    ]
    .iter()
    .map(|pattern| {
        RegexBuilder::new(&regex::escape(pattern))
            .case_insensitive(true)
            .build()
            .expect("valid noise pattern")
    })
    .collect()
});

pub fn looks_like_basilisk(text: &str) -> bool {
    BASILISK_TOKEN.is_match(text) || BASILISK_INCLUDE.is_match(text)
}

fn is_noise(message: &str) -> bool {
    NOISE_PATTERNS.iter().any(|pattern| pattern.is_match(message))
}

/// Drop noise diagnostics whose start line uses Basilisk constructs.
pub fn filter_noise(diagnostics: Vec<Diagnostic>, text: &str) -> Vec<Diagnostic> {
    if !looks_like_basilisk(text) {
        return diagnostics;
    }
    let lines: Vec<&str> = text.split('\n').collect();
    diagnostics
        .into_iter()
        .filter(|diagnostic| {
            let line = lines
                .get(diagnostic.range.start.line as usize)
                .copied()
                .unwrap_or("");
            !(looks_like_basilisk(line) && is_noise(&diagnostic.message))
        })
        .collect()
}
