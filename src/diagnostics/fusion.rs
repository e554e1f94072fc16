//! Reconciling clangd and local diagnostics into one published set.

use tower_lsp_server::ls_types::{Diagnostic, DiagnosticSeverity, Position};

use super::SOURCE_CLANGD;
use super::noise::filter_noise;
use crate::config::DiagnosticsMode;

/// Give source-less peer diagnostics the `clangd` source.
pub fn normalize_source(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics
        .into_iter()
        .map(|mut diagnostic| {
            if diagnostic.source.as_deref().is_none_or(str::is_empty) {
                diagnostic.source = Some(SOURCE_CLANGD.to_string());
            }
            diagnostic
        })
        .collect()
}

/// Apply the clangd diagnostics mode. Without document text nothing is
/// filtered in `filtered` mode.
pub fn select_peer_diagnostics(
    diagnostics: Vec<Diagnostic>,
    mode: DiagnosticsMode,
    text: Option<&str>,
) -> Vec<Diagnostic> {
    match mode {
        DiagnosticsMode::All => diagnostics,
        DiagnosticsMode::None => Vec::new(),
        DiagnosticsMode::Filtered => match text {
            Some(text) => filter_noise(diagnostics, text),
            None => diagnostics,
        },
    }
}

#[derive(PartialEq)]
struct Identity<'a> {
    start: Position,
    end: Position,
    severity: Option<DiagnosticSeverity>,
    message: &'a str,
    source: Option<&'a str>,
}

impl<'a> Identity<'a> {
    fn of(diagnostic: &'a Diagnostic) -> Self {
        Self {
            start: diagnostic.range.start,
            end: diagnostic.range.end,
            severity: diagnostic.severity,
            message: &diagnostic.message,
            source: diagnostic.source.as_deref(),
        }
    }
}

/// Exact duplicates removed, first occurrence kept, then capped at `max`.
pub fn dedupe_and_cap(diagnostics: Vec<Diagnostic>, max: usize) -> Vec<Diagnostic> {
    let mut kept: Vec<Diagnostic> = Vec::new();
    for diagnostic in diagnostics {
        if kept.len() >= max {
            break;
        }
        let identity = Identity::of(&diagnostic);
        if kept.iter().any(|existing| Identity::of(existing) == identity) {
            continue;
        }
        kept.push(diagnostic);
    }
    kept
}

/// Peer diagnostics first, then local ones, deduplicated and capped.
pub fn fuse(peer: &[Diagnostic], local: &[Diagnostic], max: usize) -> Vec<Diagnostic> {
    let combined = peer.iter().chain(local).cloned().collect();
    dedupe_and_cap(combined, max)
}
