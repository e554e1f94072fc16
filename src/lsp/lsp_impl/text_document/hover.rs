use tower_lsp_server::jsonrpc::Result;
use tower_lsp_server::ls_types::*;

use super::super::QccLs;
use crate::docs::{hover_markdown, keyword_category};
use crate::symbols::{IndexedSymbol, word_at};

const SEPARATOR: &str = "\n---\n";

/// Basilisk hover for `word`. Reference documentation wins over keyword
/// categories, which win over indexed symbols.
fn basilisk_markdown(word: &str, symbol: Option<&IndexedSymbol>) -> Option<String> {
    if let Some(markdown) = hover_markdown(word) {
        return Some(markdown);
    }
    if let Some(category) = keyword_category(word) {
        return Some(format!("**{}** (Basilisk {})", word, category));
    }
    symbol.map(symbol_markdown)
}

fn symbol_markdown(symbol: &IndexedSymbol) -> String {
    let mut parts = Vec::new();
    if let Some(doc) = &symbol.documentation {
        parts.push(doc.clone());
    }
    if symbol.detail.is_empty() {
        parts.push(format!("**{}**", symbol.name));
    } else {
        parts.push(format!("```c\n{}\n```", symbol.detail));
    }
    parts.join("\n\n")
}

fn markdown_of(contents: HoverContents) -> String {
    fn marked(value: MarkedString) -> String {
        match value {
            MarkedString::String(s) => s,
            MarkedString::LanguageString(ls) => format!("```{}\n{}\n```", ls.language, ls.value),
        }
    }
    match contents {
        HoverContents::Markup(markup) => markup.value,
        HoverContents::Scalar(value) => marked(value),
        HoverContents::Array(values) => values
            .into_iter()
            .map(marked)
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

/// One markdown hover: clangd's text, a separator, then ours.
fn combine(clangd: Option<Hover>, basilisk: Option<String>, fallback_range: Option<Range>) -> Option<Hover> {
    let (clangd_text, range) = match clangd {
        Some(hover) => (Some(markdown_of(hover.contents)), hover.range),
        None => (None, fallback_range),
    };
    let value = match (clangd_text.filter(|t| !t.trim().is_empty()), basilisk) {
        (Some(clangd), Some(local)) => format!("{}{}{}", clangd, SEPARATOR, local),
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => return None,
    };
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range,
    })
}

impl QccLs {
    pub(crate) async fn hover_impl(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri.clone();
        let position = params.text_document_position_params.position;

        let word = self
            .inner
            .documents
            .text(&uri)
            .and_then(|text| word_at(&text, position));
        let basilisk = word.as_ref().and_then(|(word, _)| {
            let symbol = self.inner.symbols.find_definition(word, Some(&uri));
            basilisk_markdown(word, symbol.as_ref())
        });

        let settings = self.settings_for(&uri).await;
        let clangd: Option<Hover> = self
            .request_clangd(&settings, "textDocument/hover", &params)
            .await;

        Ok(combine(clangd, basilisk, word.map(|(_, range)| range)))
    }
}
