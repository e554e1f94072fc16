use dashmap::DashMap;
use tower_lsp_server::ls_types::{DocumentSymbol, Location, SymbolInformation, SymbolKind, Uri};

use super::extract::{OutlineSymbol, extract_symbols};

/// A symbol flattened out of its outline, with where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub detail: String,
    pub documentation: Option<String>,
    pub container_name: Option<String>,
    pub location: Location,
}

impl IndexedSymbol {
    #[allow(deprecated)]
    pub fn to_symbol_information(&self) -> SymbolInformation {
        SymbolInformation {
            name: self.name.clone(),
            kind: self.kind,
            tags: None,
            deprecated: None,
            location: self.location.clone(),
            container_name: self.container_name.clone(),
        }
    }
}

struct IndexedDocument {
    outline: Vec<OutlineSymbol>,
    flat: Vec<IndexedSymbol>,
}

fn flatten(
    symbols: &[OutlineSymbol],
    uri: &Uri,
    container: Option<&str>,
    out: &mut Vec<IndexedSymbol>,
) {
    for symbol in symbols {
        out.push(IndexedSymbol {
            name: symbol.name.clone(),
            kind: symbol.kind,
            detail: symbol.detail.clone(),
            documentation: symbol.documentation.clone(),
            container_name: container.map(str::to_string),
            location: Location {
                uri: uri.clone(),
                range: symbol.selection_range,
            },
        });
        flatten(&symbol.children, uri, Some(&symbol.name), out);
    }
}

/// Outline symbols of every open document.
#[derive(Default)]
pub struct SymbolIndex {
    documents: DashMap<String, IndexedDocument>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-extract symbols for `uri`, replacing what was indexed before.
    pub fn index_document(&self, uri: &Uri, text: &str) {
        let outline = extract_symbols(text);
        let mut flat = Vec::new();
        flatten(&outline, uri, None, &mut flat);
        log::trace!(
            target: "qcc_lsp::symbols",
            "Indexed {} symbols for {}",
            flat.len(),
            uri.as_str()
        );
        self.documents
            .insert(uri.as_str().to_string(), IndexedDocument { outline, flat });
    }

    pub fn remove_document(&self, uri: &Uri) {
        self.documents.remove(uri.as_str());
    }

    pub fn document_symbols(&self, uri: &Uri) -> Vec<DocumentSymbol> {
        self.documents
            .get(uri.as_str())
            .map(|doc| doc.outline.iter().map(OutlineSymbol::to_document_symbol).collect())
            .unwrap_or_default()
    }

    /// First symbol named exactly `name`. `preferred` is searched first,
    /// then the other documents in URI order.
    pub fn find_definition(&self, name: &str, preferred: Option<&Uri>) -> Option<IndexedSymbol> {
        if let Some(uri) = preferred {
            let found = self
                .documents
                .get(uri.as_str())
                .and_then(|doc| doc.flat.iter().find(|s| s.name == name).cloned());
            if found.is_some() {
                return found;
            }
        }
        let mut keys: Vec<String> = self.documents.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys.iter().find_map(|key| {
            self.documents
                .get(key)
                .and_then(|doc| doc.flat.iter().find(|s| s.name == name).cloned())
        })
    }

    /// Symbols whose name contains `query`, case-insensitively.
    pub fn find_symbols(&self, query: &str) -> Vec<IndexedSymbol> {
        let query = query.to_lowercase();
        let mut keys: Vec<String> = self.documents.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys.iter()
            .filter_map(|key| self.documents.get(key))
            .flat_map(|doc| {
                doc.flat
                    .iter()
                    .filter(|s| s.name.to_lowercase().contains(&query))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn clear(&self) {
        self.documents.clear();
    }
}
