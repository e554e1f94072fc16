//! Definition, references and symbol requests.
//!
//! Each one asks clangd first when proxying and answers from the local
//! symbol index when clangd has nothing.

use tower_lsp_server::jsonrpc::Result;
use tower_lsp_server::ls_types::*;

use super::super::QccLs;
use crate::symbols::{find_references, word_at};

impl QccLs {
    fn word_under_cursor(&self, uri: &Uri, position: Position) -> Option<(String, String)> {
        let text = self.inner.documents.text(uri)?;
        let (word, _) = word_at(&text, position)?;
        Some((word, text))
    }

    pub(crate) async fn goto_definition_impl(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri.clone();
        let position = params.text_document_position_params.position;

        let settings = self.settings_for(&uri).await;
        let clangd: Option<GotoDefinitionResponse> = self
            .request_clangd(&settings, "textDocument/definition", &params)
            .await;
        if clangd.is_some() {
            return Ok(clangd);
        }

        Ok(self
            .word_under_cursor(&uri, position)
            .and_then(|(word, _)| self.inner.symbols.find_definition(&word, Some(&uri)))
            .map(|symbol| GotoDefinitionResponse::Scalar(symbol.location)))
    }

    pub(crate) async fn references_impl(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let uri = params.text_document_position.text_document.uri.clone();
        let position = params.text_document_position.position;

        let settings = self.settings_for(&uri).await;
        let clangd: Option<Vec<Location>> = self
            .request_clangd(&settings, "textDocument/references", &params)
            .await;
        if clangd.is_some() {
            return Ok(clangd);
        }

        let Some((word, text)) = self.word_under_cursor(&uri, position) else {
            return Ok(None);
        };
        let locations: Vec<Location> = find_references(&text, &word)
            .into_iter()
            .map(|range| Location {
                uri: uri.clone(),
                range,
            })
            .collect();
        Ok((!locations.is_empty()).then_some(locations))
    }

    pub(crate) async fn document_symbol_impl(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri.clone();

        let settings = self.settings_for(&uri).await;
        let clangd: Option<DocumentSymbolResponse> = self
            .request_clangd(&settings, "textDocument/documentSymbol", &params)
            .await;
        if clangd.is_some() {
            return Ok(clangd);
        }

        Ok(Some(DocumentSymbolResponse::Nested(
            self.inner.symbols.document_symbols(&uri),
        )))
    }

    pub(crate) async fn workspace_symbol_impl(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<WorkspaceSymbolResponse>> {
        let settings = self.global_settings();
        let clangd: Option<WorkspaceSymbolResponse> = self
            .request_clangd(&settings, "workspace/symbol", &params)
            .await;
        if clangd.is_some() {
            return Ok(clangd);
        }

        let symbols = self
            .inner
            .symbols
            .find_symbols(&params.query)
            .iter()
            .map(|symbol| symbol.to_symbol_information())
            .collect();
        Ok(Some(WorkspaceSymbolResponse::Flat(symbols)))
    }
}
