use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower_lsp_server::jsonrpc::Result;
use tower_lsp_server::ls_types::*;
use tower_lsp_server::{Client, LanguageServer};

use super::bridge::{BridgeManager, PeerDiagnostics};
use super::document_state::DocumentStore;
use super::settings::SettingsSource;
use crate::config::{BasiliskSettings, ClangdMode, uri_to_path};
use crate::symbols::SymbolIndex;

mod text_document;
mod workspace;

pub(crate) use text_document::ValidationTrigger;

pub(crate) const LOG_TARGET: &str = "qcc_lsp::lsp";

/// Facts from the initialize request.
#[derive(Debug, Clone, Default)]
struct WorkspaceInfo {
    initialized: bool,
    root: Option<PathBuf>,
    root_uri: Option<String>,
    folders: Option<Value>,
    capabilities: Value,
    supports_configuration: bool,
    /// Editor settings pushed without `workspace/configuration`.
    pushed_settings: Option<(SettingsSource, Value)>,
}

struct Inner {
    documents: DocumentStore,
    symbols: SymbolIndex,
    bridge: BridgeManager,
    global_settings: ArcSwap<BasiliskSettings>,
    document_settings: DashMap<String, BasiliskSettings>,
    workspace: Mutex<WorkspaceInfo>,
    /// Project config files already warned about.
    warned_configs: Mutex<HashSet<PathBuf>>,
    peer_diagnostics: Mutex<Option<mpsc::UnboundedReceiver<PeerDiagnostics>>>,
}

/// Basilisk C language server.
///
/// Cheap to clone. Clones share all state, which lets background
/// validation tasks hold their own handle.
#[derive(Clone)]
pub struct QccLs {
    client: Client,
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QccLs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QccLs")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl QccLs {
    pub fn new(client: Client) -> Self {
        let (sink, rx) = mpsc::unbounded_channel();
        Self::with_bridge(client, BridgeManager::new(sink), rx)
    }

    fn with_bridge(
        client: Client,
        bridge: BridgeManager,
        peer_diagnostics: mpsc::UnboundedReceiver<PeerDiagnostics>,
    ) -> Self {
        Self {
            client,
            inner: Arc::new(Inner {
                documents: DocumentStore::new(),
                symbols: SymbolIndex::new(),
                bridge,
                global_settings: ArcSwap::from_pointee(BasiliskSettings::default()),
                document_settings: DashMap::new(),
                workspace: Mutex::new(WorkspaceInfo::default()),
                warned_configs: Mutex::new(HashSet::new()),
                peer_diagnostics: Mutex::new(Some(peer_diagnostics)),
            }),
        }
    }

    fn workspace(&self) -> WorkspaceInfo {
        lock(&self.inner.workspace).clone()
    }

    /// clangd answers editor requests for this document.
    fn proxying(&self, settings: &BasiliskSettings) -> bool {
        settings.clangd_proxy_enabled() && self.inner.bridge.is_ready()
    }

    /// Forward `method` to clangd when proxying.
    ///
    /// Errors, `null` and empty arrays all come back as `None`, so callers
    /// fall back to their local answer.
    async fn request_clangd<P: Serialize, R: DeserializeOwned>(
        &self,
        settings: &BasiliskSettings,
        method: &str,
        params: &P,
    ) -> Option<R> {
        if !self.proxying(settings) {
            return None;
        }
        let params = serde_json::to_value(params).ok()?;
        let value = match self.inner.bridge.request(method, params).await {
            Ok(value) => value,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "clangd {} failed: {}", method, e);
                return None;
            }
        };
        if value.is_null() || value.as_array().is_some_and(Vec::is_empty) {
            return None;
        }
        match serde_json::from_value(value) {
            Ok(result) => Some(result),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Unexpected clangd {} result: {}", method, e);
                None
            }
        }
    }

    fn forward_did_open(&self, uri: &Uri, language_id: &str, version: i32, text: &str) {
        self.inner.bridge.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": uri.as_str(),
                    "languageId": language_id,
                    "version": version,
                    "text": text
                }
            }),
        );
    }

    fn spawn_validation(&self, uri: Uri, trigger: ValidationTrigger) {
        let server = self.clone();
        tokio::spawn(async move { server.validate(uri, trigger).await });
    }
}

#[allow(deprecated)]
fn workspace_root(params: &InitializeParams) -> (Option<PathBuf>, Option<String>) {
    if let Some(root_uri) = &params.root_uri {
        return (uri_to_path(root_uri.as_str()), Some(root_uri.as_str().to_string()));
    }
    if let Some(folder) = params.workspace_folders.as_ref().and_then(|f| f.first()) {
        return (
            uri_to_path(folder.uri.as_str()),
            Some(folder.uri.as_str().to_string()),
        );
    }
    match &params.root_path {
        Some(path) => (Some(PathBuf::from(path)), None),
        None => (None, None),
    }
}

fn capabilities(navigation: bool, workspace_folders: bool) -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::INCREMENTAL),
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(false),
            })),
            ..Default::default()
        })),
        completion_provider: Some(CompletionOptions {
            resolve_provider: Some(true),
            trigger_characters: Some(
                [".", "#", "<", "\"", "/"].iter().map(|c| c.to_string()).collect(),
            ),
            ..Default::default()
        }),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(navigation)),
        references_provider: Some(OneOf::Left(navigation)),
        document_symbol_provider: Some(OneOf::Left(navigation)),
        workspace_symbol_provider: Some(OneOf::Left(navigation)),
        workspace: workspace_folders.then(|| WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `initializationOptions.basilisk.clangd.mode == "augment"` hands navigation
/// to the editor's own clangd.
fn augment_mode(options: Option<&Value>) -> bool {
    options
        .and_then(|o| o.pointer("/basilisk/clangd/mode"))
        .and_then(Value::as_str)
        .and_then(ClangdMode::parse)
        == Some(ClangdMode::Augment)
}

impl LanguageServer for QccLs {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let (root, root_uri) = workspace_root(&params);
        let supports_configuration = params
            .capabilities
            .workspace
            .as_ref()
            .and_then(|w| w.configuration)
            .unwrap_or(false);
        let supports_folders = params
            .capabilities
            .workspace
            .as_ref()
            .and_then(|w| w.workspace_folders)
            .unwrap_or(false);
        let navigation = !augment_mode(params.initialization_options.as_ref());

        match &root {
            Some(path) => log::info!(target: LOG_TARGET, "Workspace root: {}", path.display()),
            None => log::info!(target: LOG_TARGET, "No workspace root"),
        }

        {
            let mut workspace = lock(&self.inner.workspace);
            *workspace = WorkspaceInfo {
                initialized: true,
                root,
                root_uri,
                folders: params
                    .workspace_folders
                    .as_ref()
                    .and_then(|f| serde_json::to_value(f).ok()),
                capabilities: serde_json::to_value(&params.capabilities).unwrap_or(Value::Null),
                supports_configuration,
                pushed_settings: params
                    .initialization_options
                    .as_ref()
                    .and_then(|o| o.get("basilisk"))
                    .cloned()
                    .map(|v| (SettingsSource::InitializationOptions, v)),
            };
        }
        if !supports_configuration {
            self.seed_global_settings();
        }

        Ok(InitializeResult {
            capabilities: capabilities(navigation, supports_folders),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.spawn_peer_diagnostics_consumer();

        if self.workspace().supports_configuration {
            let registration = Registration {
                id: "basilisk-did-change-configuration".to_string(),
                method: "workspace/didChangeConfiguration".to_string(),
                register_options: None,
            };
            if let Err(e) = self.client.register_capability(vec![registration]).await {
                log::debug!(target: LOG_TARGET, "Configuration registration failed: {}", e);
            }
        }

        self.refresh_environment().await;
        self.client
            .log_message(MessageType::INFO, "Basilisk C language server started")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        if self.inner.bridge.stop().await {
            self.inner.documents.clear_peer();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.inner.symbols.index_document(&doc.uri, &doc.text);
        self.forward_did_open(&doc.uri, &doc.language_id, doc.version, &doc.text);
        self.inner
            .documents
            .open(doc.uri.clone(), doc.text, doc.version, doc.language_id);
        self.spawn_validation(doc.uri, ValidationTrigger::Open);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        let Some(text) = self
            .inner
            .documents
            .change(&uri, version, params.content_changes)
        else {
            log::debug!(target: LOG_TARGET, "didChange for unopened {}", uri.as_str());
            return;
        };

        self.inner.symbols.index_document(&uri, &text);
        self.inner.bridge.notify(
            "textDocument/didChange",
            json!({
                "textDocument": { "uri": uri.as_str(), "version": version },
                "contentChanges": [{ "text": text }]
            }),
        );
        self.spawn_validation(uri, ValidationTrigger::Change);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        self.inner.bridge.notify(
            "textDocument/didSave",
            json!({ "textDocument": { "uri": uri.as_str() } }),
        );
        self.spawn_validation(uri, ValidationTrigger::Save);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.inner.documents.close(&uri);
        self.inner.symbols.remove_document(&uri);
        self.inner.document_settings.remove(uri.as_str());
        self.client
            .publish_diagnostics(uri.clone(), Vec::new(), None)
            .await;
        self.inner.bridge.notify(
            "textDocument/didClose",
            json!({ "textDocument": { "uri": uri.as_str() } }),
        );
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        if self.workspace().supports_configuration {
            self.inner.document_settings.clear();
        } else {
            let pushed = params
                .settings
                .get("basilisk")
                .cloned()
                .map(|v| (SettingsSource::ClientConfiguration, v));
            lock(&self.inner.workspace).pushed_settings = pushed;
        }
        self.refresh_environment().await;
        self.revalidate_open_documents();
    }

    async fn did_change_watched_files(&self, _: DidChangeWatchedFilesParams) {
        self.inner.document_settings.clear();
        self.refresh_environment().await;
        self.revalidate_open_documents();
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        self.completion_impl(params).await
    }

    async fn completion_resolve(&self, item: CompletionItem) -> Result<CompletionItem> {
        self.completion_resolve_impl(item).await
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        self.hover_impl(params).await
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        self.goto_definition_impl(params).await
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        self.references_impl(params).await
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        self.document_symbol_impl(params).await
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<WorkspaceSymbolResponse>> {
        self.workspace_symbol_impl(params).await
    }
}
