//! Settings resolution, toolchain checks and clangd lifecycle.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tower_lsp_server::ls_types::{ConfigurationItem, MessageType, Uri};

use super::{LOG_TARGET, QccLs, ValidationTrigger, lock};
use crate::config::{BasiliskSettings, resolve_qcc_path, uri_to_path};
use crate::diagnostics::{
    check_qcc_available, normalize_source, qcc_version, select_peer_diagnostics,
};
use crate::lsp::bridge::{EnsureOutcome, InitializeContext, LaunchPlan, PeerDiagnostics};
use crate::lsp::document_state::PushAdmission;
use crate::lsp::settings::{
    SettingsEvent, SettingsEventKind, SettingsRequest, SettingsSource, load_settings,
};

const SETTINGS_TARGET: &str = "qcc_lsp::settings";
const CONFIG_SECTION: &str = "basilisk";

impl QccLs {
    pub(super) fn global_settings(&self) -> Arc<BasiliskSettings> {
        self.inner.global_settings.load_full()
    }

    /// Effective settings for the document at `uri`.
    pub(super) async fn settings_for(&self, uri: &Uri) -> BasiliskSettings {
        if let Some(cached) = self.inner.document_settings.get(uri.as_str()) {
            return cached.clone();
        }
        let workspace = self.workspace();
        if !workspace.supports_configuration {
            return self.global_settings().as_ref().clone();
        }

        let editor = self.fetch_configuration(Some(uri.clone())).await;
        let document_dir = uri_to_path(uri.as_str()).and_then(|p| p.parent().map(Path::to_path_buf));
        let search_start = document_dir.or(workspace.root.clone());
        let settings = self.resolve_settings(
            search_start.as_deref(),
            editor.map(|v| (SettingsSource::ClientConfiguration, v)),
            workspace.root.as_deref(),
        );
        // didClose evicts entries, so only open documents are cached.
        if self.inner.documents.contains(uri) {
            self.inner
                .document_settings
                .insert(uri.as_str().to_string(), settings.clone());
        }
        settings
    }

    async fn fetch_configuration(&self, scope_uri: Option<Uri>) -> Option<Value> {
        let item = ConfigurationItem {
            scope_uri,
            section: Some(CONFIG_SECTION.to_string()),
        };
        match self.client.configuration(vec![item]).await {
            Ok(mut values) => values.pop().filter(|v| !v.is_null()),
            Err(e) => {
                log::debug!(target: SETTINGS_TARGET, "workspace/configuration failed: {}", e);
                None
            }
        }
    }

    fn resolve_settings(
        &self,
        search_start: Option<&Path>,
        editor: Option<(SettingsSource, Value)>,
        editor_base: Option<&Path>,
    ) -> BasiliskSettings {
        let request = SettingsRequest {
            search_start,
            editor,
            editor_base,
            ..Default::default()
        };
        match load_settings(&request) {
            Ok(outcome) => {
                self.report_settings_events(outcome.events);
                outcome.settings
            }
            Err(e) => {
                log::warn!(target: SETTINGS_TARGET, "{}", e);
                BasiliskSettings::default()
            }
        }
    }

    /// Log settings events. Warnings about a config file reach the editor
    /// once per file.
    fn report_settings_events(&self, events: Vec<SettingsEvent>) {
        for event in events {
            match event.kind {
                SettingsEventKind::Info => {
                    log::debug!(target: SETTINGS_TARGET, "{}", event.message);
                }
                SettingsEventKind::Warning => {
                    if let Some(path) = &event.path {
                        let first = lock(&self.inner.warned_configs).insert(path.clone());
                        if !first {
                            continue;
                        }
                    }
                    log::warn!(target: SETTINGS_TARGET, "{}", event.message);
                    let client = self.client.clone();
                    tokio::spawn(async move {
                        client.log_message(MessageType::WARNING, event.message).await;
                    });
                }
            }
        }
    }

    /// Global settings from initializationOptions, available before the
    /// first document opens.
    pub(super) fn seed_global_settings(&self) {
        let workspace = self.workspace();
        let settings = self.resolve_settings(
            workspace.root.as_deref(),
            workspace.pushed_settings.clone(),
            workspace.root.as_deref(),
        );
        self.inner.global_settings.store(Arc::new(settings));
    }

    async fn refresh_global_settings(&self) -> Arc<BasiliskSettings> {
        let workspace = self.workspace();
        let editor = if workspace.supports_configuration {
            self.fetch_configuration(None)
                .await
                .map(|v| (SettingsSource::ClientConfiguration, v))
        } else {
            workspace.pushed_settings.clone()
        };
        let settings = Arc::new(self.resolve_settings(
            workspace.root.as_deref(),
            editor,
            workspace.root.as_deref(),
        ));
        self.inner.global_settings.store(Arc::clone(&settings));
        settings
    }

    /// Reload settings, check qcc and bring clangd in line with them.
    pub(super) async fn refresh_environment(&self) {
        if !self.workspace().initialized {
            return;
        }
        let settings = self.refresh_global_settings().await;
        let qcc_available = self.check_qcc(&settings).await;
        self.sync_clangd(&settings, qcc_available).await;
    }

    async fn check_qcc(&self, settings: &BasiliskSettings) -> bool {
        let qcc = resolve_qcc_path(settings);
        if check_qcc_available(&qcc).await {
            let version = qcc_version(&qcc).await.unwrap_or_else(|| qcc.clone());
            let message = format!("Basilisk LSP server initialized with qcc support ({})", version);
            log::info!(target: LOG_TARGET, "{}", message);
            self.client.log_message(MessageType::INFO, message).await;
            true
        } else {
            let message = format!(
                "qcc compiler not found at '{}'. Diagnostics will be limited. Set basilisk.qccPath in settings.",
                qcc
            );
            log::warn!(target: LOG_TARGET, "{}", message);
            self.client.log_message(MessageType::WARNING, message).await;
            false
        }
    }

    /// Start, restart or stop clangd so it matches `settings`.
    async fn sync_clangd(&self, settings: &BasiliskSettings, qcc_available: bool) {
        let bridge = &self.inner.bridge;
        let wanted = settings.clangd_proxy_enabled() && !qcc_available;
        if !wanted {
            if bridge.stop().await {
                log::info!(target: LOG_TARGET, "clangd not needed, session stopped");
                self.inner.documents.clear_peer();
                self.republish_all().await;
            }
            return;
        }

        let workspace = self.workspace();
        let plan = LaunchPlan::resolve(settings, workspace.root.as_deref());
        let context = InitializeContext {
            root_uri: workspace.root_uri.clone(),
            workspace_folders: workspace.folders.clone(),
            capabilities: workspace.capabilities.clone(),
        };

        match bridge.ensure(plan, context).await {
            Ok(EnsureOutcome::Reused) => {}
            Ok(EnsureOutcome::Started { replaced }) => {
                log::info!(target: LOG_TARGET, "clangd started");
                if replaced {
                    self.inner.documents.clear_peer();
                    self.republish_all().await;
                }
                for doc in self.inner.documents.snapshots() {
                    if bridge.peer_has_document(doc.uri.as_str()) {
                        continue;
                    }
                    self.forward_did_open(&doc.uri, &doc.language_id, doc.version, &doc.text);
                }
            }
            Err(e) => {
                self.inner.documents.clear_peer();
                let message = format!("clangd error: {}", e);
                log::warn!(target: LOG_TARGET, "{}", message);
                if !qcc_available {
                    self.client.log_message(MessageType::ERROR, message.clone()).await;
                    self.client.show_message(MessageType::ERROR, message).await;
                }
            }
        }
    }

    /// Republish the stored diagnostics of every open document.
    async fn republish_all(&self) {
        for doc in self.inner.documents.snapshots() {
            let settings = self.settings_for(&doc.uri).await;
            self.publish_stored(&doc.uri, &settings).await;
        }
    }

    pub(super) fn revalidate_open_documents(&self) {
        for doc in self.inner.documents.snapshots() {
            self.spawn_validation(doc.uri, ValidationTrigger::Open);
        }
    }

    /// Drain clangd diagnostic pushes for the lifetime of the server.
    pub(super) fn spawn_peer_diagnostics_consumer(&self) {
        let Some(mut rx) = lock(&self.inner.peer_diagnostics).take() else {
            return;
        };
        let server = self.clone();
        tokio::spawn(async move {
            while let Some(push) = rx.recv().await {
                let _ = server.accept_peer_diagnostics(push);
            }
            log::debug!(target: LOG_TARGET, "Peer diagnostics channel closed");
        });
    }

    /// Tag a clangd push and store it once its settings are resolved.
    ///
    /// Returns the storing task, or `None` when the push was dropped.
    fn accept_peer_diagnostics(&self, push: PeerDiagnostics) -> Option<JoinHandle<()>> {
        let tag = match self.inner.documents.tag_push(&push.uri, push.version) {
            PushAdmission::Tagged(tag) => tag,
            PushAdmission::Outdated { pushed, current } => {
                log::debug!(
                    target: LOG_TARGET,
                    "Dropping clangd diagnostics for {} v{} (buffer is v{})",
                    push.uri.as_str(),
                    pushed,
                    current
                );
                return None;
            }
            PushAdmission::NotOpen => {
                log::trace!(
                    target: LOG_TARGET,
                    "Dropping clangd diagnostics for unopened {}",
                    push.uri.as_str()
                );
                return None;
            }
        };
        let server = self.clone();
        Some(tokio::spawn(async move {
            let PeerDiagnostics { uri, diagnostics, .. } = push;
            let settings = server.settings_for(&uri).await;
            let text = server.inner.documents.text(&uri);
            let peer = select_peer_diagnostics(
                normalize_source(diagnostics),
                settings.clangd.diagnostics_mode,
                text.as_deref(),
            );
            if !server.inner.documents.store_peer(&uri, tag, peer) {
                return;
            }
            if settings.diagnostics_on_type {
                server.publish_stored(&uri, &settings).await;
            }
        }))
    }
}
