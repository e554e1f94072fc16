use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use path_clean::PathClean;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower_lsp_server::ls_types::{Diagnostic, DiagnosticSeverity};

use super::report::{render_json, render_text};
use super::wrapper::header_wrapper;
use super::{CommonArgs, LOG_TARGET};
use crate::config::{BasiliskSettings, path_to_uri, resolve_qcc_path};
use crate::diagnostics::{
    check_qcc_available, dedupe_and_cap, normalize_source, quick_validate, run_diagnostics,
    select_peer_diagnostics,
};
use crate::error::{BridgeResult, CliError};
use crate::lsp::LaunchPlan;
use crate::lsp::bridge::{ClangdBridge, InitializeContext, PeerLauncher, ProcessLauncher};

/// How long a one-shot clangd session waits for the file's diagnostics.
pub(crate) const CLANGD_DIAGNOSTICS_WAIT: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Some(DiagnosticSeverity::ERROR))
    }

    pub fn exit_code(&self) -> i32 {
        if self.has_errors() { 1 } else { 0 }
    }

    pub fn render(&self, json: bool) -> Result<String, CliError> {
        if json {
            render_json(&self.diagnostics).map_err(|e| CliError::Io(std::io::Error::other(e)))
        } else {
            Ok(render_text(&self.path, &self.diagnostics))
        }
    }
}

/// Diagnose `file` with every source the settings allow.
pub async fn run_check(file: &Path, args: &CommonArgs) -> Result<CheckOutcome, CliError> {
    let cwd = std::env::current_dir()?;
    let path = cwd.join(file).clean();
    if !path.is_file() {
        return Err(CliError::FileNotFound(path));
    }
    let content = tokio::fs::read_to_string(&path).await?;
    let dir = path.parent().unwrap_or(&cwd).to_path_buf();
    let settings = args.load_settings(&dir, &cwd)?;
    let uri = path_to_uri(&path).unwrap_or_else(|| path.to_string_lossy().into_owned());

    let mut diagnostics = quick_validate(&content);

    // Checking qcc spawns it, so skip the check when qcc is off.
    let qcc_available = settings.enable_diagnostics && check_qcc_available(&resolve_qcc_path(&settings)).await;
    if settings.enable_diagnostics {
        let qcc_input = if args.wrap_header {
            header_wrapper(&path, &args.wrap_include)
        } else {
            content.clone()
        };
        match run_diagnostics(&uri, &qcc_input, &settings).await {
            Ok(run) => diagnostics.extend(run.diagnostics),
            Err(e) => log::warn!(target: LOG_TARGET, "qcc diagnostics failed: {}", e),
        }
    }

    let run_clangd = settings.clangd_proxy_enabled() && !qcc_available;
    if run_clangd {
        let peer = clangd_diagnostics(Arc::new(ProcessLauncher), &path, &uri, &content, &settings).await?;
        diagnostics.extend(peer);
    } else if settings.enable_diagnostics && !qcc_available {
        return Err(CliError::NoDiagnosticSource);
    }

    Ok(CheckOutcome {
        path,
        diagnostics: dedupe_and_cap(diagnostics, settings.max_number_of_problems),
    })
}

/// Start clangd, open the file, take its first diagnostics push and stop.
///
/// No push within [`CLANGD_DIAGNOSTICS_WAIT`] counts as no diagnostics.
pub(crate) async fn clangd_diagnostics(
    launcher: Arc<dyn PeerLauncher>,
    path: &Path,
    uri: &str,
    content: &str,
    settings: &BasiliskSettings,
) -> BridgeResult<Vec<Diagnostic>> {
    let root = path.parent();
    let context = InitializeContext {
        root_uri: root.and_then(path_to_uri),
        workspace_folders: None,
        capabilities: Value::Null,
    };
    let plan = LaunchPlan::resolve(settings, root);
    log::debug!(target: LOG_TARGET, "Running {}", plan.command.display());

    let (sink, mut pushes) = mpsc::unbounded_channel();
    let bridge = ClangdBridge::new(launcher, plan, context, sink);
    bridge.start().await?;
    bridge.notify(
        "textDocument/didOpen",
        json!({
            "textDocument": { "uri": uri, "languageId": "c", "version": 1, "text": content }
        }),
    );

    let first_push = async {
        while let Some(push) = pushes.recv().await {
            if push.uri.as_str() == uri {
                return push.diagnostics;
            }
        }
        Vec::new()
    };
    let diagnostics = match tokio::time::timeout(CLANGD_DIAGNOSTICS_WAIT, first_push).await {
        Ok(diagnostics) => diagnostics,
        Err(_) => {
            log::debug!(target: LOG_TARGET, "No clangd diagnostics for {} in time", uri);
            Vec::new()
        }
    };
    bridge.stop().await;

    Ok(select_peer_diagnostics(
        normalize_source(diagnostics),
        settings.clangd.diagnostics_mode,
        Some(content),
    ))
}
