//! Restart gating for the clangd session.
//!
//! The [`BridgeManager`] keeps at most one [`ClangdBridge`]. `ensure` reuses
//! it when the configuration fingerprint is unchanged and the session is
//! Ready. Otherwise the old session is stopped before a new one is started.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use super::actor::DiagnosticsSink;
use super::config_key::{ConfigFingerprint, LaunchPlan};
use super::connection::{PeerLauncher, ProcessLauncher};
use super::protocol::InitializeContext;
use super::session::ClangdBridge;
use crate::error::{BridgeError, BridgeResult};

/// What `ensure` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnsureOutcome {
    /// The live session already matched.
    Reused,
    /// A new session was started. `replaced` is true when an older one was stopped first.
    Started { replaced: bool },
}

struct Current {
    fingerprint: ConfigFingerprint,
    bridge: Arc<ClangdBridge>,
}

pub(crate) struct BridgeManager {
    launcher: Arc<dyn PeerLauncher>,
    diagnostics: DiagnosticsSink,
    /// Serializes ensure/stop so two processes never overlap.
    gate: Mutex<()>,
    current: std::sync::Mutex<Option<Current>>,
}

impl BridgeManager {
    pub(crate) fn new(diagnostics: DiagnosticsSink) -> Self {
        Self::with_launcher(Arc::new(ProcessLauncher), diagnostics)
    }

    pub(crate) fn with_launcher(launcher: Arc<dyn PeerLauncher>, diagnostics: DiagnosticsSink) -> Self {
        Self {
            launcher,
            diagnostics,
            gate: Mutex::new(()),
            current: std::sync::Mutex::new(None),
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<Current>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The current session, whatever its state.
    pub(crate) fn bridge(&self) -> Option<Arc<ClangdBridge>> {
        self.lock_current()
            .as_ref()
            .map(|current| Arc::clone(&current.bridge))
    }

    /// The current session if it is Ready.
    pub(crate) fn ready_bridge(&self) -> Option<Arc<ClangdBridge>> {
        self.bridge().filter(|bridge| bridge.is_ready())
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready_bridge().is_some()
    }

    /// Make sure a Ready session matching `plan` exists.
    ///
    /// On failure the new session is left stopped and removed.
    pub(crate) async fn ensure(
        &self,
        plan: LaunchPlan,
        context: InitializeContext,
    ) -> BridgeResult<EnsureOutcome> {
        let _gate = self.gate.lock().await;
        let fingerprint = plan.fingerprint();

        let previous = {
            let mut current = self.lock_current();
            if let Some(live) = current.as_ref() {
                if live.fingerprint == fingerprint && live.bridge.is_ready() {
                    return Ok(EnsureOutcome::Reused);
                }
            }
            current.take()
        };

        let replaced = previous.is_some();
        if let Some(previous) = previous {
            log::info!(
                target: "qcc_lsp::bridge",
                "Restarting clangd (configuration changed or session not ready)"
            );
            previous.bridge.stop().await;
        }

        let bridge = Arc::new(ClangdBridge::new(
            Arc::clone(&self.launcher),
            plan,
            context,
            self.diagnostics.clone(),
        ));
        *self.lock_current() = Some(Current {
            fingerprint,
            bridge: Arc::clone(&bridge),
        });

        if let Err(e) = bridge.start().await {
            let mut current = self.lock_current();
            if current
                .as_ref()
                .is_some_and(|c| Arc::ptr_eq(&c.bridge, &bridge))
            {
                *current = None;
            }
            return Err(e);
        }
        Ok(EnsureOutcome::Started { replaced })
    }

    /// Stop and forget the current session. Returns whether one existed.
    pub(crate) async fn stop(&self) -> bool {
        let _gate = self.gate.lock().await;
        let previous = self.lock_current().take();
        match previous {
            Some(previous) => {
                previous.bridge.stop().await;
                true
            }
            None => false,
        }
    }

    /// Whether the current session already has `uri` open.
    pub(crate) fn peer_has_document(&self, uri: &str) -> bool {
        self.bridge().is_some_and(|bridge| bridge.has_document(uri))
    }

    /// Forward a notification to the current session, if any.
    pub(crate) fn notify(&self, method: &str, params: Value) {
        if let Some(bridge) = self.bridge() {
            bridge.notify(method, params);
        }
    }

    pub(crate) async fn request(&self, method: &str, params: Value) -> BridgeResult<Value> {
        match self.bridge() {
            Some(bridge) => bridge.request(method, params).await,
            None => Err(BridgeError::NotRunning),
        }
    }
}
