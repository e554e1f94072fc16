//! Validation cycles and diagnostic publishing.

use tower_lsp_server::ls_types::Uri;

use super::super::{LOG_TARGET, QccLs};
use crate::config::BasiliskSettings;
use crate::diagnostics::{fuse, quick_validate, run_diagnostics};

const DIAGNOSTICS_TARGET: &str = "qcc_lsp::diagnostics";

/// What caused a validation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValidationTrigger {
    Open,
    Change,
    Save,
}

/// Which checks a cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CyclePlan {
    heuristics: bool,
    qcc: bool,
}

impl ValidationTrigger {
    /// `None` when the trigger is switched off in `settings`.
    fn plan(self, settings: &BasiliskSettings) -> Option<CyclePlan> {
        let on_type = settings.diagnostics_on_type;
        let on_save = settings.diagnostics_on_save;
        match self {
            ValidationTrigger::Change if !on_type => None,
            ValidationTrigger::Save if !on_save => None,
            ValidationTrigger::Open => Some(CyclePlan {
                heuristics: true,
                qcc: settings.enable_diagnostics && on_save,
            }),
            ValidationTrigger::Change | ValidationTrigger::Save => Some(CyclePlan {
                heuristics: true,
                qcc: settings.enable_diagnostics,
            }),
        }
    }
}

impl QccLs {
    /// Run one validation cycle and publish its result if it is still current.
    pub(in crate::lsp::lsp_impl) async fn validate(&self, uri: Uri, trigger: ValidationTrigger) {
        if !self.inner.documents.contains(&uri) {
            return;
        }
        let settings = self.settings_for(&uri).await;
        let Some(plan) = trigger.plan(&settings) else {
            return;
        };
        let Some((ticket, snapshot)) = self.inner.documents.begin_cycle(&uri) else {
            return;
        };
        log::debug!(
            target: DIAGNOSTICS_TARGET,
            "Validating {} v{} ({:?})",
            uri.as_str(),
            ticket.version(),
            trigger
        );

        let mut local = Vec::new();
        if plan.heuristics {
            local.extend(quick_validate(&snapshot.text));
        }
        if plan.qcc {
            match run_diagnostics(uri.as_str(), &snapshot.text, &settings).await {
                Ok(run) => local.extend(run.diagnostics),
                Err(e) => log::warn!(target: DIAGNOSTICS_TARGET, "qcc diagnostics failed: {}", e),
            }
        }

        if !self.inner.documents.finish_cycle(&uri, ticket, local) {
            log::debug!(
                target: DIAGNOSTICS_TARGET,
                "Discarding stale diagnostics for {} v{}",
                uri.as_str(),
                ticket.version()
            );
            return;
        }
        self.publish_stored(&uri, &settings).await;
    }

    /// Publish the fused peer and local diagnostics stored for `uri`.
    pub(in crate::lsp::lsp_impl) async fn publish_stored(&self, uri: &Uri, settings: &BasiliskSettings) {
        let Some((peer, local)) = self.inner.documents.diagnostics(uri) else {
            return;
        };
        let diagnostics = fuse(&peer, &local, settings.max_number_of_problems);
        log::trace!(
            target: LOG_TARGET,
            "Publishing {} diagnostics for {}",
            diagnostics.len(),
            uri.as_str()
        );
        self.client
            .publish_diagnostics(uri.clone(), diagnostics, None)
            .await;
    }
}
