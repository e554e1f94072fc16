//! Launch plans and the fingerprint that decides when clangd restarts.

use std::path::Path;

use serde::Serialize;

use super::connection::LaunchCommand;
use crate::config::{
    BasiliskSettings, basilisk_include_flags, merge_flags, resolve_basilisk_root,
    resolve_path_setting,
};

/// Everything needed to launch and initialize clangd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub command: LaunchCommand,
    pub compile_commands_dir: String,
    pub fallback_flags: Vec<String>,
}

impl LaunchPlan {
    /// Derive the plan from settings.
    ///
    /// The compile database directory comes from `clangd.compileCommandsDir`,
    /// then the Basilisk root. Fallback flags gain the Basilisk include
    /// directories.
    pub fn resolve(settings: &BasiliskSettings, workspace_root: Option<&Path>) -> Self {
        let basilisk_root = resolve_basilisk_root(settings, workspace_root);

        let configured_dir = resolve_path_setting(&settings.clangd.compile_commands_dir, workspace_root);
        let compile_commands_dir = if !configured_dir.is_empty() {
            configured_dir
        } else {
            basilisk_root
                .as_ref()
                .map(|root| root.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let mut args = settings.clangd.args.clone();
        if !compile_commands_dir.is_empty() {
            args.push(format!("--compile-commands-dir={}", compile_commands_dir));
        }

        let derived = basilisk_root
            .as_deref()
            .map(basilisk_include_flags)
            .unwrap_or_default();
        let fallback_flags = merge_flags(&settings.clangd.fallback_flags, &derived);

        let program = if settings.clangd.path.trim().is_empty() {
            "clangd".to_string()
        } else {
            settings.clangd.path.trim().to_string()
        };

        Self {
            command: LaunchCommand { program, args },
            compile_commands_dir,
            fallback_flags,
        }
    }

    pub fn fingerprint(&self) -> ConfigFingerprint {
        ConfigFingerprint::of(self)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintFields<'a> {
    path: &'a str,
    args: &'a [String],
    compile_commands_dir: &'a str,
    fallback_flags: &'a [String],
}

/// Deterministic serialization of the restart-relevant configuration.
///
/// Two plans with equal fingerprints share a clangd process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigFingerprint(String);

impl ConfigFingerprint {
    fn of(plan: &LaunchPlan) -> Self {
        let fields = FingerprintFields {
            path: &plan.command.program,
            args: &plan.command.args,
            compile_commands_dir: &plan.compile_commands_dir,
            fallback_flags: &plan.fallback_flags,
        };
        // Serializing borrowed strings and slices cannot fail.
        Self(serde_json::to_string(&fields).unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
