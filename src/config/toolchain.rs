//! Locating the Basilisk installation and its `qcc` compiler.

use std::path::{Path, PathBuf};

use super::paths::{expand_tilde, resolve_executable, resolve_path_setting};
use super::settings::BasiliskSettings;

const WELL_KNOWN_QCC: &[&str] = &["/opt/homebrew/bin/qcc", "/usr/local/bin/qcc"];

fn basilisk_env() -> Option<String> {
    std::env::var("BASILISK")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Basilisk root: the `basiliskPath` setting, then `$BASILISK`, then the
/// directory holding the resolved `qcc`.
pub fn resolve_basilisk_root(
    settings: &BasiliskSettings,
    workspace_root: Option<&Path>,
) -> Option<PathBuf> {
    let configured = resolve_path_setting(&settings.basilisk_path, workspace_root);
    if !configured.is_empty() {
        return Some(PathBuf::from(configured));
    }
    if let Some(env_root) = basilisk_env() {
        return Some(expand_tilde(&env_root));
    }
    let qcc = if settings.qcc_path.trim().is_empty() {
        "qcc"
    } else {
        settings.qcc_path.as_str()
    };
    resolve_executable(qcc).and_then(|path| path.parent().map(Path::to_path_buf))
}

/// Places `qcc` may live, most specific first.
pub fn qcc_candidates(settings: &BasiliskSettings) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    push(settings.qcc_path.trim().to_string());

    let mut roots = Vec::new();
    if !settings.basilisk_path.trim().is_empty() {
        roots.push(settings.basilisk_path.trim().to_string());
    }
    if let Some(env_root) = basilisk_env() {
        if !roots.contains(&env_root) {
            roots.push(env_root);
        }
    }
    for root in roots {
        let root = expand_tilde(&root);
        push(root.join("qcc").to_string_lossy().into_owned());
        push(root.join("bin").join("qcc").to_string_lossy().into_owned());
    }

    for well_known in WELL_KNOWN_QCC {
        push((*well_known).to_string());
    }
    candidates
}

/// The first candidate that resolves to an executable, or the configured
/// `qccPath` when none does.
pub fn resolve_qcc_path(settings: &BasiliskSettings) -> String {
    qcc_candidates(settings)
        .iter()
        .find_map(|candidate| resolve_executable(candidate))
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|| settings.qcc_path.clone())
}

/// Include flags clangd needs to see Basilisk headers.
pub fn basilisk_include_flags(root: &Path) -> Vec<String> {
    let root = root.to_string_lossy();
    vec![
        format!("-I{}", root),
        format!("-I{}/grid", root),
        format!("-I{}/navier-stokes", root),
        format!("-I{}/ast", root),
    ]
}
