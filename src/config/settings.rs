use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_MAX_PROBLEMS: usize = 100;

/// Effective settings for one document or one CLI run.
///
/// Field names follow the editor's `basilisk` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasiliskSettings {
    pub qcc_path: String,
    pub basilisk_path: String,
    pub enable_diagnostics: bool,
    pub diagnostics_on_save: bool,
    pub diagnostics_on_type: bool,
    #[serde(deserialize_with = "lenient_max_problems")]
    pub max_number_of_problems: usize,
    pub qcc: QccSettings,
    pub clangd: ClangdSettings,
}

impl Default for BasiliskSettings {
    fn default() -> Self {
        Self {
            qcc_path: "qcc".to_string(),
            basilisk_path: String::new(),
            enable_diagnostics: true,
            diagnostics_on_save: true,
            diagnostics_on_type: false,
            max_number_of_problems: DEFAULT_MAX_PROBLEMS,
            qcc: QccSettings::default(),
            clangd: ClangdSettings::default(),
        }
    }
}

impl BasiliskSettings {
    /// clangd runs as a proxy for editor requests.
    pub fn clangd_proxy_enabled(&self) -> bool {
        self.clangd.enabled && self.clangd.mode == ClangdMode::Proxy
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QccSettings {
    pub include_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClangdSettings {
    pub enabled: bool,
    #[serde(deserialize_with = "lenient_mode")]
    pub mode: ClangdMode,
    pub path: String,
    pub args: Vec<String>,
    pub compile_commands_dir: String,
    pub fallback_flags: Vec<String>,
    #[serde(deserialize_with = "lenient_diagnostics_mode")]
    pub diagnostics_mode: DiagnosticsMode,
}

impl Default for ClangdSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ClangdMode::Proxy,
            path: "clangd".to_string(),
            args: Vec::new(),
            compile_commands_dir: String::new(),
            fallback_flags: Vec::new(),
            diagnostics_mode: DiagnosticsMode::Filtered,
        }
    }
}

/// How clangd participates.
///
/// `Augment` leaves navigation to another clangd the editor runs itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClangdMode {
    #[default]
    Proxy,
    Augment,
    Disabled,
}

impl ClangdMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "proxy" => Some(ClangdMode::Proxy),
            "augment" => Some(ClangdMode::Augment),
            "disabled" => Some(ClangdMode::Disabled),
            _ => None,
        }
    }
}

/// Which clangd diagnostics reach the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticsMode {
    All,
    #[default]
    Filtered,
    None,
}

impl DiagnosticsMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(DiagnosticsMode::All),
            "filtered" => Some(DiagnosticsMode::Filtered),
            "none" => Some(DiagnosticsMode::None),
            _ => None,
        }
    }
}

fn lenient_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ClangdMode, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(match value.as_deref() {
        None => ClangdMode::default(),
        Some(raw) => ClangdMode::parse(raw).unwrap_or_else(|| {
            log::warn!(
                target: "qcc_lsp::settings",
                "Unknown clangd.mode '{}', using proxy",
                raw
            );
            ClangdMode::Proxy
        }),
    })
}

fn lenient_diagnostics_mode<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DiagnosticsMode, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(match value.as_deref() {
        None => DiagnosticsMode::default(),
        Some(raw) => DiagnosticsMode::parse(raw).unwrap_or_else(|| {
            log::warn!(
                target: "qcc_lsp::settings",
                "Unknown clangd.diagnosticsMode '{}', using filtered",
                raw
            );
            DiagnosticsMode::Filtered
        }),
    })
}

/// Non-positive or non-numeric values fall back to the default cap.
fn lenient_max_problems<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let parsed = value.as_ref().and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 1.0).map(|f| f as u64))
    });
    Ok(match parsed {
        Some(n) if n > 0 => n as usize,
        _ => DEFAULT_MAX_PROBLEMS,
    })
}
