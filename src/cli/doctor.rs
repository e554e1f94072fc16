use std::fmt;
use std::path::PathBuf;

use super::CommonArgs;
use crate::config::{BasiliskSettings, resolve_basilisk_root, resolve_executable, resolve_qcc_path};
use crate::diagnostics::check_qcc_available;
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Found(String),
    Missing(String),
    Disabled,
}

impl ToolStatus {
    fn is_found(&self) -> bool {
        matches!(self, ToolStatus::Found(_))
    }

    fn label(&self) -> String {
        match self {
            ToolStatus::Found(path) => format!("found({})", path),
            ToolStatus::Missing(path) => format!("missing({})", path),
            ToolStatus::Disabled => "disabled".to_string(),
        }
    }
}

/// What the current settings can reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub qcc: ToolStatus,
    pub clangd: ToolStatus,
    pub basilisk_root: Option<PathBuf>,
    /// clangd would stand in for qcc.
    pub clangd_fallback: bool,
}

impl DoctorReport {
    pub(crate) fn assemble(
        settings: &BasiliskSettings,
        qcc_available: bool,
        clangd_path: Option<PathBuf>,
        basilisk_root: Option<PathBuf>,
    ) -> Self {
        let qcc = if !settings.enable_diagnostics {
            ToolStatus::Disabled
        } else if qcc_available {
            ToolStatus::Found(resolve_qcc_path(settings))
        } else {
            ToolStatus::Missing(settings.qcc_path.clone())
        };
        let clangd = if !settings.clangd.enabled {
            ToolStatus::Disabled
        } else {
            match clangd_path {
                Some(path) => ToolStatus::Found(path.to_string_lossy().into_owned()),
                None => ToolStatus::Missing(settings.clangd.path.clone()),
            }
        };
        Self {
            qcc,
            clangd,
            basilisk_root,
            clangd_fallback: settings.clangd_proxy_enabled() && !qcc_available,
        }
    }

    /// 0 when qcc or clangd can produce diagnostics, 2 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.qcc.is_found() || self.clangd.is_found() { 0 } else { 2 }
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let basilisk = self
            .basilisk_root
            .as_ref()
            .map(|root| root.display().to_string())
            .unwrap_or_else(|| "unset".to_string());
        write!(
            f,
            "qcc={} | clangd={} | basilisk={} | clangd_fallback={}",
            self.qcc.label(),
            self.clangd.label(),
            basilisk,
            if self.clangd_fallback { "on" } else { "off" }
        )
    }
}

/// Resolve tool locations for settings found from the current directory.
pub async fn run_doctor(args: &CommonArgs) -> Result<DoctorReport, CliError> {
    let cwd = std::env::current_dir()?;
    let settings = args.load_settings(&cwd, &cwd)?;

    let qcc_available = settings.enable_diagnostics && check_qcc_available(&resolve_qcc_path(&settings)).await;
    let clangd_path = if settings.clangd.enabled {
        resolve_executable(&settings.clangd.path)
    } else {
        None
    };
    let basilisk_root = resolve_basilisk_root(&settings, Some(&cwd));
    Ok(DoctorReport::assemble(&settings, qcc_available, clangd_path, basilisk_root))
}
