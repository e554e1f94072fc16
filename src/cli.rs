//! Command-line checks that run without an editor.
//!
//! `check` validates one file and `doctor` reports which diagnostic sources
//! the current settings can reach. Both share [`CommonArgs`].

mod check;
mod doctor;
mod report;
mod wrapper;

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use crate::config::{BasiliskSettings, DEFAULT_MAX_PROBLEMS, DiagnosticsMode, resolve_path_setting};
use crate::error::CliError;
use crate::lsp::{SettingsEventKind, SettingsRequest, load_settings};

pub use check::{CheckOutcome, run_check};
pub use doctor::{DoctorReport, ToolStatus, run_doctor};
pub use report::{format_diagnostic, severity_label};
pub use wrapper::{DEFAULT_WRAP_INCLUDE, header_wrapper};

const LOG_TARGET: &str = "qcc_lsp::cli";

/// Flags shared by `check` and `doctor`.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CommonArgs {
    /// Print diagnostics as a JSON array
    #[arg(long)]
    pub json: bool,

    /// Maximum number of diagnostics to report
    #[arg(long, value_name = "N")]
    pub max_problems: Option<String>,

    /// Path to qcc
    #[arg(long, value_name = "PATH")]
    pub qcc_path: Option<String>,

    /// Basilisk root (overrides $BASILISK)
    #[arg(long, value_name = "PATH")]
    pub basilisk_path: Option<String>,

    /// Use this .comphy-basilisk file instead of searching for one
    #[arg(long, value_name = "PATH")]
    pub project_config: Option<PathBuf>,

    /// Disable qcc diagnostics
    #[arg(long)]
    pub no_qcc: bool,

    /// Extra include directory for qcc (repeatable)
    #[arg(long = "qcc-include", value_name = "DIR")]
    pub qcc_include: Vec<String>,

    /// Enable clangd in proxy mode
    #[arg(long, overrides_with = "no_clangd")]
    pub clangd: bool,

    /// Disable clangd
    #[arg(long, overrides_with = "clangd")]
    pub no_clangd: bool,

    /// Path to clangd
    #[arg(long, value_name = "PATH")]
    pub clangd_path: Option<String>,

    /// Extra clangd argument (repeatable)
    #[arg(long = "clangd-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub clangd_arg: Vec<String>,

    /// Directory containing compile_commands.json
    #[arg(long, value_name = "DIR")]
    pub compile_commands_dir: Option<String>,

    /// Extra clangd fallback flag (repeatable)
    #[arg(long = "fallback-flag", value_name = "FLAG", allow_hyphen_values = true)]
    pub fallback_flag: Vec<String>,

    /// Which clangd diagnostics to keep
    #[arg(long = "clangd-diagnostics", value_enum, value_name = "MODE")]
    pub clangd_diagnostics: Option<DiagnosticsMode>,

    /// Compile a header through a temporary translation unit
    #[arg(long)]
    pub wrap_header: bool,

    /// Include placed before the header in the wrapper (repeatable)
    #[arg(long = "wrap-include", value_name = "HEADER")]
    pub wrap_include: Vec<String>,

    /// Verbose logging, including clangd's stderr
    #[arg(long)]
    pub verbose: bool,
}

/// Positive integers are taken as-is. Anything else means the default.
fn parse_max_problems(value: &str) -> usize {
    match value.trim().parse::<i64>() {
        Ok(n) if n > 0 => n as usize,
        _ => DEFAULT_MAX_PROBLEMS,
    }
}

impl CommonArgs {
    fn clangd_enabled(&self) -> Option<bool> {
        if self.no_clangd {
            Some(false)
        } else if self.clangd {
            Some(true)
        } else {
            None
        }
    }

    /// Settings layer built from the flags that were given. Relative include
    /// directories resolve against `cwd`.
    pub fn overrides(&self, cwd: &Path) -> Value {
        let mut root = Map::new();
        if let Some(path) = &self.qcc_path {
            root.insert("qccPath".into(), json!(path));
        }
        if let Some(path) = &self.basilisk_path {
            root.insert("basiliskPath".into(), json!(path));
        }
        if self.no_qcc {
            root.insert("enableDiagnostics".into(), json!(false));
        }
        if let Some(max) = &self.max_problems {
            root.insert("maxNumberOfProblems".into(), json!(parse_max_problems(max)));
        }
        if !self.qcc_include.is_empty() {
            let includes: Vec<String> = self
                .qcc_include
                .iter()
                .map(|dir| resolve_path_setting(dir, Some(cwd)))
                .collect();
            root.insert("qcc".into(), json!({ "includePaths": includes }));
        }

        let mut clangd = Map::new();
        if let Some(enabled) = self.clangd_enabled() {
            clangd.insert("enabled".into(), json!(enabled));
            clangd.insert("mode".into(), json!(if enabled { "proxy" } else { "disabled" }));
        }
        if let Some(path) = &self.clangd_path {
            clangd.insert("path".into(), json!(path));
        }
        if !self.clangd_arg.is_empty() {
            clangd.insert("args".into(), json!(self.clangd_arg));
        }
        if let Some(dir) = &self.compile_commands_dir {
            clangd.insert("compileCommandsDir".into(), json!(dir));
        }
        if !self.fallback_flag.is_empty() {
            clangd.insert("fallbackFlags".into(), json!(self.fallback_flag));
        }
        if let Some(mode) = self.clangd_diagnostics {
            clangd.insert("diagnosticsMode".into(), json!(mode));
        }
        if !clangd.is_empty() {
            root.insert("clangd".into(), Value::Object(clangd));
        }
        Value::Object(root)
    }

    /// Resolve settings for a run whose project config search starts at
    /// `search_start`.
    pub fn load_settings(&self, search_start: &Path, cwd: &Path) -> Result<BasiliskSettings, CliError> {
        let request = SettingsRequest {
            search_start: Some(search_start),
            explicit_project_config: self.project_config.as_deref(),
            overrides: Some(self.overrides(cwd)),
            ..Default::default()
        };
        let outcome = load_settings(&request)?;
        for event in outcome.events {
            match event.kind {
                SettingsEventKind::Info => log::info!(target: LOG_TARGET, "{}", event.message),
                SettingsEventKind::Warning => log::warn!(target: LOG_TARGET, "{}", event.message),
            }
        }
        Ok(outcome.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClangdMode;
    use clap::Parser;
    use rstest::rstest;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CommonArgs,
    }

    fn parse(argv: &[&str]) -> CommonArgs {
        Harness::parse_from(std::iter::once("qcc-lsp").chain(argv.iter().copied())).args
    }

    #[test]
    fn no_flags_means_no_overrides() {
        assert_eq!(parse(&[]).overrides(Path::new("/cwd")), json!({}));
    }

    #[test]
    fn clangd_toggle_sets_enabled_and_mode() {
        let overrides = parse(&["--no-clangd"]).overrides(Path::new("/cwd"));
        assert_eq!(overrides["clangd"], json!({"enabled": false, "mode": "disabled"}));

        let overrides = parse(&["--no-clangd", "--clangd"]).overrides(Path::new("/cwd"));
        assert_eq!(overrides["clangd"], json!({"enabled": true, "mode": "proxy"}));
    }

    #[test]
    fn include_dirs_resolve_against_cwd() {
        let overrides =
            parse(&["--qcc-include", "inc", "--qcc-include", "/abs"]).overrides(Path::new("/work"));
        assert_eq!(overrides["qcc"]["includePaths"], json!(["/work/inc", "/abs"]));
    }

    #[test]
    fn hyphenated_values_are_accepted_for_repeatable_flags() {
        let args = parse(&["--clangd-arg", "--log=verbose", "--fallback-flag", "-DDIM=2"]);
        assert_eq!(args.clangd_arg, ["--log=verbose"]);
        assert_eq!(args.fallback_flag, ["-DDIM=2"]);
        assert_eq!(
            parse(&["--clangd-diagnostics", "none"]).overrides(Path::new("/"))["clangd"]["diagnosticsMode"],
            "none"
        );
    }

    #[rstest]
    #[case("25", 25)]
    #[case("0", DEFAULT_MAX_PROBLEMS)]
    #[case("-3", DEFAULT_MAX_PROBLEMS)]
    #[case("lots", DEFAULT_MAX_PROBLEMS)]
    fn max_problems_falls_back_to_default(#[case] raw: &str, #[case] expected: usize) {
        assert_eq!(parse_max_problems(raw), expected);
    }

    #[test]
    fn overrides_win_over_project_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(
            dir.path().join(".comphy-basilisk"),
            r#"{"qccPath": "/project/qcc", "clangd": {"path": "/project/clangd"}}"#,
        )
        .unwrap();

        let args = parse(&["--qcc-path", "/flag/qcc", "--no-clangd"]);
        let request = SettingsRequest {
            search_start: Some(dir.path()),
            overrides: Some(args.overrides(dir.path())),
            skip_user_config: true,
            ..Default::default()
        };
        let settings = load_settings(&request).unwrap().settings;
        assert_eq!(settings.qcc_path, "/flag/qcc");
        assert_eq!(settings.clangd.path, "/project/clangd");
        assert_eq!(settings.clangd.mode, ClangdMode::Disabled);
        assert!(!settings.clangd.enabled);
    }

    #[test]
    fn missing_explicit_project_config_is_an_error() {
        let args = parse(&["--project-config", "/definitely/not/here/.comphy-basilisk"]);
        let err = args
            .load_settings(Path::new("/"), Path::new("/"))
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
