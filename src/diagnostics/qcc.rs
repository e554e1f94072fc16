//! One-shot `qcc` invocation.
//!
//! The document text is written to a temp file next to nothing else, `qcc
//! -fsyntax-only` runs from the temp dir, and gcc-style output is mapped back
//! onto the document.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use tokio::process::Command;
use tower_lsp_server::ls_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use super::SOURCE_LOCAL;
use super::gcc_output::parse_gcc_output;
use crate::config::{BasiliskSettings, find_src_local_dir, resolve_executable, resolve_qcc_path, uri_to_path};
use crate::error::QccError;

pub const QCC_TIMEOUT: Duration = Duration::from_secs(30);
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Diagnostics from one run plus the combined stderr/stdout text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QccRun {
    pub diagnostics: Vec<Diagnostic>,
    pub raw_output: String,
}

/// Run qcc on `text` as if it were the document at `document_uri`.
///
/// A missing binary yields a single warning diagnostic instead of an error.
pub async fn run_diagnostics(
    document_uri: &str,
    text: &str,
    settings: &BasiliskSettings,
) -> Result<QccRun, QccError> {
    run_diagnostics_with_timeout(document_uri, text, settings, QCC_TIMEOUT).await
}

pub(crate) async fn run_diagnostics_with_timeout(
    document_uri: &str,
    text: &str,
    settings: &BasiliskSettings,
    timeout: Duration,
) -> Result<QccRun, QccError> {
    if !settings.enable_diagnostics {
        return Ok(QccRun::default());
    }

    let qcc = resolve_qcc_path(settings);
    let document_path = uri_to_path(document_uri).unwrap_or_else(|| PathBuf::from(document_uri));
    let document_name = document_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.c".to_string());

    let suffix = if document_name.ends_with(".c") {
        format!("_{}", document_name)
    } else {
        format!("_{}.c", document_name)
    };
    let temp = tempfile::Builder::new()
        .prefix("basilisk_")
        .suffix(&suffix)
        .tempfile()?;
    tokio::fs::write(temp.path(), text).await?;

    let temp_dir = temp
        .path()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    let temp_base = temp
        .path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let document_dir = document_path.parent().filter(|dir| !dir.as_os_str().is_empty());
    let src_local = document_dir.and_then(find_src_local_dir);
    let args = qcc_args(
        document_dir,
        src_local.as_deref(),
        &settings.qcc.include_paths,
        &temp_dir,
        &temp_base,
    );

    let mut command = Command::new(&qcc);
    command
        .args(&args)
        .current_dir(&temp_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if !settings.basilisk_path.trim().is_empty() {
        command.env("BASILISK", settings.basilisk_path.trim());
    }
    debug!(target: "qcc_lsp::diagnostics", "Running {} {}", qcc, args.join(" "));

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(QccRun {
                diagnostics: vec![qcc_not_found_diagnostic(&qcc)],
                raw_output: String::new(),
            });
        }
        Err(e) => return Err(QccError::Spawn { path: qcc, source: e }),
    };

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            return Err(QccError::Timeout {
                secs: timeout.as_secs(),
            });
        }
    };

    let raw_output = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    let diagnostics = diagnostics_for_document(
        &raw_output,
        &temp_base,
        &document_name,
        settings.max_number_of_problems,
    );
    Ok(QccRun {
        diagnostics,
        raw_output,
    })
}

/// `-Wall -fsyntax-only`, de-duplicated `-I` dirs, then the input basename.
pub(crate) fn qcc_args(
    document_dir: Option<&Path>,
    src_local: Option<&Path>,
    include_paths: &[String],
    temp_dir: &Path,
    temp_base: &str,
) -> Vec<String> {
    let mut args = vec!["-Wall".to_string(), "-fsyntax-only".to_string()];

    let candidates = document_dir
        .into_iter()
        .chain(src_local)
        .map(|dir| dir.to_string_lossy().into_owned())
        .chain(include_paths.iter().cloned());
    let temp_dir = temp_dir.to_string_lossy();
    let mut seen: Vec<String> = Vec::new();
    for dir in candidates {
        if dir.is_empty() || dir == temp_dir || seen.contains(&dir) {
            continue;
        }
        seen.push(dir.clone());
        args.push("-I".to_string());
        args.push(dir);
    }

    args.push(temp_base.to_string());
    args
}

/// Parse `output`, keeping entries about the temp file or the document.
pub(crate) fn diagnostics_for_document(
    output: &str,
    temp_base: &str,
    document_name: &str,
    max: usize,
) -> Vec<Diagnostic> {
    parse_gcc_output(output)
        .into_iter()
        .filter(|message| {
            let base = Path::new(&message.file)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            base == temp_base || base == document_name || message.file.contains(temp_base)
        })
        .take(max)
        .map(|message| message.to_diagnostic())
        .collect()
}

pub fn qcc_not_found_diagnostic(path: &str) -> Diagnostic {
    Diagnostic {
        range: Range {
            start: Position { line: 0, character: 0 },
            end: Position { line: 0, character: 1 },
        },
        severity: Some(DiagnosticSeverity::WARNING),
        source: Some(SOURCE_LOCAL.to_string()),
        message: format!(
            "qcc compiler not found at '{}'. Set basilisk.qccPath in settings.",
            path
        ),
        ..Default::default()
    }
}

struct VersionOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

async fn run_version(path: &str) -> Option<VersionOutput> {
    let resolved = resolve_executable(path).or_else(|| {
        let candidate = PathBuf::from(path);
        candidate.is_absolute().then_some(candidate)
    })?;

    let child = Command::new(&resolved)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .ok()?;
    match tokio::time::timeout(VERSION_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => Some(VersionOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(e)) => {
            warn!(target: "qcc_lsp::diagnostics", "{} --version failed: {}", path, e);
            None
        }
        Err(_) => {
            warn!(target: "qcc_lsp::diagnostics", "{} --version timed out", path);
            None
        }
    }
}

/// Whether `path` runs `--version` successfully or identifies as gcc.
pub async fn check_qcc_available(path: &str) -> bool {
    match run_version(path).await {
        Some(output) => output.success || output.stdout.contains("gcc") || output.stderr.contains("gcc"),
        None => false,
    }
}

/// First line of `--version` output.
pub async fn qcc_version(path: &str) -> Option<String> {
    let output = run_version(path).await?;
    let text = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    text.lines()
        .next()
        .map(str::to_string)
        .filter(|line| !line.is_empty())
}
