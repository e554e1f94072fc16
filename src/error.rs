//! Error types for qcc-lsp.
//!
//! Each subsystem gets its own enum so callers can tell transport trouble
//! apart from tooling or configuration trouble.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the persistent clangd session.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The peer process could not be spawned.
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The peer process went away while work was outstanding.
    #[error("{0}")]
    ProcessExited(String),

    /// A request was issued while the session is stopped or stopping.
    #[error("clangd is not running")]
    NotRunning,

    /// The initialize handshake failed.
    #[error("{0}")]
    Handshake(String),

    /// The peer answered a request with a JSON-RPC error.
    #[error("{message} (code {code})")]
    Peer { code: i64, message: String },

    /// No response arrived in time.
    #[error("clangd request '{method}' timed out after {millis}ms")]
    Timeout { method: String, millis: u128 },

    /// A message could not be serialized for the wire.
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// Transport level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a one-shot qcc invocation.
#[derive(Debug, Error)]
pub enum QccError {
    /// The compiler binary does not exist.
    #[error("qcc compiler not found at '{path}'")]
    NotFound { path: String },

    /// Spawning failed for a reason other than a missing binary.
    #[error("Failed to spawn {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The run exceeded its wall-clock budget and was killed.
    #[error("qcc timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while reading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Project config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

impl ConfigError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ConfigError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failures surfaced by the command line front end.
///
/// Every variant maps onto a process exit code through [`CliError::exit_code`].
#[derive(Debug, Error)]
pub enum CliError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("qcc not available and clangd fallback disabled.")]
    NoDiagnosticSource,

    #[error("clangd error: {0}")]
    Clangd(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Exit code for this failure: 1 for user mistakes, 2 for tooling trouble.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::FileNotFound(_) | CliError::Io(_) => 1,
            CliError::Config(_) | CliError::NoDiagnosticSource | CliError::Clangd(_) => 2,
        }
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_names_the_command() {
        let err = BridgeError::Spawn {
            command: "clangd".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "Failed to spawn clangd: no such file");
    }

    #[test]
    fn cli_errors_map_to_documented_exit_codes() {
        assert_eq!(CliError::FileNotFound("a.c".into()).exit_code(), 1);
        assert_eq!(CliError::NoDiagnosticSource.exit_code(), 2);
        assert_eq!(CliError::Clangd(BridgeError::NotRunning).exit_code(), 2);
        assert_eq!(
            CliError::Config(ConfigError::NotFound {
                path: "x".into()
            })
            .exit_code(),
            2
        );
    }

    #[test]
    fn no_source_message_is_stable() {
        assert_eq!(
            CliError::NoDiagnosticSource.to_string(),
            "qcc not available and clangd fallback disabled."
        );
    }
}
