//! Spawning and terminating the clangd process.
//!
//! [`PeerLauncher`] is the seam between the session and the operating
//! system. [`ProcessLauncher`] spawns a real child process. Anything else that
//! can hand out a pair of byte streams (tests use in-memory pipes) can stand
//! in for it.

use std::process::Stdio;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::BridgeError;

pub(crate) type PeerWriter = Box<dyn AsyncWrite + Send + Unpin>;
pub(crate) type PeerReader = Box<dyn AsyncRead + Send + Unpin>;

/// Grace period between SIGTERM and SIGKILL.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Program and arguments used to launch clangd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pipes of a launched peer.
pub(crate) struct PeerIo {
    pub stdin: PeerWriter,
    pub stdout: PeerReader,
    pub stderr: Option<PeerReader>,
    pub process: Option<PeerProcess>,
}

/// Launches a clangd peer.
pub(crate) trait PeerLauncher: Send + Sync {
    fn launch(&self, command: &LaunchCommand) -> Result<PeerIo, BridgeError>;
}

/// Spawns clangd as a child process with piped stdio.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ProcessLauncher;

impl PeerLauncher for ProcessLauncher {
    fn launch(&self, command: &LaunchCommand) -> Result<PeerIo, BridgeError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                command: command.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take();

        debug!(
            target: "qcc_lsp::bridge",
            "Spawned {} (pid {:?})",
            command.display(),
            child.id()
        );

        Ok(PeerIo {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: stderr.map(|s| Box::new(s) as PeerReader),
            process: Some(PeerProcess { child }),
        })
    }
}

fn missing_pipe(name: &str) -> BridgeError {
    BridgeError::Io(std::io::Error::other(format!("Failed to capture {}", name)))
}

/// Owned child process of a launched peer.
pub(crate) struct PeerProcess {
    child: Child,
}

impl PeerProcess {
    #[cfg(test)]
    pub(crate) fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Terminate the process, escalating when it does not exit.
    ///
    /// **Unix**: SIGTERM, wait up to 2 seconds, then SIGKILL.
    /// **Elsewhere**: kill directly.
    pub(crate) async fn terminate(mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && tokio::time::timeout(TERMINATE_GRACE, self.child.wait())
                    .await
                    .is_ok()
            {
                return;
            }
        }

        if let Err(e) = self.child.start_kill() {
            debug!(target: "qcc_lsp::bridge", "Kill failed: {}", e);
        }
        let _ = tokio::time::timeout(TERMINATE_GRACE, self.child.wait()).await;
    }
}

/// Forward the peer's stderr to the log, one line at a time.
pub(crate) fn spawn_stderr_logger(stderr: PeerReader) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !line.trim().is_empty() {
                debug!(target: "qcc_lsp::bridge::stderr", "{}", line);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let command = LaunchCommand {
            program: "clangd".to_string(),
            args: vec!["--log=error".to_string(), "--compile-commands-dir=/b".to_string()],
        };
        assert_eq!(command.display(), "clangd --log=error --compile-commands-dir=/b");
    }

    #[tokio::test]
    async fn launch_of_missing_binary_reports_spawn_error() {
        let command = LaunchCommand {
            program: "/nonexistent/qcc-lsp-test-clangd".to_string(),
            args: vec![],
        };
        let err = ProcessLauncher.launch(&command).err().unwrap();
        assert!(matches!(err, BridgeError::Spawn { .. }));
        assert!(err.to_string().starts_with("Failed to spawn /nonexistent/qcc-lsp-test-clangd"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_stops_a_running_process() {
        let command = LaunchCommand {
            program: "cat".to_string(),
            args: vec![],
        };
        let io = ProcessLauncher.launch(&command).expect("cat should spawn");
        let process = io.process.unwrap();
        assert!(process.id().is_some());

        tokio::time::timeout(Duration::from_secs(5), process.terminate())
            .await
            .expect("terminate completes");
    }
}
