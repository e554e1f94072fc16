//! Bridge to a clangd process over stdio.
//!
//! # Module Structure
//!
//! - `framing` - Content-Length frame encoding and incremental decoding
//! - `actor` - Reader/writer tasks and the ResponseRouter for request correlation
//! - `connection` - Process spawning behind the `PeerLauncher` seam
//! - `protocol` - Message classification, lifecycle messages, peer-request defaults
//! - `session` - ClangdBridge: handshake, notification queue, stop and crash handling
//! - `config_key` - LaunchPlan and the ConfigFingerprint restart key
//! - `manager` - BridgeManager: restart gating around one session

mod actor;
pub(crate) mod config_key;
mod connection;
mod framing;
mod manager;
mod protocol;
mod session;
mod state;
#[cfg(test)]
pub(crate) mod test_support;

pub(crate) use actor::PeerDiagnostics;
pub use config_key::{ConfigFingerprint, LaunchPlan};
pub use connection::LaunchCommand;
pub(crate) use connection::{PeerLauncher, ProcessLauncher};
pub(crate) use manager::{BridgeManager, EnsureOutcome};
pub(crate) use protocol::InitializeContext;
pub(crate) use session::ClangdBridge;
pub use state::BridgeState;

/// End-to-end checks against a real clangd, skipped when it is not installed.
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use std::time::Duration;

    fn clangd_available() -> bool {
        std::process::Command::new("clangd")
            .arg("--version")
            .output()
            .is_ok()
    }

    fn plan() -> LaunchPlan {
        LaunchPlan {
            command: LaunchCommand {
                program: "clangd".to_string(),
                args: vec!["--log=error".to_string()],
            },
            compile_commands_dir: String::new(),
            fallback_flags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn real_clangd_handshake_and_diagnostics() {
        if !clangd_available() {
            eprintln!("Skipping test: clangd not found");
            return;
        }

        let (sink, mut pushes) = mpsc::unbounded_channel();
        let bridge = Arc::new(ClangdBridge::new(
            Arc::new(ProcessLauncher),
            plan(),
            InitializeContext::default(),
            sink,
        ));
        bridge.start().await.expect("clangd should start");
        assert_eq!(bridge.state(), BridgeState::Ready);

        let uri = "file:///tmp/qcc_lsp_bridge_sample.c";
        bridge.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": "c",
                    "version": 1,
                    "text": "int main(void) { return undefined_name; }\n"
                }
            }),
        );

        let push = tokio::time::timeout(Duration::from_secs(10), pushes.recv()).await;
        if let Ok(Some(push)) = push {
            assert_eq!(push.uri.as_str(), uri);
        }

        bridge.stop().await;
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }
}
