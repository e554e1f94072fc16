//! Reader task for clangd's stdout.
//!
//! The reader task:
//! - Feeds raw bytes into a [`FrameDecoder`]
//! - Routes responses to their waiters via [`ResponseRouter`]
//! - Answers peer requests immediately through the outbound queue
//! - Forwards `textDocument/publishDiagnostics` to the diagnostics sink
//! - Rejects everything pending when the stream ends

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::{Diagnostic, PublishDiagnosticsParams, Uri};

use super::{OutboundMessage, ResponseRouter};
use crate::lsp::bridge::connection::PeerReader;
use crate::lsp::bridge::framing::FrameDecoder;
use crate::lsp::bridge::protocol::{InboundMessage, answer_peer_request, build_response};

const READ_CHUNK: usize = 8192;

/// Diagnostics pushed by clangd for one document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PeerDiagnostics {
    pub uri: Uri,
    pub version: Option<i32>,
    pub diagnostics: Vec<Diagnostic>,
}

pub(crate) type DiagnosticsSink = mpsc::UnboundedSender<PeerDiagnostics>;

/// Callback run once when the peer's stdout ends on its own.
pub(crate) type ExitHook = Box<dyn FnOnce(String) + Send>;

/// Everything the reader needs besides the byte stream.
pub(crate) struct ReaderContext {
    pub router: Arc<ResponseRouter>,
    pub responder: mpsc::UnboundedSender<OutboundMessage>,
    pub diagnostics: DiagnosticsSink,
    pub on_exit: ExitHook,
}

/// Handle to a running reader task. Dropping it cancels the task.
pub(crate) struct ReaderTaskHandle {
    _join_handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl ReaderTaskHandle {
    pub(crate) fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for ReaderTaskHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

pub(crate) fn spawn_reader_task(reader: PeerReader, context: ReaderContext) -> ReaderTaskHandle {
    let cancel_token = CancellationToken::new();
    let join_handle = tokio::spawn(reader_loop(reader, context, cancel_token.clone()));

    ReaderTaskHandle {
        _join_handle: join_handle,
        cancel_token,
    }
}

async fn reader_loop(mut reader: PeerReader, context: ReaderContext, cancel_token: CancellationToken) {
    let ReaderContext {
        router,
        responder,
        diagnostics,
        on_exit,
    } = context;
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    let reason = loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(
                    target: "qcc_lsp::bridge::reader",
                    "Reader task cancelled, shutting down"
                );
                return;
            }

            result = reader.read(&mut chunk) => {
                match result {
                    Ok(0) => break "stdout closed".to_string(),
                    Ok(n) => {
                        for message in decoder.push(&chunk[..n]) {
                            handle_message(message, &router, &responder, &diagnostics);
                        }
                    }
                    Err(e) => {
                        warn!(
                            target: "qcc_lsp::bridge::reader",
                            "Reader error: {}, failing pending requests",
                            e
                        );
                        break format!("reader error: {}", e);
                    }
                }
            }
        }
    };

    router.fail_all("clangd exited");
    on_exit(reason);
}

/// Dispatch a single decoded frame.
fn handle_message(
    message: Value,
    router: &ResponseRouter,
    responder: &mpsc::UnboundedSender<OutboundMessage>,
    diagnostics: &DiagnosticsSink,
) {
    match InboundMessage::classify(message) {
        InboundMessage::Response(response) => {
            if !router.route(response) {
                debug!(
                    target: "qcc_lsp::bridge::reader",
                    "Response for unknown request ID, dropping"
                );
            }
        }
        InboundMessage::PeerRequest { id, method, params } => {
            debug!(
                target: "qcc_lsp::bridge::reader",
                "Answering peer request {} with default",
                method
            );
            let result = answer_peer_request(&method, &params);
            if responder
                .send(OutboundMessage::Notification(build_response(id, result)))
                .is_err()
            {
                debug!(
                    target: "qcc_lsp::bridge::reader",
                    "Outbound queue closed, cannot answer {}",
                    method
                );
            }
        }
        InboundMessage::Notification { method, params } => {
            handle_notification(&method, params, diagnostics);
        }
        InboundMessage::Invalid(message) => {
            debug!(
                target: "qcc_lsp::bridge::reader",
                "Dropping frame with neither id nor method: {}",
                message
            );
        }
    }
}

fn handle_notification(method: &str, params: Value, diagnostics: &DiagnosticsSink) {
    match method {
        "textDocument/publishDiagnostics" => {
            match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                Ok(params) => {
                    let _ = diagnostics.send(PeerDiagnostics {
                        uri: params.uri,
                        version: params.version,
                        diagnostics: params.diagnostics,
                    });
                }
                Err(e) => warn!(
                    target: "qcc_lsp::bridge::reader",
                    "Malformed publishDiagnostics from clangd: {}",
                    e
                ),
            }
        }
        "window/logMessage" | "window/showMessage" => {
            let text = params.get("message").and_then(|m| m.as_str()).unwrap_or("");
            info!(target: "qcc_lsp::bridge::clangd", "{}", text);
        }
        "$/progress" | "telemetry/event" => {}
        other => {
            debug!(
                target: "qcc_lsp::bridge::reader",
                "Received notification: {}, skipping",
                other
            );
        }
    }
}
