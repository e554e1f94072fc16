//! Writer task for clangd's stdin.
//!
//! The single writer consumes the outbound queue and writes each message as
//! one frame. It stops when every sender is dropped (queue drained) or when
//! its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{OutboundMessage, ResponseRouter};
use crate::lsp::bridge::connection::PeerWriter;
use crate::lsp::bridge::framing::encode_frame;

/// Handle to a running writer task.
///
/// Dropping the handle cancels the task.
pub(crate) struct WriterTaskHandle {
    join_handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl WriterTaskHandle {
    /// Wait up to `grace` for the queue to drain, then cancel.
    ///
    /// The caller must have dropped its senders first, otherwise this always
    /// waits the full grace period.
    pub(crate) async fn finish(mut self, grace: Duration) {
        if let Some(handle) = self.join_handle.take() {
            if tokio::time::timeout(grace, handle).await.is_err() {
                debug!(
                    target: "qcc_lsp::bridge::writer",
                    "Writer did not drain within {:?}, cancelling",
                    grace
                );
            }
        }
        self.cancel_token.cancel();
    }
}

impl Drop for WriterTaskHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

pub(crate) fn spawn_writer_task(
    writer: PeerWriter,
    rx: mpsc::UnboundedReceiver<OutboundMessage>,
    router: Arc<ResponseRouter>,
) -> WriterTaskHandle {
    let cancel_token = CancellationToken::new();
    let join_handle = tokio::spawn(writer_loop(writer, rx, router, cancel_token.clone()));

    WriterTaskHandle {
        join_handle: Some(join_handle),
        cancel_token,
    }
}

async fn writer_loop(
    mut writer: PeerWriter,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    router: Arc<ResponseRouter>,
    cancel_token: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(target: "qcc_lsp::bridge::writer", "Writer task cancelled");
                break;
            }
            message = rx.recv() => match message {
                Some(message) => message,
                None => {
                    debug!(target: "qcc_lsp::bridge::writer", "Outbound queue closed, writer exiting");
                    break;
                }
            },
        };

        if let Err(e) = write_one(&mut writer, &message).await {
            warn!(
                target: "qcc_lsp::bridge::writer",
                "Failed to write to clangd: {}",
                e
            );
            // Dropping the sender wakes the waiter with a closed-channel error.
            if let OutboundMessage::Request { request_id, .. } = message {
                router.remove(request_id);
            }
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn write_one(writer: &mut PeerWriter, message: &OutboundMessage) -> std::io::Result<()> {
    let frame = encode_frame(message.payload()).map_err(std::io::Error::other)?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::bridge::framing::FrameDecoder;
    use crate::lsp::bridge::protocol::RequestId;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writes_frames_in_queue_order() {
        let (ours, mut theirs) = tokio::io::duplex(4096);
        let (tx, rx) = mpsc::unbounded_channel();
        let router = Arc::new(ResponseRouter::new());
        let handle = spawn_writer_task(Box::new(ours), rx, router);

        tx.send(OutboundMessage::Notification(json!({"method": "a"}))).unwrap();
        tx.send(OutboundMessage::Request {
            payload: json!({"method": "b", "id": 1}),
            request_id: RequestId::new(1),
        })
        .unwrap();
        tx.send(OutboundMessage::Notification(json!({"method": "c"}))).unwrap();
        drop(tx);
        handle.finish(Duration::from_secs(1)).await;

        let mut bytes = Vec::new();
        theirs.read_to_end(&mut bytes).await.unwrap();
        let methods: Vec<_> = FrameDecoder::new()
            .push(&bytes)
            .into_iter()
            .map(|m| m["method"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(methods, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn write_failure_drops_pending_request() {
        let (ours, theirs) = tokio::io::duplex(64);
        drop(theirs);
        let (tx, rx) = mpsc::unbounded_channel();
        let router = Arc::new(ResponseRouter::new());
        let waiter = router.register(RequestId::new(5), "textDocument/hover").unwrap();
        let handle = spawn_writer_task(Box::new(ours), rx, Arc::clone(&router));

        tx.send(OutboundMessage::Request {
            payload: json!({"method": "textDocument/hover", "id": 5}),
            request_id: RequestId::new(5),
        })
        .unwrap();

        assert!(waiter.await.is_err());
        assert_eq!(router.pending_count(), 0);
        drop(tx);
        handle.finish(Duration::from_secs(1)).await;
    }
}
