//! Outbound message types for the writer loop.

use crate::lsp::bridge::protocol::RequestId;

/// Message queued for clangd's stdin.
///
/// Everything passes through one queue, so frames leave in the order they
/// were queued.
#[derive(Debug)]
pub(crate) enum OutboundMessage {
    /// Notification, or a response to a peer request. No reply expected.
    Notification(serde_json::Value),

    /// Request whose `request_id` is already registered with the router.
    Request {
        payload: serde_json::Value,
        request_id: RequestId,
    },
}

impl OutboundMessage {
    pub(crate) fn payload(&self) -> &serde_json::Value {
        match self {
            OutboundMessage::Notification(payload) | OutboundMessage::Request { payload, .. } => {
                payload
            }
        }
    }
}
