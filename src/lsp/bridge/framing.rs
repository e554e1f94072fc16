//! Content-Length framing for the clangd byte streams.
//!
//! Outbound frames are produced by [`encode_frame`]. Inbound bytes arrive in
//! arbitrary chunks, so [`FrameDecoder`] keeps a buffer and only yields a
//! message once its declared body length has been fully received.

use std::sync::LazyLock;

use log::warn;
use regex::bytes::Regex;
use serde_json::Value;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
/// Bytes allowed to pile up while no header terminator has arrived.
const MAX_HEADER_LEN: usize = 8 * 1024;

static CONTENT_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Content-Length:\s*(\d+)").expect("static regex is valid")
});

/// Serialize a message with its `Content-Length` header.
///
/// The length is the byte length of the UTF-8 body, not its character count.
pub(crate) fn encode_frame(message: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let body = serde_json::to_vec(message)?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Incremental decoder for a stream of framed JSON-RPC messages.
#[derive(Debug, Default)]
pub(crate) struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every message that is now complete.
    ///
    /// A header block without a usable `Content-Length` is skipped through its
    /// terminating blank line. A body that is not valid JSON is consumed and
    /// dropped. Past [`MAX_HEADER_LEN`] bytes without a terminator, the
    /// buffered bytes are discarded.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buffer.extend_from_slice(chunk);
        let mut messages = Vec::new();

        loop {
            let Some(header_end) = find_subslice(&self.buffer, HEADER_TERMINATOR) else {
                self.discard_oversized_header();
                break;
            };
            let body_start = header_end + HEADER_TERMINATOR.len();

            let length = CONTENT_LENGTH
                .captures(&self.buffer[..header_end])
                .and_then(|caps| caps.get(1))
                .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
                .and_then(|digits| digits.parse::<usize>().ok());

            let Some(length) = length else {
                warn!(
                    target: "qcc_lsp::bridge::framing",
                    "Dropping header block without Content-Length ({} bytes)",
                    header_end
                );
                self.buffer.drain(..body_start);
                continue;
            };

            if self.buffer.len() < body_start + length {
                break;
            }

            let body: Vec<u8> = self.buffer.drain(..body_start + length).skip(body_start).collect();
            match serde_json::from_slice::<Value>(&body) {
                Ok(message) => messages.push(message),
                Err(e) => warn!(
                    target: "qcc_lsp::bridge::framing",
                    "Dropping frame with invalid JSON body: {}",
                    e
                ),
            }
        }

        messages
    }

    /// Keep only a possible partial terminator once the header limit is exceeded.
    fn discard_oversized_header(&mut self) {
        if self.buffer.len() <= MAX_HEADER_LEN {
            return;
        }
        let keep = HEADER_TERMINATOR.len() - 1;
        let dropped = self.buffer.len() - keep;
        warn!(
            target: "qcc_lsp::bridge::framing",
            "Discarding {} bytes without a header terminator",
            dropped
        );
        self.buffer.drain(..dropped);
    }

    /// Number of bytes waiting for the rest of their frame.
    #[cfg(test)]
    pub(crate) fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
