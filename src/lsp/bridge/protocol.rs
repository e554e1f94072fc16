//! JSON-RPC message shapes exchanged with clangd.
//!
//! - `request_id` - RequestId newtype for correlation
//! - `lifecycle` - initialize/initialized/shutdown/exit builders
//! - `message` - inbound classification and peer-request defaults

mod lifecycle;
mod message;
mod request_id;

pub(crate) use lifecycle::*;
pub(crate) use message::{InboundMessage, answer_peer_request, build_notification, build_request, build_response};
pub(crate) use request_id::RequestId;
