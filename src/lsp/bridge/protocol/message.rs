//! Inbound frame classification and outbound message builders.

use serde_json::{Value, json};

use super::request_id::RequestId;

/// An inbound frame sorted by its JSON-RPC shape.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InboundMessage {
    /// Answer to one of our requests (`id`, no `method`).
    Response(Value),
    /// Request initiated by clangd (`id` and `method`). Must be answered.
    PeerRequest {
        id: Value,
        method: String,
        params: Value,
    },
    /// Fire-and-forget message from clangd (`method`, no `id`).
    Notification { method: String, params: Value },
    /// Neither `id` nor `method`.
    Invalid(Value),
}

impl InboundMessage {
    pub(crate) fn classify(message: Value) -> Self {
        let has_id = message.get("id").is_some_and(|id| !id.is_null());
        let method = message
            .get("method")
            .and_then(|m| m.as_str())
            .map(str::to_owned);

        match (has_id, method) {
            (true, Some(method)) => InboundMessage::PeerRequest {
                id: message["id"].clone(),
                params: message.get("params").cloned().unwrap_or(Value::Null),
                method,
            },
            (false, Some(method)) => InboundMessage::Notification {
                params: message.get("params").cloned().unwrap_or(Value::Null),
                method,
            },
            (true, None) => InboundMessage::Response(message),
            (false, None) => InboundMessage::Invalid(message),
        }
    }
}

/// Default `result` for a request clangd sends to us.
///
/// None of these requests are implemented. The answers only keep clangd from
/// blocking on a reply that would otherwise never come.
pub(crate) fn answer_peer_request(method: &str, params: &Value) -> Value {
    match method {
        "workspace/configuration" => {
            let count = params
                .get("items")
                .and_then(|items| items.as_array())
                .map_or(0, Vec::len);
            Value::Array(vec![json!({}); count])
        }
        "client/registerCapability"
        | "client/unregisterCapability"
        | "window/workDoneProgress/create" => Value::Null,
        "workspace/applyEdit" => json!({ "applied": false }),
        _ => Value::Null,
    }
}

pub(crate) fn build_request(request_id: RequestId, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request_id.as_i64(),
        "method": method,
        "params": params
    })
}

pub(crate) fn build_notification(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
}

pub(crate) fn build_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}
