//! LSP lifecycle message builders.
//!
//! Provides builders for the initialize handshake and the shutdown sequence
//! of a clangd session.

use serde_json::{Value, json};

use super::request_id::RequestId;
use crate::error::BridgeError;

/// Editor-side facts forwarded to clangd when it is initialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitializeContext {
    /// Workspace root as a `file://` URI.
    pub root_uri: Option<String>,
    /// `workspaceFolders` array as received from the editor.
    pub workspace_folders: Option<Value>,
    /// Client capabilities as received from the editor. `Null` sends `{}`.
    pub capabilities: Value,
}

/// Build the initialize request for clangd.
///
/// `fallbackFlags` travel in `initializationOptions`, which is where clangd
/// looks for flags used when no compile database entry matches a file.
pub(crate) fn build_initialize_request(
    request_id: RequestId,
    context: &InitializeContext,
    fallback_flags: &[String],
) -> Value {
    let capabilities = if context.capabilities.is_null() {
        json!({})
    } else {
        context.capabilities.clone()
    };

    let mut params = json!({
        "processId": std::process::id(),
        "rootUri": context.root_uri,
        "capabilities": capabilities,
        "initializationOptions": {
            "fallbackFlags": fallback_flags
        }
    });
    if let (Some(folders), Some(object)) = (&context.workspace_folders, params.as_object_mut()) {
        object.insert("workspaceFolders".to_string(), folders.clone());
    }

    json!({
        "jsonrpc": "2.0",
        "id": request_id.as_i64(),
        "method": "initialize",
        "params": params
    })
}

/// Build an LSP initialized notification.
pub(crate) fn build_initialized_notification() -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "initialized",
        "params": {}
    })
}

/// Build an LSP shutdown request.
pub(crate) fn build_shutdown_request(request_id: RequestId) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request_id.as_i64(),
        "method": "shutdown",
        "params": null
    })
}

/// Build an LSP exit notification.
pub(crate) fn build_exit_notification() -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "exit",
        "params": null
    })
}

/// Validates a JSON-RPC initialize response.
///
/// - A non-null `error` wins, even when a `result` is also present
/// - A null or missing `result` is rejected
pub(crate) fn validate_initialize_response(response: &Value) -> Result<(), BridgeError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");

        return Err(BridgeError::Handshake(format!(
            "bridge: initialize failed (code {}): {}",
            code, message
        )));
    }

    if response.get("result").filter(|r| !r.is_null()).is_none() {
        return Err(BridgeError::Handshake(
            "bridge: initialize response missing valid result".to_string(),
        ));
    }

    Ok(())
}

/// `serverInfo.name` from an initialize response, when the peer sent one.
pub(crate) fn server_name(response: &Value) -> Option<&str> {
    response
        .get("result")?
        .get("serverInfo")?
        .get("name")?
        .as_str()
}
