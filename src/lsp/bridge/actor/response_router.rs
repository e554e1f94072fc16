//! Response routing for pending clangd requests.
//!
//! Before a request is written, it is registered here and the caller keeps
//! the oneshot receiver. The reader task calls `route()` for every response
//! frame. The caller awaits its receiver without holding any lock.
//!
//! Waiters receive `Ok(frame)` for an answer from clangd and
//! `Err(BridgeError::ProcessExited)` when the session goes away first.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use super::super::protocol::RequestId;
use crate::error::{BridgeError, BridgeResult};

/// JSON-RPC InternalError, assumed when an error response carries no code.
const INTERNAL_ERROR: i64 = -32603;

struct PendingRequest {
    method: String,
    tx: oneshot::Sender<BridgeResult<Value>>,
}

/// Routes responses to pending requests via oneshot channels.
pub(crate) struct ResponseRouter {
    pending: std::sync::Mutex<HashMap<RequestId, PendingRequest>>,
}

impl ResponseRouter {
    pub(crate) fn new() -> Self {
        Self {
            pending: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Register a pending request and return a receiver for its response.
    ///
    /// Returns `None` if a request with this ID is already pending.
    pub(crate) fn register(
        &self,
        id: RequestId,
        method: &str,
    ) -> Option<oneshot::Receiver<BridgeResult<Value>>> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());

        if pending.contains_key(&id) {
            return None;
        }
        pending.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                tx,
            },
        );
        Some(rx)
    }

    /// Route a response to its pending request.
    ///
    /// Returns `true` if the response was delivered. A response whose ID is
    /// unknown (already answered, timed out, or never ours) is dropped.
    pub(crate) fn route(&self, response: Value) -> bool {
        let Some(id) = RequestId::from_json(&response) else {
            return false;
        };

        let entry = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&id)
        };

        match entry {
            Some(entry) => entry.tx.send(Ok(response)).is_ok(),
            None => false,
        }
    }

    /// Forget a pending request without answering it.
    ///
    /// Returns `true` if the request was still pending.
    pub(crate) fn remove(&self, id: RequestId) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(&id).is_some()
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.len()
    }

    /// Reject every pending request with [`BridgeError::ProcessExited`].
    ///
    /// Only entries pending at the time of the call are affected. Requests
    /// registered afterwards are untouched.
    pub(crate) fn fail_all(&self, reason: &str) -> usize {
        let entries: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain().collect()
        };

        let count = entries.len();
        for (id, entry) in entries {
            log::debug!(
                target: "qcc_lsp::bridge",
                "Rejecting pending {} (id {}): {}",
                entry.method,
                id,
                reason
            );
            let _ = entry
                .tx
                .send(Err(BridgeError::ProcessExited(reason.to_string())));
        }
        count
    }
}

/// Turn a routed response into the caller's result.
///
/// A non-null `error` becomes [`BridgeError::Peer`]. A missing `result` is
/// treated as `null`.
pub(crate) fn into_result(response: Value) -> Result<Value, BridgeError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let code = error
            .get("code")
            .and_then(|c| c.as_i64())
            .unwrap_or(INTERNAL_ERROR);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(BridgeError::Peer { code, message });
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_router_has_no_pending_requests() {
        let router = ResponseRouter::new();
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn register_duplicate_id_returns_none() {
        let router = ResponseRouter::new();
        assert!(router.register(RequestId::new(1), "textDocument/hover").is_some());
        assert!(router.register(RequestId::new(1), "textDocument/hover").is_none());
        assert_eq!(router.pending_count(), 1);
    }

    #[tokio::test]
    async fn route_delivers_response_to_waiter() {
        let router = ResponseRouter::new();
        let rx = router.register(RequestId::new(7), "textDocument/hover").unwrap();

        let response = json!({"jsonrpc": "2.0", "id": 7, "result": {"contents": "x"}});
        assert!(router.route(response.clone()));

        assert_eq!(rx.await.unwrap().unwrap(), response);
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn route_returns_false_for_unknown_id() {
        let router = ResponseRouter::new();
        assert!(!router.route(json!({"jsonrpc": "2.0", "id": 999, "result": null})));
        assert!(!router.route(json!({"jsonrpc": "2.0", "method": "initialized"})));
    }

    #[tokio::test]
    async fn permuted_responses_each_resolve_exactly_once() {
        let router = ResponseRouter::new();
        let receivers: Vec<_> = (1..=5)
            .map(|i| (i, router.register(RequestId::new(i), "m").unwrap()))
            .collect();

        for id in [4, 1, 5, 3, 2] {
            assert!(router.route(json!({"jsonrpc": "2.0", "id": id, "result": id * 10})));
        }
        // A second delivery for the same id has nowhere to go.
        assert!(!router.route(json!({"jsonrpc": "2.0", "id": 3, "result": 0})));

        for (id, rx) in receivers {
            let response = rx.await.unwrap().unwrap();
            assert_eq!(response["result"], id * 10);
        }
        assert_eq!(router.pending_count(), 0);
    }

    #[tokio::test]
    async fn fail_all_rejects_only_requests_still_pending() {
        let router = ResponseRouter::new();
        let answered = router.register(RequestId::new(1), "a").unwrap();
        let pending = router.register(RequestId::new(2), "b").unwrap();
        assert!(router.route(json!({"jsonrpc": "2.0", "id": 1, "result": "ok"})));

        assert_eq!(router.fail_all("clangd exited"), 1);

        assert_eq!(answered.await.unwrap().unwrap()["result"], "ok");
        let rejected = pending.await.unwrap().unwrap_err();
        assert!(matches!(rejected, BridgeError::ProcessExited(ref reason) if reason == "clangd exited"));

        let late = router.register(RequestId::new(3), "c");
        assert!(late.is_some());
        assert_eq!(router.pending_count(), 1);
    }

    #[test]
    fn remove_forgets_pending_request() {
        let router = ResponseRouter::new();
        let _rx = router.register(RequestId::new(1), "a").unwrap();
        assert!(router.remove(RequestId::new(1)));
        assert!(!router.remove(RequestId::new(1)));
    }

    #[test]
    fn into_result_maps_error_and_result() {
        assert_eq!(
            into_result(json!({"id": 1, "result": {"a": 1}})).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(into_result(json!({"id": 1})).unwrap(), Value::Null);

        let err = into_result(json!({"id": 1, "error": {"code": -32601, "message": "no"}}))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Peer { code: -32601, ref message } if message == "no"));
    }
}
