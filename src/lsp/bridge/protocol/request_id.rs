//! Correlation IDs for requests sent to clangd.

/// JSON-RPC request ID for requests this bridge originates.
///
/// Only numeric IDs are generated, so only numeric IDs are routed. Peer
/// requests may carry string IDs; those are echoed back verbatim as raw JSON
/// and never pass through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RequestId(i64);

impl RequestId {
    #[inline]
    pub(crate) fn new(id: i64) -> Self {
        Self(id)
    }

    #[inline]
    pub(crate) fn as_i64(self) -> i64 {
        self.0
    }

    /// Extract the numeric `id` of a JSON-RPC message, if any.
    pub(crate) fn from_json(message: &serde_json::Value) -> Option<Self> {
        message.get("id")?.as_i64().map(Self)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_reads_numeric_id() {
        let msg = json!({"jsonrpc": "2.0", "id": 42, "result": null});
        assert_eq!(RequestId::from_json(&msg), Some(RequestId::new(42)));
    }

    #[test]
    fn from_json_ignores_notifications_and_string_ids() {
        let notification = json!({"jsonrpc": "2.0", "method": "initialized", "params": {}});
        let string_id = json!({"jsonrpc": "2.0", "id": "abc", "result": null});
        let null_id = json!({"jsonrpc": "2.0", "id": null, "result": null});

        assert_eq!(RequestId::from_json(&notification), None);
        assert_eq!(RequestId::from_json(&string_id), None);
        assert_eq!(RequestId::from_json(&null_id), None);
    }

    #[test]
    fn converts_from_i64_and_displays() {
        let id: RequestId = 17.into();
        assert_eq!(id.as_i64(), 17);
        assert_eq!(id.to_string(), "17");
    }
}
