//! Lifecycle states of a clangd session.

/// State of the clangd bridge.
///
/// Transitions:
/// - Stopped -> Starting (start requested, process spawning)
/// - Starting -> Ready (initialize response accepted, `initialized` sent)
/// - Starting -> Stopped (spawn, handshake, or timeout failure)
/// - Ready -> Stopping (stop requested)
/// - Ready -> Stopped (process exited on its own)
/// - Stopping -> Stopped (teardown complete)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    #[default]
    Stopped,
    Starting,
    Ready,
    Stopping,
}

impl BridgeState {
    /// Whether outbound notifications should be buffered instead of written.
    pub(crate) fn buffers_notifications(self) -> bool {
        matches!(self, BridgeState::Starting)
    }

    /// Whether requests may be issued (possibly after waiting for Starting).
    pub(crate) fn accepts_requests(self) -> bool {
        matches!(self, BridgeState::Starting | BridgeState::Ready)
    }
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BridgeState::Stopped => "stopped",
            BridgeState::Starting => "starting",
            BridgeState::Ready => "ready",
            BridgeState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
