//! The clangd session: lifecycle, request correlation, notification queue.
//!
//! A [`ClangdBridge`] owns at most one clangd process at a time. Requests
//! issued while the handshake is in flight wait for its outcome.
//! Notifications issued while Starting are buffered and flushed, in order,
//! right after `initialized` is written.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::actor::{
    DiagnosticsSink, OutboundMessage, ReaderContext, ReaderTaskHandle, ResponseRouter,
    WriterTaskHandle, into_result, spawn_reader_task, spawn_writer_task,
};
use super::config_key::LaunchPlan;
use super::connection::{PeerLauncher, PeerProcess, spawn_stderr_logger};
use super::protocol::{
    InitializeContext, RequestId, build_exit_notification, build_initialize_request,
    build_initialized_notification, build_notification, build_request, build_shutdown_request,
    server_name, validate_initialize_response,
};
use super::state::BridgeState;
use crate::error::{BridgeError, BridgeResult};

/// Upper bound for the initialize round trip.
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for an editor-driven request forwarded to clangd.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);
const WRITER_DRAIN: Duration = Duration::from_millis(500);

struct Outbound {
    tx: Option<mpsc::UnboundedSender<OutboundMessage>>,
    queue: VecDeque<Value>,
    /// URIs whose didOpen this process has been sent or will be sent on Ready.
    opened: HashSet<String>,
}

impl Outbound {
    fn track_open_state(&mut self, payload: &Value) {
        let Some(uri) = payload
            .pointer("/params/textDocument/uri")
            .and_then(Value::as_str)
        else {
            return;
        };
        match payload.get("method").and_then(Value::as_str) {
            Some("textDocument/didOpen") => {
                self.opened.insert(uri.to_string());
            }
            Some("textDocument/didClose") => {
                self.opened.remove(uri);
            }
            _ => {}
        }
    }
}

/// State shared with the reader task's exit hook.
struct Shared {
    state: watch::Sender<BridgeState>,
    router: Arc<ResponseRouter>,
    next_id: AtomicI64,
    /// Bumped per launch so a previous process's exit cannot touch a newer one.
    epoch: AtomicU64,
    outbound: std::sync::Mutex<Outbound>,
}

impl Shared {
    fn new() -> Self {
        let (state, _) = watch::channel(BridgeState::Stopped);
        Self {
            state,
            router: Arc::new(ResponseRouter::new()),
            next_id: AtomicI64::new(1),
            epoch: AtomicU64::new(0),
            outbound: std::sync::Mutex::new(Outbound {
                tx: None,
                queue: VecDeque::new(),
                opened: HashSet::new(),
            }),
        }
    }

    fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    fn set_state(&self, state: BridgeState) {
        self.state.send_replace(state);
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn lock_outbound(&self) -> std::sync::MutexGuard<'_, Outbound> {
        self.outbound.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn install_outbound(&self, tx: mpsc::UnboundedSender<OutboundMessage>) {
        self.lock_outbound().tx = Some(tx);
    }

    /// Write a message regardless of lifecycle state.
    fn enqueue(&self, message: OutboundMessage) -> bool {
        let outbound = self.lock_outbound();
        match &outbound.tx {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    fn notify(&self, payload: Value) {
        let mut outbound = self.lock_outbound();
        let state = self.state();
        if state == BridgeState::Ready {
            outbound.track_open_state(&payload);
            let sent = outbound
                .tx
                .as_ref()
                .is_some_and(|tx| tx.send(OutboundMessage::Notification(payload)).is_ok());
            if !sent {
                debug!(target: "qcc_lsp::bridge", "Outbound queue closed, notification dropped");
            }
        } else if state.buffers_notifications() {
            outbound.track_open_state(&payload);
            outbound.queue.push_back(payload);
        } else {
            debug!(
                target: "qcc_lsp::bridge",
                "Dropping {} while clangd is {}",
                payload.get("method").and_then(|m| m.as_str()).unwrap_or("notification"),
                state
            );
        }
    }

    /// Enter Ready, write `initialized`, then flush the buffered notifications.
    ///
    /// Runs under the outbound lock so no notification can slip in between.
    fn mark_ready(&self) -> usize {
        let mut outbound = self.lock_outbound();
        self.set_state(BridgeState::Ready);
        let queued: Vec<Value> = outbound.queue.drain(..).collect();
        let count = queued.len();
        if let Some(tx) = &outbound.tx {
            let _ = tx.send(OutboundMessage::Notification(build_initialized_notification()));
            for payload in queued {
                let _ = tx.send(OutboundMessage::Notification(payload));
            }
        }
        count
    }

    /// Drop the sender and the buffered notifications. Returns how many were dropped.
    fn close_outbound(&self) -> usize {
        let mut outbound = self.lock_outbound();
        outbound.tx = None;
        let dropped = outbound.queue.len();
        outbound.queue.clear();
        outbound.opened.clear();
        dropped
    }

    fn on_peer_exit(&self, epoch: u64, reason: &str) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        match self.state() {
            BridgeState::Stopping | BridgeState::Stopped => {}
            _ => {
                warn!(target: "qcc_lsp::bridge", "clangd exited ({})", reason);
                self.close_outbound();
                self.set_state(BridgeState::Stopped);
            }
        }
    }
}

struct LiveConnection {
    process: Option<PeerProcess>,
    reader: ReaderTaskHandle,
    writer: WriterTaskHandle,
    stderr: Option<JoinHandle<()>>,
}

impl LiveConnection {
    async fn teardown(self) {
        self.reader.cancel();
        self.writer.finish(WRITER_DRAIN).await;
        if let Some(process) = self.process {
            process.terminate().await;
        }
        if let Some(stderr) = self.stderr {
            stderr.abort();
        }
    }
}

/// One clangd session.
pub(crate) struct ClangdBridge {
    launcher: Arc<dyn PeerLauncher>,
    plan: LaunchPlan,
    context: InitializeContext,
    diagnostics: DiagnosticsSink,
    shared: Arc<Shared>,
    live: tokio::sync::Mutex<Option<LiveConnection>>,
}

impl ClangdBridge {
    pub(crate) fn new(
        launcher: Arc<dyn PeerLauncher>,
        plan: LaunchPlan,
        context: InitializeContext,
        diagnostics: DiagnosticsSink,
    ) -> Self {
        Self {
            launcher,
            plan,
            context,
            diagnostics,
            shared: Arc::new(Shared::new()),
            live: tokio::sync::Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> BridgeState {
        self.shared.state()
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state() == BridgeState::Ready
    }

    #[cfg(test)]
    pub(crate) fn plan(&self) -> &LaunchPlan {
        &self.plan
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.shared.router.pending_count()
    }

    /// Spawn clangd and complete the initialize handshake.
    ///
    /// A no-op when already Ready. On failure the process is torn down and the
    /// state returns to Stopped.
    pub(crate) async fn start(&self) -> BridgeResult<()> {
        let mut live = self.live.lock().await;
        if live.is_some() {
            if self.is_ready() {
                return Ok(());
            }
            if let Some(stale) = live.take() {
                stale.teardown().await;
            }
        }

        self.shared.set_state(BridgeState::Starting);
        let result = self.launch_and_handshake(&mut live).await;

        if let Err(e) = &result {
            warn!(
                target: "qcc_lsp::bridge",
                "clangd failed to start ({}): {}",
                self.plan.command.display(),
                e
            );
            self.shared.close_outbound();
            self.shared.router.fail_all("clangd failed to start");
            if let Some(conn) = live.take() {
                conn.teardown().await;
            }
            self.shared.set_state(BridgeState::Stopped);
        }
        result
    }

    async fn launch_and_handshake(&self, live: &mut Option<LiveConnection>) -> BridgeResult<()> {
        let io = self.launcher.launch(&self.plan.command)?;
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = spawn_writer_task(io.stdin, rx, Arc::clone(&self.shared.router));
        let exit_shared = Arc::clone(&self.shared);
        let reader = spawn_reader_task(
            io.stdout,
            ReaderContext {
                router: Arc::clone(&self.shared.router),
                responder: tx.clone(),
                diagnostics: self.diagnostics.clone(),
                on_exit: Box::new(move |reason| exit_shared.on_peer_exit(epoch, &reason)),
            },
        );
        let stderr = io.stderr.map(spawn_stderr_logger);
        self.shared.install_outbound(tx);
        *live = Some(LiveConnection {
            process: io.process,
            reader,
            writer,
            stderr,
        });

        let id = self.shared.next_request_id();
        let request = build_initialize_request(id, &self.context, &self.plan.fallback_flags);
        let response = self
            .round_trip(id, "initialize", request, HANDSHAKE_TIMEOUT)
            .await?;
        validate_initialize_response(&response)?;

        let flushed = self.shared.mark_ready();
        match server_name(&response) {
            Some(name) => info!(target: "qcc_lsp::bridge", "Connected to {}", name),
            None => info!(target: "qcc_lsp::bridge", "Connected to clangd"),
        }
        debug!(
            target: "qcc_lsp::bridge",
            "Flushed {} queued notifications after handshake",
            flushed
        );
        Ok(())
    }

    /// Register, write, and await one request. Returns the raw response frame.
    async fn round_trip(
        &self,
        id: RequestId,
        method: &str,
        payload: Value,
        timeout: Duration,
    ) -> BridgeResult<Value> {
        let rx = self
            .shared
            .router
            .register(id, method)
            .ok_or_else(|| BridgeError::Io(std::io::Error::other("duplicate request id")))?;

        if !self.shared.enqueue(OutboundMessage::Request {
            payload,
            request_id: id,
        }) {
            self.shared.router.remove(id);
            return Err(BridgeError::NotRunning);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(BridgeError::ProcessExited("clangd exited".to_string())),
            Err(_) => {
                self.shared.router.remove(id);
                Err(BridgeError::Timeout {
                    method: method.to_string(),
                    millis: timeout.as_millis(),
                })
            }
        }
    }

    async fn wait_until_ready(&self) -> BridgeResult<()> {
        let mut rx = self.shared.state.subscribe();
        let state = match rx.wait_for(|s| *s != BridgeState::Starting).await {
            Ok(state) => *state,
            Err(_) => return Err(BridgeError::NotRunning),
        };
        if state == BridgeState::Ready {
            Ok(())
        } else {
            Err(BridgeError::NotRunning)
        }
    }

    /// Send a request and return its `result`.
    ///
    /// Waits for an in-flight handshake. Fails with `NotRunning` when the
    /// session is stopped or stopping.
    pub(crate) async fn request(&self, method: &str, params: Value) -> BridgeResult<Value> {
        self.request_with_timeout(method, params, REQUEST_TIMEOUT).await
    }

    pub(crate) async fn request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> BridgeResult<Value> {
        if !self.state().accepts_requests() {
            return Err(BridgeError::NotRunning);
        }
        self.wait_until_ready().await?;

        let id = self.shared.next_request_id();
        let response = self
            .round_trip(id, method, build_request(id, method, params), timeout)
            .await?;
        into_result(response)
    }

    /// Send a notification, buffering it while the handshake is in flight.
    pub(crate) fn notify(&self, method: &str, params: Value) {
        self.shared.notify(build_notification(method, params));
    }

    /// Whether a didOpen for `uri` was sent or queued and not closed since.
    pub(crate) fn has_document(&self, uri: &str) -> bool {
        self.shared.lock_outbound().opened.contains(uri)
    }

    /// Best-effort teardown: shutdown, exit, kill, reject what is left.
    pub(crate) async fn stop(&self) {
        let mut live = self.live.lock().await;
        let Some(conn) = live.take() else {
            self.shared.close_outbound();
            self.shared.set_state(BridgeState::Stopped);
            return;
        };

        let was_ready = self.is_ready();
        self.shared.set_state(BridgeState::Stopping);

        if was_ready {
            let id = self.shared.next_request_id();
            if let Err(e) = self
                .round_trip(id, "shutdown", build_shutdown_request(id), SHUTDOWN_TIMEOUT)
                .await
            {
                debug!(target: "qcc_lsp::bridge", "Ignoring shutdown error: {}", e);
            }
            self.shared
                .enqueue(OutboundMessage::Notification(build_exit_notification()));
        }

        let dropped = self.shared.close_outbound();
        conn.teardown().await;
        let rejected = self.shared.router.fail_all("clangd stopped");
        self.shared.set_state(BridgeState::Stopped);

        debug!(
            target: "qcc_lsp::bridge",
            "clangd stopped ({} queued notifications dropped, {} requests rejected)",
            dropped,
            rejected
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::connection::LaunchCommand;
    use super::super::test_support::FakeLauncher;
    use super::*;
    use serde_json::json;

    fn plan() -> LaunchPlan {
        LaunchPlan {
            command: LaunchCommand {
                program: "clangd".to_string(),
                args: vec![],
            },
            compile_commands_dir: String::new(),
            fallback_flags: vec!["-I/opt/basilisk".to_string()],
        }
    }

    fn bridge_with(launcher: Arc<FakeLauncher>) -> Arc<ClangdBridge> {
        let (sink, _rx) = mpsc::unbounded_channel();
        Arc::new(ClangdBridge::new(
            launcher,
            plan(),
            InitializeContext::default(),
            sink,
        ))
    }

    #[tokio::test]
    async fn notifications_before_ready_are_flushed_in_order_after_handshake() {
        let (launcher, mut peers) = FakeLauncher::manual();
        let bridge = bridge_with(launcher);

        let starting = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.start().await }
        });

        let mut peer = peers.recv().await.unwrap();
        let initialize = peer.recv().await.unwrap();
        assert_eq!(initialize["method"], "initialize");
        assert_eq!(
            initialize["params"]["initializationOptions"]["fallbackFlags"],
            json!(["-I/opt/basilisk"])
        );
        assert_eq!(bridge.state(), BridgeState::Starting);

        for n in 1..=3 {
            bridge.notify("textDocument/didOpen", json!({ "n": n }));
        }
        assert!(
            peer.recv_timeout(Duration::from_millis(100)).await.is_none(),
            "nothing may be written before the initialize response"
        );

        peer.send(json!({"jsonrpc": "2.0", "id": initialize["id"], "result": {"capabilities": {}}}))
            .await;
        starting.await.unwrap().unwrap();
        assert!(bridge.is_ready());

        assert_eq!(peer.recv().await.unwrap()["method"], "initialized");
        for n in 1..=3 {
            let frame = peer.recv().await.unwrap();
            assert_eq!(frame["method"], "textDocument/didOpen");
            assert_eq!(frame["params"]["n"], n);
        }
    }

    #[tokio::test]
    async fn documents_opened_while_starting_are_tracked() {
        let (launcher, mut peers) = FakeLauncher::manual();
        let bridge = bridge_with(launcher);

        let starting = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.start().await }
        });
        let mut peer = peers.recv().await.unwrap();
        let initialize = peer.recv().await.unwrap();

        let uri = "file:///sim/drop.c";
        bridge.notify(
            "textDocument/didOpen",
            json!({"textDocument": {"uri": uri, "languageId": "c", "version": 1, "text": ""}}),
        );
        assert!(bridge.has_document(uri));

        peer.send(json!({"jsonrpc": "2.0", "id": initialize["id"], "result": {"capabilities": {}}}))
            .await;
        starting.await.unwrap().unwrap();
        assert!(bridge.has_document(uri));

        bridge.notify("textDocument/didClose", json!({"textDocument": {"uri": uri}}));
        assert!(!bridge.has_document(uri));
        assert!(!bridge.has_document("file:///sim/other.c"));
    }

    #[tokio::test]
    async fn request_issued_while_starting_waits_for_handshake() {
        let (launcher, mut peers) = FakeLauncher::manual();
        let bridge = bridge_with(launcher);

        let starting = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.start().await }
        });
        let mut peer = peers.recv().await.unwrap();
        let initialize = peer.recv().await.unwrap();

        let hover = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.request("textDocument/hover", json!({})).await }
        });
        tokio::task::yield_now().await;

        peer.send(json!({"jsonrpc": "2.0", "id": initialize["id"], "result": {"capabilities": {}}}))
            .await;
        starting.await.unwrap().unwrap();

        assert_eq!(peer.recv().await.unwrap()["method"], "initialized");
        let request = peer.recv().await.unwrap();
        assert_eq!(request["method"], "textDocument/hover");
        peer.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": {"contents": "x"}}))
            .await;

        assert_eq!(hover.await.unwrap().unwrap(), json!({"contents": "x"}));
    }

    #[tokio::test]
    async fn peer_error_is_scoped_to_its_caller() {
        let (launcher, mut peers) = FakeLauncher::manual();
        let bridge = bridge_with(launcher);
        let starting = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.start().await }
        });
        let mut peer = peers.recv().await.unwrap();
        let initialize = peer.recv().await.unwrap();
        peer.send(json!({"jsonrpc": "2.0", "id": initialize["id"], "result": {"capabilities": {}}}))
            .await;
        starting.await.unwrap().unwrap();
        let _initialized = peer.recv().await.unwrap();

        let failing = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.request("textDocument/definition", json!({})).await }
        });
        let request = peer.recv().await.unwrap();
        peer.send(json!({"jsonrpc": "2.0", "id": request["id"], "error": {"code": -32601, "message": "unsupported"}}))
            .await;

        let err = failing.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Peer { code: -32601, .. }));
        assert!(bridge.is_ready(), "a single failed request must not tear down the session");
    }

    #[tokio::test]
    async fn process_exit_rejects_pending_and_stops() {
        let (launcher, mut peers) = FakeLauncher::manual();
        let bridge = bridge_with(launcher);
        let starting = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.start().await }
        });
        let mut peer = peers.recv().await.unwrap();
        let initialize = peer.recv().await.unwrap();
        peer.send(json!({"jsonrpc": "2.0", "id": initialize["id"], "result": {"capabilities": {}}}))
            .await;
        starting.await.unwrap().unwrap();
        let _initialized = peer.recv().await.unwrap();

        let pending = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.request("textDocument/references", json!({})).await }
        });
        let _request = peer.recv().await.unwrap();
        drop(peer);

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::ProcessExited(_)), "got {:?}", err);
        assert_eq!(err.to_string(), "clangd exited");

        let mut state = bridge.shared.state.subscribe();
        state
            .wait_for(|s| *s == BridgeState::Stopped)
            .await
            .unwrap();
        assert_eq!(bridge.pending_count(), 0);
        assert!(matches!(
            bridge.request("textDocument/hover", json!({})).await,
            Err(BridgeError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn failed_handshake_returns_to_stopped() {
        let (launcher, mut peers) = FakeLauncher::manual();
        let bridge = bridge_with(launcher);
        let starting = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.start().await }
        });
        let mut peer = peers.recv().await.unwrap();
        let initialize = peer.recv().await.unwrap();
        peer.send(json!({"jsonrpc": "2.0", "id": initialize["id"], "error": {"code": -32002, "message": "boom"}}))
            .await;

        let err = starting.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Handshake(_)));
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }

    #[tokio::test]
    async fn stop_sends_shutdown_then_exit() {
        let launcher = FakeLauncher::auto();
        let bridge = bridge_with(Arc::clone(&launcher));

        bridge.start().await.unwrap();
        bridge.start().await.unwrap();
        assert_eq!(launcher.spawn_count(), 1, "start is a no-op when ready");

        bridge.stop().await;
        assert_eq!(bridge.state(), BridgeState::Stopped);

        let methods = launcher.wait_for_methods(0, 4).await;
        assert_eq!(
            methods,
            ["initialize", "initialized", "shutdown", "exit"],
            "unexpected wire sequence"
        );
    }

    #[tokio::test]
    async fn spawn_failure_is_reported_and_leaves_bridge_stopped() {
        let launcher = FakeLauncher::failing();
        let bridge = bridge_with(launcher);

        let err = bridge.start().await.unwrap_err();
        assert!(matches!(err, BridgeError::Spawn { .. }));
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }
}
