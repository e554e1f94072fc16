//! LSP client for E2E tests.
//!
//! Spawns the qcc-lsp binary and talks JSON-RPC 2.0 over its stdio. A reader
//! thread decodes frames into a channel so every wait can time out.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{Receiver, channel};
use std::time::{Duration, Instant};

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct LspClient {
    child: Child,
    stdin: Option<ChildStdin>,
    incoming: Receiver<Value>,
    /// Notifications seen while waiting for something else.
    backlog: Vec<Value>,
    request_id: i64,
}

fn read_frame(reader: &mut impl BufRead) -> Option<Value> {
    let mut length = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).ok()? == 0 {
            return None;
        }
        let header = header.trim_end();
        if header.is_empty() {
            if length.is_some() {
                break;
            }
            continue;
        }
        if let Some(value) = header.strip_prefix("Content-Length:") {
            length = value.trim().parse::<usize>().ok();
        }
    }
    let mut body = vec![0u8; length?];
    reader.read_exact(&mut body).ok()?;
    serde_json::from_slice(&body).ok()
}

impl LspClient {
    /// Spawn the server with `home` as its home and config directory, so no
    /// user config leaks in.
    pub fn new(home: &Path) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_qcc-lsp"))
            .env("HOME", home)
            .env("XDG_CONFIG_HOME", home.join(".config"))
            .env_remove("BASILISK")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn qcc-lsp binary");

        let stdin = child.stdin.take().expect("Failed to get stdin");
        let stdout = child.stdout.take().expect("Failed to get stdout");
        let (tx, incoming) = channel();
        std::thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            while let Some(message) = read_frame(&mut reader) {
                if tx.send(message).is_err() {
                    break;
                }
            }
        });

        Self {
            child,
            stdin: Some(stdin),
            incoming,
            backlog: Vec::new(),
            request_id: 0,
        }
    }

    /// Send a request and wait for its response. Server-to-client requests
    /// are answered with `null`.
    pub fn send_request(&mut self, method: &str, params: Value) -> Value {
        self.request_id += 1;
        let id = self.request_id;
        let mut request = json!({"jsonrpc": "2.0", "id": id, "method": method});
        if !params.is_null() {
            request["params"] = params;
        }
        self.send_message(&request);

        let deadline = Instant::now() + RESPONSE_TIMEOUT;
        loop {
            let message = self
                .next_message(deadline)
                .unwrap_or_else(|| panic!("Timeout waiting for response to {method}"));
            if message.get("method").is_some() {
                self.handle_incoming(message);
                continue;
            }
            if message["id"].as_i64() == Some(id) {
                return message;
            }
        }
    }

    pub fn send_notification(&mut self, method: &str, params: Value) {
        let mut notification = json!({"jsonrpc": "2.0", "method": method});
        if !params.is_null() {
            notification["params"] = params;
        }
        self.send_message(&notification);
    }

    /// Wait for a notification of `method` matching `predicate`.
    pub fn wait_for_notification(
        &mut self,
        method: &str,
        timeout: Duration,
        predicate: impl Fn(&Value) -> bool,
    ) -> Option<Value> {
        let matches = |m: &Value| m["method"] == method && predicate(&m["params"]);
        if let Some(index) = self.backlog.iter().position(|m| matches(m)) {
            return Some(self.backlog.remove(index)["params"].clone());
        }
        let deadline = Instant::now() + timeout;
        while let Some(message) = self.next_message(deadline) {
            if message.get("id").is_some() && message.get("method").is_some() {
                self.answer_server_request(&message);
            } else if matches(&message) {
                return Some(message["params"].clone());
            } else {
                self.backlog.push(message);
            }
        }
        None
    }

    /// The next `publishDiagnostics` params for `uri`.
    pub fn wait_for_diagnostics(&mut self, uri: &str, timeout: Duration) -> Option<Value> {
        self.wait_for_notification("textDocument/publishDiagnostics", timeout, |params| {
            params["uri"] == uri
        })
    }

    fn next_message(&mut self, deadline: Instant) -> Option<Value> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.incoming.recv_timeout(remaining).ok()
    }

    fn handle_incoming(&mut self, message: Value) {
        if message.get("id").is_some() {
            self.answer_server_request(&message);
        } else {
            self.backlog.push(message);
        }
    }

    fn answer_server_request(&mut self, request: &Value) {
        let response = json!({"jsonrpc": "2.0", "id": request["id"], "result": null});
        self.send_message(&response);
    }

    fn send_message(&mut self, message: &Value) {
        let body = serde_json::to_string(message).expect("Failed to serialize message");
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin.write_all(header.as_bytes()).expect("Failed to write header");
        stdin.write_all(body.as_bytes()).expect("Failed to write body");
        stdin.flush().expect("Failed to flush stdin");
    }

    /// `initialize` + `initialized` with `options` as initializationOptions.
    pub fn initialize(&mut self, root_uri: Option<&str>, options: Value) -> Value {
        let response = self.send_request(
            "initialize",
            json!({
                "processId": std::process::id(),
                "rootUri": root_uri,
                "capabilities": {},
                "initializationOptions": options
            }),
        );
        self.send_notification("initialized", json!({}));
        response
    }

    pub fn child(&mut self) -> &mut Child {
        &mut self.child
    }

    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }
}

impl Drop for LspClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
