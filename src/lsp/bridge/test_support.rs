//! In-memory clangd stand-ins for bridge tests.
//!
//! [`FakeLauncher`] hands out duplex pipes instead of spawning a process and
//! counts how many sessions were launched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

use super::connection::{LaunchCommand, PeerIo, PeerLauncher};
use super::framing::{FrameDecoder, encode_frame};
use crate::error::BridgeError;

/// The clangd side of an in-memory session.
pub(crate) struct FakePeer {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
    decoder: FrameDecoder,
    ready: VecDeque<Value>,
}

impl FakePeer {
    /// Next frame written by the bridge, or `None` once the pipe closes.
    pub(crate) async fn recv(&mut self) -> Option<Value> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(frame);
            }
            match self.reader.read(&mut chunk).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.ready.extend(self.decoder.push(&chunk[..n])),
            }
        }
    }

    pub(crate) async fn recv_timeout(&mut self, timeout: Duration) -> Option<Value> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    pub(crate) async fn send(&mut self, message: Value) {
        let frame = encode_frame(&message).unwrap();
        let _ = self.writer.write_all(&frame).await;
        let _ = self.writer.flush().await;
    }
}

enum Mode {
    /// Peers are handed to the test through a channel.
    Manual(mpsc::UnboundedSender<FakePeer>),
    /// Peers answer `initialize` and `shutdown` on their own.
    Auto,
    /// Every launch fails as if the binary were missing.
    Failing,
}

pub(crate) struct FakeLauncher {
    mode: Mode,
    spawns: AtomicUsize,
    commands: Mutex<Vec<LaunchCommand>>,
    /// Frames received per launched session, in arrival order.
    seen: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl FakeLauncher {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            spawns: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn manual() -> (Arc<Self>, mpsc::UnboundedReceiver<FakePeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self::with_mode(Mode::Manual(tx))), rx)
    }

    pub(crate) fn auto() -> Arc<Self> {
        Arc::new(Self::with_mode(Mode::Auto))
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self::with_mode(Mode::Failing))
    }

    pub(crate) fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub(crate) fn commands(&self) -> Vec<LaunchCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Methods of every frame session `index` has received so far.
    pub(crate) fn methods_seen(&self, index: usize) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .get(index)
            .map(|frames| {
                frames
                    .iter()
                    .filter_map(|f| f.get("method").and_then(|m| m.as_str()))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Poll until session `index` has received at least `count` method frames.
    pub(crate) async fn wait_for_methods(&self, index: usize, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let methods = self.methods_seen(index);
            if methods.len() >= count {
                return methods;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.methods_seen(index)
    }
}

impl PeerLauncher for FakeLauncher {
    fn launch(&self, command: &LaunchCommand) -> Result<PeerIo, BridgeError> {
        self.commands.lock().unwrap().push(command.clone());
        if let Mode::Failing = self.mode {
            return Err(BridgeError::Spawn {
                command: command.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }
        self.spawns.fetch_add(1, Ordering::SeqCst);

        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let (their_read, their_write) = tokio::io::split(theirs);
        let peer = FakePeer {
            reader: their_read,
            writer: their_write,
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
        };

        match &self.mode {
            Mode::Manual(tx) => {
                let _ = tx.send(peer);
            }
            Mode::Auto => {
                let index = {
                    let mut seen = self.seen.lock().unwrap();
                    seen.push(Vec::new());
                    seen.len() - 1
                };
                tokio::spawn(auto_respond(peer, Arc::clone(&self.seen), index));
            }
            Mode::Failing => unreachable!(),
        }

        Ok(PeerIo {
            stdin: Box::new(our_write),
            stdout: Box::new(our_read),
            stderr: None,
            process: None,
        })
    }
}

async fn auto_respond(mut peer: FakePeer, seen: Arc<Mutex<Vec<Vec<Value>>>>, index: usize) {
    while let Some(frame) = peer.recv().await {
        seen.lock().unwrap()[index].push(frame.clone());
        let method = frame.get("method").and_then(|m| m.as_str()).unwrap_or("");
        match method {
            "initialize" => {
                peer.send(json!({
                    "jsonrpc": "2.0",
                    "id": frame["id"],
                    "result": {"capabilities": {}, "serverInfo": {"name": "fake-clangd"}}
                }))
                .await;
            }
            "shutdown" => {
                peer.send(json!({"jsonrpc": "2.0", "id": frame["id"], "result": null}))
                    .await;
            }
            "exit" => break,
            _ => {}
        }
    }
}
