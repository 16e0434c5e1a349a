#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for the Connect Four client integration tests.
//!
//! Provides a channel-backed [`MockTransport`] driven from a [`MockServer`]
//! handle, a [`RecordingRenderer`], and helpers for building server frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use connect_four_client::protocol::{CloseCode, Field, Player, ServerMessage};
use connect_four_client::{ClientError, Renderer, Transport};
use tokio::sync::mpsc;

type Scripted = Option<Result<String, ClientError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// Client half of a scripted connection.
///
/// `recv()` yields whatever the [`MockServer`] pushes, in order. Once the
/// server handle is dropped it hangs forever so the session stays alive until
/// shutdown.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Scripted>,
    sent: Arc<StdMutex<Vec<String>>>,
    closes: Arc<StdMutex<Vec<CloseCode>>>,
    fail_sends: Arc<AtomicBool>,
}

/// Server half of a scripted connection.
pub struct MockServer {
    tx: mpsc::UnboundedSender<Scripted>,
    sent: Arc<StdMutex<Vec<String>>>,
    closes: Arc<StdMutex<Vec<CloseCode>>>,
    fail_sends: Arc<AtomicBool>,
}

/// Create a connected `(transport, server)` pair.
pub fn mock_pair() -> (MockTransport, MockServer) {
    let (tx, incoming) = mpsc::unbounded_channel();
    let sent = Arc::new(StdMutex::new(Vec::new()));
    let closes = Arc::new(StdMutex::new(Vec::new()));
    let fail_sends = Arc::new(AtomicBool::new(false));
    let transport = MockTransport {
        incoming,
        sent: Arc::clone(&sent),
        closes: Arc::clone(&closes),
        fail_sends: Arc::clone(&fail_sends),
    };
    let server = MockServer {
        tx,
        sent,
        closes,
        fail_sends,
    };
    (transport, server)
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ClientError::TransportSend("broken pipe".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        match self.incoming.recv().await {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), ClientError> {
        self.closes.lock().unwrap().push(code);
        Ok(())
    }
}

impl MockServer {
    /// Deliver a text frame to the client.
    pub fn push(&self, frame: impl Into<String>) {
        self.tx.send(Some(Ok(frame.into()))).unwrap();
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) {
        self.tx.send(None).unwrap();
    }

    /// Make the client's next `recv()` fail.
    pub fn fail(&self, reason: &str) {
        self.tx
            .send(Some(Err(ClientError::TransportReceive(reason.into()))))
            .unwrap();
    }

    /// Make every following client `send()` fail with
    /// [`ClientError::TransportSend`].
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Frames the client has sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Close codes the client has requested so far.
    pub fn closes(&self) -> Vec<CloseCode> {
        self.closes.lock().unwrap().clone()
    }
}

/// Give the session task time to process what was queued.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ── RecordingRenderer ───────────────────────────────────────────────

/// One call the client made into its renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    JoinLink(String),
    WatchLink(String),
    Move(String, Field, Field),
    Announce(String),
}

/// A `Move` render call as the session would record it.
pub fn moved(player: &str, column: i64, row: i64) -> RenderCall {
    RenderCall::Move(player.into(), Field::from(column), Field::from(row))
}

/// A renderer that records every call into a shared log.
pub struct RecordingRenderer {
    log: Arc<StdMutex<Vec<RenderCall>>>,
}

/// Read side of a [`RecordingRenderer`].
#[derive(Clone)]
pub struct RenderLog(Arc<StdMutex<Vec<RenderCall>>>);

/// Create a renderer together with the handle used to inspect it.
pub fn recording_renderer() -> (RecordingRenderer, RenderLog) {
    let log = Arc::new(StdMutex::new(Vec::new()));
    let renderer = RecordingRenderer {
        log: Arc::clone(&log),
    };
    (renderer, RenderLog(log))
}

impl RenderLog {
    pub fn calls(&self) -> Vec<RenderCall> {
        self.0.lock().unwrap().clone()
    }

    pub fn announcements(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Announce(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn set_join_link(&mut self, href: &str) {
        self.log
            .lock()
            .unwrap()
            .push(RenderCall::JoinLink(href.into()));
    }

    fn set_watch_link(&mut self, href: &str) {
        self.log
            .lock()
            .unwrap()
            .push(RenderCall::WatchLink(href.into()));
    }

    fn apply_move(&mut self, player: &Player, column: &Field, row: &Field) {
        let call = RenderCall::Move(player.to_string(), column.clone(), row.clone());
        self.log.lock().unwrap().push(call);
    }

    fn announce(&mut self, message: &str) {
        self.log
            .lock()
            .unwrap()
            .push(RenderCall::Announce(message.into()));
    }
}

// ── JSON helper functions ───────────────────────────────────────────

/// A server `init` event announcing both keys.
pub fn init_json(join: &str, watch: &str) -> String {
    serde_json::to_string(&ServerMessage::Init {
        join: Some(Field::from(join)),
        watch: Some(Field::from(watch)),
    })
    .expect("init_json serialization")
}

/// A server `play` event.
pub fn play_json(player: &str, column: i64, row: i64) -> String {
    serde_json::to_string(&ServerMessage::Play {
        player: Player::new(player),
        column: Field::from(column),
        row: Field::from(row),
    })
    .expect("play_json serialization")
}

/// A server `win` event.
pub fn win_json(player: &str) -> String {
    serde_json::to_string(&ServerMessage::Win {
        player: Player::new(player),
    })
    .expect("win_json serialization")
}

/// A server `error` event.
pub fn error_json(message: &str) -> String {
    serde_json::to_string(&ServerMessage::Error {
        message: Field::from(message),
    })
    .expect("error_json serialization")
}
