//! # Loopback Example
//!
//! Shows how to implement the [`Transport`] trait with a simple in-process
//! loopback channel, and plays a short game against a fake server on the
//! other end. Useful for:
//!
//! - **Testing**: drive the client without a real game server
//! - **Custom backends**: adapt any text message channel to the client
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback
//! ```

use async_trait::async_trait;
use connect_four_client::protocol::{decode_command, ClientMessage, CloseCode, ServerMessage};
use connect_four_client::{
    Activation, ClientConfig, ClientError, Field, GameClient, Player, Role, SessionEnd, TextBoard,
    Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of the loopback, handed to `GameClient::start`.
pub struct LoopbackTransport {
    /// Frames the client sends go here (server reads from the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Frames the server sends arrive here.
    rx: mpsc::UnboundedReceiver<String>,
}

/// The "server side" of the loopback.
pub struct LoopbackServer {
    /// Read what the client sent.
    pub rx: mpsc::UnboundedReceiver<String>,
    /// Send events to the client.
    pub tx: mpsc::UnboundedSender<String>,
}

/// Create a connected `(transport, server)` pair.
fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();

    let transport = LoopbackTransport {
        tx: client_tx,
        rx: client_rx,
    };
    let server = LoopbackServer {
        rx: server_rx,
        tx: server_tx,
    };

    (transport, server)
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement the Transport trait
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        self.tx
            .send(message)
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    /// Cancel-safe because `mpsc::UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        self.rx.recv().await.map(Ok)
    }

    /// Channels have no closing handshake; log the code and stop reading.
    async fn close(&mut self, code: CloseCode) -> Result<(), ClientError> {
        tracing::info!(%code, "client closed the loopback");
        self.rx.close();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Play a game against a fake server
// ─────────────────────────────────────────────────────────────────────

fn event(message: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, mut server) = loopback_pair();
    let mut client = GameClient::start(
        transport,
        Role::Initiator,
        TextBoard::new(std::io::stdout()),
        ClientConfig::new(),
    );

    // ── Fake server: handshake ──────────────────────────────────────
    let Some(init) = server.rx.recv().await else {
        return Err("client hung up before sending init".into());
    };
    tracing::info!("server received: {init}");
    if !matches!(decode_command(&init)?, ClientMessage::Init { .. }) {
        return Err(format!("expected init, got {init}").into());
    }
    server.tx.send(event(&ServerMessage::Init {
        join: Some("8gKJ3x".into()),
        watch: Some("Qm2pLz".into()),
    })?)?;

    // ── Four moves down the same column, answered by the server ─────
    let red = Player::new("red");
    let yellow = Player::new("yellow");
    for row in 0..4 {
        client.activate(Activation::on_column(3));
        let Some(frame) = server.rx.recv().await else {
            return Err("client hung up mid-game".into());
        };
        let ClientMessage::Play { column } = decode_command(&frame)? else {
            return Err(format!("expected play, got {frame}").into());
        };
        server.tx.send(event(&ServerMessage::Play {
            player: red.clone(),
            column: Field::from(i64::from(column)),
            row: Field::from(row),
        })?)?;
        if row < 3 {
            server.tx.send(event(&ServerMessage::Play {
                player: yellow.clone(),
                column: Field::from(4),
                row: Field::from(row),
            })?)?;
        }
    }
    server.tx.send(event(&ServerMessage::Win { player: red })?)?;

    // ── Result ──────────────────────────────────────────────────────
    match client.wait().await? {
        SessionEnd::Won { winner } => tracing::info!("done: {winner} won"),
        other => tracing::warn!("session ended without a winner: {other:?}"),
    }
    Ok(())
}
