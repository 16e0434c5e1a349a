//! Async game session for the Connect Four client.
//!
//! [`GameClient`] is a thin handle around a background session task. The task
//! owns the [`Connection`], the [`Dispatcher`] and the renderer; the handle
//! forwards user activations to it over an unbounded MPSC channel and can ask
//! it to shut down.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = WebSocketTransport::connect("ws://localhost:8001").await?;
//! let role = resolve_role(&InvocationParams::from_query("?join=abc"));
//! let board = TextBoard::new(std::io::stdout());
//! let mut client = GameClient::start(transport, role, board, ClientConfig::new());
//!
//! client.activate(Activation::on_column(3));
//!
//! match client.wait().await? {
//!     SessionEnd::Won { winner } => println!("{winner} won"),
//!     SessionEnd::ServerClosed | SessionEnd::Shutdown => {}
//! }
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::dispatcher::{Dispatcher, Flow};
use crate::error::{ClientError, Result};
use crate::input::InputCapture;
use crate::protocol::{self, ClientMessage, CloseCode, Player};
use crate::renderer::{Activation, Renderer};
use crate::role::Role;
use crate::transport::{Connection, ConnectionState, StateObserver, Transport};

/// Address the game server listens on when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8001";

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`GameClient`] session.
///
/// # Example
///
/// ```
/// use connect_four_client::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new()
///     .with_server_url("ws://games.example:8001")
///     .with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.server_url, "ws://games.example:8001");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the game server. Only used by [`GameClient::connect`].
    ///
    /// Defaults to `ws://localhost:8001`.
    pub server_url: String,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`GameClient::shutdown`] is called, the session task is given this
    /// much time to close the connection. If it expires the task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the server URL.
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// `winner` won and the client closed the connection normally.
    Won { winner: Player },
    /// The server closed the connection.
    ServerClosed,
    /// [`GameClient::shutdown`] was called or the handle was dropped.
    Shutdown,
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a running game session.
///
/// Created via [`GameClient::start`], which spawns the session task. The
/// handshake is sent as soon as the task runs; there is nothing to call
/// before activations start flowing.
pub struct GameClient {
    /// Sender half of the activation channel to the session task.
    input_tx: mpsc::UnboundedSender<Activation>,
    /// Connection state written by the session task.
    connection: StateObserver,
    role: Role,
    task: Option<tokio::task::JoinHandle<Result<SessionEnd>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Flips to `true` when the session task exits.
    done_rx: watch::Receiver<bool>,
    shutdown_timeout: Duration,
}

impl GameClient {
    /// Start a session on a connected transport.
    ///
    /// # Arguments
    ///
    /// * `transport`: A connected [`Transport`] implementation.
    /// * `role`: The role resolved from the invocation parameters.
    /// * `renderer`: Where board updates and announcements go.
    /// * `config`: Session configuration.
    pub fn start(
        transport: impl Transport,
        role: Role,
        renderer: impl Renderer,
        config: ClientConfig,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel::<Activation>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = watch::channel(false);

        let connection = Connection::new(transport);
        let observer = connection.observer();
        let capture = InputCapture::new(&role);
        let dispatcher = Dispatcher::new(role.clone(), renderer);

        let task = tokio::spawn(async move {
            let end = session_loop(connection, dispatcher, capture, input_rx, shutdown_rx).await;
            let _ = done_tx.send(true);
            end
        });

        Self {
            input_tx,
            connection: observer,
            role,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            done_rx,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Connect to `config.server_url` over WebSocket and start a session.
    ///
    /// # Errors
    ///
    /// Returns the error from [`WebSocketTransport::connect`](crate::WebSocketTransport::connect).
    #[cfg(feature = "transport-websocket")]
    pub async fn connect(
        role: Role,
        renderer: impl Renderer,
        config: ClientConfig,
    ) -> Result<Self> {
        let transport = crate::WebSocketTransport::connect(&config.server_url).await?;
        Ok(Self::start(transport, role, renderer, config))
    }

    /// Forward a user activation to the session.
    ///
    /// Never fails: activations from spectators, without a column, or after
    /// the connection left the open state are dropped by the session.
    pub fn activate(&self, activation: Activation) {
        if self.input_tx.send(activation).is_err() {
            debug!("session ended, dropping activation");
        }
    }

    /// The role this session runs as.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.get()
    }

    /// Returns `true` once the session task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Resolves once the session task has exited, without consuming its
    /// result. Usable from a `tokio::select!` alongside [`activate`](Self::activate).
    pub async fn finished(&self) {
        let mut done = self.done_rx.clone();
        if done.wait_for(|done| *done).await.is_err() {
            debug!("session task gone without reporting completion");
        }
    }

    /// Wait for the session to end.
    ///
    /// # Errors
    ///
    /// Fatal protocol failures ([`ClientError::Decode`],
    /// [`ClientError::ProtocolViolation`]) and transport failures end the
    /// session with an error. Returns [`ClientError::NotConnected`] if the
    /// session was already awaited or shut down.
    pub async fn wait(&mut self) -> Result<SessionEnd> {
        let Some(task) = self.task.take() else {
            return Err(ClientError::NotConnected);
        };
        match task.await {
            Ok(end) => end,
            Err(join_err) => {
                warn!("session task terminated with join error: {join_err}");
                Err(ClientError::TransportClosed)
            }
        }
    }

    /// Close the connection and stop the session task.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] if the task did not exit within
    /// [`ClientConfig::shutdown_timeout`] and had to be aborted, otherwise
    /// whatever the session ended with.
    pub async fn shutdown(&mut self) -> Result<SessionEnd> {
        debug!("GameClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let Some(mut task) = self.task.take() else {
            return Err(ClientError::NotConnected);
        };
        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(Ok(end)) => end,
            Ok(Err(join_err)) => {
                warn!("session task terminated with join error: {join_err}");
                Err(ClientError::TransportClosed)
            }
            Err(_) => {
                warn!("session task did not exit within timeout; aborting task");
                task.abort();
                if let Err(join_err) = task.await {
                    debug!("session task aborted: {join_err}");
                }
                Err(ClientError::Timeout)
            }
        }
    }
}

impl std::fmt::Debug for GameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("role", &self.role)
            .field("connection", &self.connection_state())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        // Dropping the channel senders ends the session loop, which closes
        // the connection with `CloseCode::NORMAL` in the background.
        if !self.is_finished() {
            debug!("GameClient dropped, closing session in the background");
        }
    }
}

// ── Session loop ────────────────────────────────────────────────────

/// Background session loop.
///
/// Sends the handshake, then multiplexes activations, the shutdown signal and
/// inbound frames via `tokio::select!`, handling each to completion before the
/// next. Exits when:
/// - the game is won (connection closed with [`CloseCode::NORMAL`])
/// - a frame is undecodable or out of order (closed with [`CloseCode::PROTOCOL_ERROR`])
/// - the server closes the connection or the transport fails
/// - shutdown is requested, or the handle is dropped and its channels close
async fn session_loop<T: Transport, R: Renderer>(
    mut connection: Connection<T>,
    mut dispatcher: Dispatcher<R>,
    capture: InputCapture,
    mut input_rx: mpsc::UnboundedReceiver<Activation>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> Result<SessionEnd> {
    debug!("session loop started");

    connection.mark_open();
    let init = dispatcher.on_open()?;
    if let Err(e) = connection.send(protocol::encode(&init)?).await {
        error!("failed to send init: {e}");
        dispatcher.on_close();
        return Err(e);
    }
    info!(role = ?dispatcher.role(), "init sent");

    let end = loop {
        tokio::select! {
            // Branch 1: user activation from the handle
            activation = input_rx.recv() => {
                let Some(activation) = activation else {
                    debug!("activation channel closed, shutting down session");
                    let _ = connection.close(CloseCode::NORMAL).await;
                    dispatcher.on_close();
                    break Ok(SessionEnd::Shutdown);
                };
                if let Some(command) = capture.capture(activation, connection.state()) {
                    if let Err(e) = send_command(&mut connection, &command).await {
                        error!("transport send error: {e}");
                        dispatcher.on_close();
                        break Err(e);
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = connection.close(CloseCode::NORMAL).await;
                dispatcher.on_close();
                break Ok(SessionEnd::Shutdown);
            }

            // Branch 3: inbound frame from the server
            incoming = connection.recv() => {
                match incoming {
                    Some(Ok(text)) => match dispatcher.on_message(&text) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::GameOver { winner, close }) => {
                            let _ = connection.close(close).await;
                            break Ok(SessionEnd::Won { winner });
                        }
                        Err(e) => {
                            error!("abandoning session: {e}");
                            let _ = connection.close(CloseCode::PROTOCOL_ERROR).await;
                            break Err(e);
                        }
                    },
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        dispatcher.on_close();
                        break Err(e);
                    }
                    None => {
                        info!("connection closed by server");
                        dispatcher.on_close();
                        break Ok(SessionEnd::ServerClosed);
                    }
                }
            }
        }
    };

    debug!("session loop exited");
    end
}

/// Send a move. A connection that is no longer open drops it silently.
async fn send_command<T: Transport>(
    connection: &mut Connection<T>,
    command: &ClientMessage,
) -> Result<()> {
    let frame = protocol::encode(command)?;
    match connection.send(frame).await {
        Ok(()) => {
            debug!(?command, "move sent");
            Ok(())
        }
        Err(ClientError::NotConnected) => {
            debug!("connection not open, move dropped");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::renderer::TextBoard;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex as StdMutex};

    // ── Mock transport ──────────────────────────────────────────────

    /// A mock transport that records sent messages and replays scripted responses.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, ClientError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closes: Arc<StdMutex<Vec<CloseCode>>>,
    }

    impl MockTransport {
        #[allow(clippy::type_complexity)]
        fn new(
            incoming: Vec<Option<std::result::Result<String, ClientError>>>,
        ) -> (
            Self,
            Arc<StdMutex<Vec<String>>>,
            Arc<StdMutex<Vec<CloseCode>>>,
        ) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closes = Arc::new(StdMutex::new(Vec::new()));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closes: Arc::clone(&closes),
            };
            (transport, sent, closes)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), ClientError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                // Scripted frames exhausted: stay open until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self, code: CloseCode) -> std::result::Result<(), ClientError> {
            self.closes.lock().unwrap().push(code);
            Ok(())
        }
    }

    fn frame(text: &str) -> Option<std::result::Result<String, ClientError>> {
        Some(Ok(text.to_owned()))
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn start_sends_init_first() {
        let (transport, sent, _closes) = MockTransport::new(vec![]);
        let mut client = GameClient::start(
            transport,
            Role::Initiator,
            TextBoard::new(Vec::new()),
            ClientConfig::new(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.connection_state(), ConnectionState::Open);
        assert_eq!(*sent.lock().unwrap(), vec![r#"{"type":"init"}"#.to_owned()]);

        assert_eq!(client.shutdown().await.unwrap(), SessionEnd::Shutdown);
        assert_eq!(client.connection_state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn win_closes_with_normal_code() {
        let (transport, _sent, closes) =
            MockTransport::new(vec![frame(r#"{"type":"win","player":"red"}"#)]);
        let mut client = GameClient::start(
            transport,
            Role::Joiner("abc".into()),
            TextBoard::new(Vec::new()),
            ClientConfig::new(),
        );

        let end = client.wait().await.unwrap();
        assert_eq!(
            end,
            SessionEnd::Won {
                winner: Player::new("red")
            }
        );
        assert_eq!(*closes.lock().unwrap(), vec![CloseCode::NORMAL]);
        assert!(client.is_finished());
    }

    #[tokio::test]
    async fn wait_twice_is_not_connected() {
        let (transport, _sent, _closes) = MockTransport::new(vec![None]);
        let mut client = GameClient::start(
            transport,
            Role::Initiator,
            TextBoard::new(Vec::new()),
            ClientConfig::new(),
        );
        assert_eq!(client.wait().await.unwrap(), SessionEnd::ServerClosed);
        assert!(matches!(client.wait().await, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, "ws://localhost:8001");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }
}
