//! Transport abstraction and connection lifecycle.
//!
//! The [`Transport`] trait is a bidirectional text message channel between
//! the client and the game server. It does no parsing; every implementation
//! only moves complete JSON text frames (WebSocket frames, channel messages,
//! and so on).
//!
//! [`Connection`] wraps a transport and owns its [`ConnectionState`]. The
//! rest of the crate only reads that state, through a [`StateObserver`].
//!
//! # Connection Setup
//!
//! Connection setup is NOT part of this trait: different transports need
//! different addressing. Construct a connected transport externally, then
//! pass it to `GameClient::start`.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use connect_four_client::error::ClientError;
//! use connect_four_client::protocol::CloseCode;
//! use connect_four_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ClientError> {
//!         // Send the JSON text message over your transport
//!         unimplemented!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ClientError>> {
//!         // Receive the next JSON text message
//!         // Return None when the connection is closed
//!         unimplemented!()
//!     }
//!
//!     async fn close(&mut self, code: CloseCode) -> Result<(), ClientError> {
//!         // Start the closing handshake with `code`
//!         unimplemented!()
//!     }
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::protocol::CloseCode;

/// A bidirectional text message transport.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message.
///
/// This trait is object-safe, so `Box<dyn Transport>` works for dynamic
/// dispatch.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the session loop
/// polls it inside `tokio::select!`. If `recv` is cancelled before completion,
/// calling it again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportSend`] if the message could not be sent,
    /// or [`ClientError::TransportClosed`] after [`close`](Transport::close).
    async fn send(&mut self, message: String) -> std::result::Result<(), ClientError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed
    async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>>;

    /// Start a graceful close with the given status code.
    ///
    /// Calling it more than once must be harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake could not be started.
    /// Implementations should still release resources in that case.
    async fn close(&mut self, code: CloseCode) -> std::result::Result<(), ClientError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, message: String) -> std::result::Result<(), ClientError> {
        (**self).send(message).await
    }

    async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>> {
        (**self).recv().await
    }

    async fn close(&mut self, code: CloseCode) -> std::result::Result<(), ClientError> {
        (**self).close(code).await
    }
}

// ── Connection state ────────────────────────────────────────────────

/// Lifecycle of the single connection a session owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Transport handed over, handshake not yet sent.
    Connecting = 0,
    /// Messages may flow both ways.
    Open = 1,
    /// A close was requested; no more sends.
    Closing = 2,
    /// The connection is gone.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Read-only view of a [`Connection`]'s state, shareable across tasks.
#[derive(Debug, Clone)]
pub struct StateObserver(Arc<AtomicU8>);

impl StateObserver {
    /// The current connection state.
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }
}

// ── Connection ──────────────────────────────────────────────────────

/// A [`Transport`] plus the [`ConnectionState`] it is in.
///
/// All sends and closes go through here so the state stays truthful:
/// sends are refused unless the connection is [`Open`](ConnectionState::Open),
/// and [`close`](Connection::close) is idempotent.
pub struct Connection<T> {
    transport: T,
    state: Arc<AtomicU8>,
}

impl<T: Transport> Connection<T> {
    /// Wrap a connected transport. The connection starts out
    /// [`Connecting`](ConnectionState::Connecting) until [`mark_open`](Self::mark_open).
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: Arc::new(AtomicU8::new(ConnectionState::Connecting as u8)),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// A handle other components can poll for the state.
    pub fn observer(&self) -> StateObserver {
        StateObserver(Arc::clone(&self.state))
    }

    /// Transition `Connecting → Open`. Has no effect in any other state.
    pub fn mark_open(&mut self) {
        let _ = self.state.compare_exchange(
            ConnectionState::Connecting as u8,
            ConnectionState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] without touching the transport
    /// unless the connection is open. A transport failure marks the
    /// connection closed and is returned as-is.
    pub async fn send(&mut self, frame: String) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Open {
            debug!(%state, "refusing to send on a connection that is not open");
            return Err(ClientError::NotConnected);
        }
        if let Err(e) = self.transport.send(frame).await {
            self.set_state(ConnectionState::Closed);
            return Err(e);
        }
        Ok(())
    }

    /// Receive the next frame. Cancel-safe if the transport's `recv` is.
    ///
    /// Returns `None` immediately once the connection is closed.
    pub async fn recv(&mut self) -> Option<Result<String>> {
        if self.state() == ConnectionState::Closed {
            return None;
        }
        let incoming = self.transport.recv().await;
        if !matches!(incoming, Some(Ok(_))) {
            self.set_state(ConnectionState::Closed);
        }
        incoming
    }

    /// Close with `code`. Only the first call reaches the transport.
    ///
    /// # Errors
    ///
    /// Propagates the transport's close error; the connection is marked
    /// closed regardless.
    pub async fn close(&mut self, code: CloseCode) -> Result<()> {
        match self.state() {
            ConnectionState::Closing | ConnectionState::Closed => return Ok(()),
            ConnectionState::Connecting | ConnectionState::Open => {}
        }
        debug!(%code, "closing connection");
        self.set_state(ConnectionState::Closing);
        let result = self.transport.close(code).await;
        if let Err(e) = &result {
            warn!("transport close failed: {e}");
        }
        self.set_state(ConnectionState::Closed);
        result
    }
}

impl<T> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field(
                "state",
                &ConnectionState::from_u8(self.state.load(Ordering::Acquire)),
            )
            .finish_non_exhaustive()
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
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Records sends and closes; replays scripted frames.
    #[derive(Default)]
    struct ScriptedTransport {
        incoming: VecDeque<Option<std::result::Result<String, ClientError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closes: Arc<StdMutex<Vec<CloseCode>>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), ClientError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>> {
            self.incoming.pop_front().flatten()
        }

        async fn close(&mut self, code: CloseCode) -> std::result::Result<(), ClientError> {
            self.closes.lock().unwrap().push(code);
            Ok(())
        }
    }

    #[tokio::test]
    async fn starts_connecting_and_opens_once() {
        let mut conn = Connection::new(ScriptedTransport::default());
        assert_eq!(conn.state(), ConnectionState::Connecting);
        conn.mark_open();
        assert_eq!(conn.state(), ConnectionState::Open);
        conn.close(CloseCode::NORMAL).await.unwrap();
        conn.mark_open();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn send_before_open_is_refused() {
        let transport = ScriptedTransport::default();
        let sent = Arc::clone(&transport.sent);
        let mut conn = Connection::new(transport);

        let err = conn.send("x".into()).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let transport = ScriptedTransport::default();
        let closes = Arc::clone(&transport.closes);
        let mut conn = Connection::new(transport);
        conn.mark_open();

        conn.close(CloseCode::NORMAL).await.unwrap();
        conn.close(CloseCode::PROTOCOL_ERROR).await.unwrap();

        assert_eq!(*closes.lock().unwrap(), vec![CloseCode::NORMAL]);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(matches!(
            conn.send("late".into()).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn recv_end_of_stream_marks_closed() {
        let transport = ScriptedTransport {
            incoming: VecDeque::from(vec![Some(Ok("frame".to_string())), None]),
            ..Default::default()
        };
        let mut conn = Connection::new(transport);
        conn.mark_open();
        let observer = conn.observer();

        assert_eq!(conn.recv().await.unwrap().unwrap(), "frame");
        assert_eq!(observer.get(), ConnectionState::Open);
        assert!(conn.recv().await.is_none());
        assert_eq!(observer.get(), ConnectionState::Closed);
        assert!(conn.recv().await.is_none());
    }
}
