//! WebSocket transport built on `tokio-tungstenite`.
//!
//! The game server speaks JSON over WebSocket text frames. [`WebSocketTransport`]
//! maps one text frame to one message and turns [`CloseCode`]s into close
//! frames. `ws://` and `wss://` both work; TLS goes through
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! Only available with the `transport-websocket` feature (on by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), connect_four_client::ClientError> {
//! use connect_four_client::protocol::CloseCode;
//! use connect_four_client::{Transport, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:8001").await?;
//! transport.send(r#"{"type":"init"}"#.to_string()).await?;
//!
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("server: {frame}");
//! }
//!
//! transport.close(CloseCode::NORMAL).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};

use crate::error::ClientError;
use crate::protocol::CloseCode;
use crate::transport::Transport;

/// The underlying WebSocket stream, public for [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] over one WebSocket connection.
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future never loses a
/// frame, so it can sit in a `tokio::select!`.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the URL is invalid or the server cannot
    /// be reached. An underlying I/O error keeps its
    /// [`ErrorKind`](std::io::ErrorKind); anything else becomes
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        tracing::debug!(url = %url, "connecting to game server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            ClientError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "connected to game server");
        Ok(Self::from_stream(stream))
    }

    /// Wrap a stream that was connected elsewhere (custom TLS, proxies, headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// [`connect`](Self::connect), giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Timeout`] when the deadline passes first, otherwise the
    /// errors of [`connect`](Self::connect).
    pub async fn connect_with_timeout(
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, ClientError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| ClientError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(ClientError::TransportReceive(e.to_string()))),
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(Some(frame)) => {
                    let code = u16::from(frame.code);
                    let reason = frame.reason.as_str();
                    if code == CloseCode::NORMAL.as_u16() {
                        tracing::debug!(code, reason, "server closed the game");
                    } else {
                        tracing::warn!(code, reason, "server closed the game abnormally");
                    }
                    return None;
                }
                Message::Close(None) => {
                    tracing::debug!("server closed the game without a status");
                    return None;
                }
                // tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) => {
                    tracing::warn!("skipping unexpected binary frame");
                }
                // Never produced when reading.
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let frame = CloseFrame {
            code: WsCloseCode::from(code.as_u16()),
            reason: "".into(),
        };
        self.stream
            .close(Some(frame))
            .await
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
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
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    type ServerStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Accept one WebSocket connection on a local port, hand it to `handler`,
    /// and return the URL to dial.
    async fn start_game_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(ServerStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("localhost:8001").await.unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[tokio::test]
    async fn connect_fails_when_nobody_listens() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // TEST-NET-1 is not routable.
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:8001",
            std::time::Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
    }

    #[tokio::test]
    async fn receives_server_events_in_order() {
        let url = start_game_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"type":"init","join":"abc"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(
                r#"{"type":"play","player":"red","column":3,"row":0}"#.into(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"type":"init","join":"abc"}"#
        );
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"type":"play","player":"red","column":3,"row":0}"#
        );
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn binary_frames_are_skipped() {
        let url = start_game_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0x00, 0x07].into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"type":"win","player":"red"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"type":"win","player":"red"}"#
        );
    }

    #[tokio::test]
    async fn server_sees_sent_frames() {
        let (seen_tx, seen_rx) = oneshot::channel::<String>();
        let url = start_game_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport
            .send(r#"{"type":"init","watch":"xyz"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(seen_rx.await.unwrap(), r#"{"type":"init","watch":"xyz"}"#);
    }

    #[tokio::test]
    async fn close_sends_requested_code() {
        let (code_tx, code_rx) = oneshot::channel::<Option<u16>>();
        let url = start_game_server(|mut ws| async move {
            let mut code = None;
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Close(frame) = msg {
                    code = frame.map(|f| u16::from(f.code));
                    break;
                }
            }
            let _ = code_tx.send(code);
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close(CloseCode::NORMAL).await.unwrap();
        assert_eq!(code_rx.await.unwrap(), Some(1000));
    }

    #[tokio::test]
    async fn send_after_close_is_refused_and_close_is_idempotent() {
        let url =
            start_game_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close(CloseCode::NORMAL).await.unwrap();
        transport.close(CloseCode::PROTOCOL_ERROR).await.unwrap();

        let err = transport
            .send(r#"{"type":"play","column":0}"#.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::TransportClosed));
    }
}
