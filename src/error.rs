//! Error types for the Connect Four client.

use thiserror::Error;

use crate::dispatcher::DispatcherState;

/// Reasons an inbound frame could not be turned into a
/// [`ServerMessage`](crate::protocol::ServerMessage).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON text.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The frame is JSON but carries no string `type` field.
    #[error("frame has no `type` tag")]
    MissingType,

    /// The `type` tag names an event this client does not understand.
    #[error("unsupported event type: {0}")]
    UnknownType(String),

    /// A client frame with a known tag whose payload does not fit the command.
    ///
    /// Only [`decode_command`](crate::protocol::decode_command) produces this;
    /// server events are never rejected for their payload.
    #[error("malformed `{kind}` event: {source}")]
    MalformedPayload {
        /// The event tag that failed to map.
        kind: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur when using the Connect Four client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was already closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize an outbound message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An inbound frame could not be decoded. Fatal to the session.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A frame or lifecycle event arrived in a state that forbids it. Fatal to the session.
    #[error("protocol violation while {state}: {detail}")]
    ProtocolViolation {
        /// Dispatcher state at the time of the violation.
        state: DispatcherState,
        /// What was received.
        detail: String,
    },

    /// Attempted to send while the connection is not open.
    #[error("not connected to server")]
    NotConnected,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Returns `true` for errors that abandon the session: undecodable frames
    /// and protocol violations.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::ProtocolViolation { .. })
    }
}

/// A specialized [`Result`] type for Connect Four client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
