//! Wire protocol for the Connect Four game server.
//!
//! Every frame is a JSON object whose `type` field names the message. The
//! client sends [`ClientMessage`]s and receives [`ServerMessage`]s:
//!
//! | direction | type    | fields                             |
//! |-----------|---------|------------------------------------|
//! | out       | `init`  | `join?`, `watch?` (at most one)    |
//! | out       | `play`  | `column`                           |
//! | in        | `init`  | `join`, `watch`                    |
//! | in        | `play`  | `player`, `column`, `row`          |
//! | in        | `win`   | `player`                           |
//! | in        | `error` | `message`                          |
//!
//! [`encode`] and [`decode`] are the only entry points the rest of the crate
//! uses; they keep serde details out of the dispatcher.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, Result};

// ── Payload values ──────────────────────────────────────────────────

/// A server payload value, kept exactly as it arrived.
///
/// Values are not interpreted: a `column` of `"3"` or `3.0` reaches the
/// renderer as-is. A field missing from the frame is [`Value::Null`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Field(Value);

impl Field {
    /// Wrap a JSON value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// The raw JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Read the value as a board index.
    ///
    /// Accepts non-negative integers, integral floats (`3.0`) and canonical
    /// decimal strings (`"3"`, not `"03"` or `" 3"`). Everything else is
    /// `None`.
    pub fn as_index(&self) -> Option<usize> {
        match &self.0 {
            Value::Number(n) => n.as_u64().map_or_else(
                || {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                        .map(|f| f as usize)
                },
                |u| usize::try_from(u).ok(),
            ),
            Value::String(s) => s.parse::<usize>().ok().filter(|n| n.to_string() == *s),
            _ => None,
        }
    }
}

/// Strings print bare; any other value prints as JSON text.
impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Self(Value::from(value))
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Self(Value::from(value))
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

/// Opaque player identifier assigned by the server.
///
/// The server names players by colour (`"red"`, `"yellow"`). Whatever JSON
/// value it sends is kept verbatim and only turned into text for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Player(Field);

impl Player {
    /// Create a player identifier.
    pub fn new(id: impl Into<Value>) -> Self {
        Self(Field::new(id))
    }

    /// The identifier as sent by the server.
    pub fn as_value(&self) -> &Value {
        self.0.as_value()
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Player {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// WebSocket close status code sent when the client ends a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Normal closure, used once a game has been won.
    pub const NORMAL: Self = Self(1000);
    /// The peer violated the protocol.
    pub const PROTOCOL_ERROR: Self = Self(1002);

    /// The numeric status code.
    pub fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Client → Server ─────────────────────────────────────────────────

/// Messages sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Handshake. Always the first message on a connection.
    ///
    /// An initiator sends neither key; a joiner sends `join`; a spectator
    /// sends `watch`.
    Init {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        join: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        watch: Option<String>,
    },
    /// Drop a disc into `column`.
    Play { column: u32 },
}

impl ClientMessage {
    /// Every `type` tag a client sends.
    pub const TAGS: [&'static str; 2] = ["init", "play"];
}

// ── Server → Client ─────────────────────────────────────────────────

/// Events sent from the server to the client.
///
/// Only the `type` tag is validated. Payload fields are carried through
/// verbatim and default to `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Announces the keys other participants use to join or watch this game.
    ///
    /// The server only includes the keys it wants to share with this client,
    /// so both are optional here. A `null` key counts as absent.
    Init {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        join: Option<Field>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        watch: Option<Field>,
    },
    /// A disc landed at (`column`, `row`).
    Play {
        #[serde(default)]
        player: Player,
        #[serde(default)]
        column: Field,
        #[serde(default)]
        row: Field,
    },
    /// `player` connected four.
    Win {
        #[serde(default)]
        player: Player,
    },
    /// The server rejected an action. Informational; the session continues.
    Error {
        #[serde(default)]
        message: Field,
    },
}

impl ServerMessage {
    /// Every `type` tag the client understands.
    pub const TAGS: [&'static str; 4] = ["init", "play", "win", "error"];

    /// The wire tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Play { .. } => "play",
            Self::Win { .. } => "win",
            Self::Error { .. } => "error",
        }
    }
}

// ── Codec ───────────────────────────────────────────────────────────

/// Serialize an outbound message to a JSON text frame.
///
/// Output is deterministic: the `type` tag comes first and absent keys are
/// omitted.
///
/// # Errors
///
/// Returns [`ClientError::Serialization`](crate::ClientError::Serialization)
/// if serde fails, which does not happen for the message shapes defined here.
pub fn encode(message: &ClientMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Parse an inbound JSON text frame.
///
/// Only the envelope is validated: the frame must be a JSON object with a
/// known `type` tag. Payload fields pass through untouched, whatever their
/// JSON kind, and missing ones become `null`.
///
/// # Errors
///
/// See [`DecodeError`] for the individual failure modes.
pub fn decode(frame: &str) -> std::result::Result<ServerMessage, DecodeError> {
    decode_tagged(frame, &ServerMessage::TAGS)
}

/// Parse a client frame back into a [`ClientMessage`], as a server would.
///
/// Unlike [`decode`], client payloads are typed: a `play` without a
/// numeric `column` is rejected.
///
/// # Errors
///
/// The failure modes of [`decode`], plus [`DecodeError::MalformedPayload`].
pub fn decode_command(frame: &str) -> std::result::Result<ClientMessage, DecodeError> {
    decode_tagged(frame, &ClientMessage::TAGS)
}

fn decode_tagged<T: DeserializeOwned>(
    frame: &str,
    tags: &[&str],
) -> std::result::Result<T, DecodeError> {
    let value: Value = serde_json::from_str(frame).map_err(DecodeError::InvalidJson)?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();

    if !tags.contains(&kind.as_str()) {
        return Err(DecodeError::UnknownType(kind));
    }

    serde_json::from_value(value).map_err(|source| DecodeError::MalformedPayload { kind, source })
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

    #[test]
    fn initiator_init_carries_no_keys() {
        let msg = ClientMessage::Init {
            join: None,
            watch: None,
        };
        assert_eq!(encode(&msg).unwrap(), r#"{"type":"init"}"#);
    }

    #[test]
    fn joiner_init_has_only_join() {
        let msg = ClientMessage::Init {
            join: Some("abc".into()),
            watch: None,
        };
        assert_eq!(encode(&msg).unwrap(), r#"{"type":"init","join":"abc"}"#);
    }

    #[test]
    fn play_encodes_column() {
        let msg = ClientMessage::Play { column: 3 };
        assert_eq!(encode(&msg).unwrap(), r#"{"type":"play","column":3}"#);
    }

    #[test]
    fn decode_play_event() {
        let event = decode(r#"{"type":"play","player":"p1","column":3,"row":0}"#).unwrap();
        assert_eq!(
            event,
            ServerMessage::Play {
                player: Player::new("p1"),
                column: Field::from(3),
                row: Field::from(0),
            }
        );
        assert_eq!(event.kind(), "play");
    }

    #[test]
    fn decode_keeps_numeric_player() {
        let event = decode(r#"{"type":"win","player":2}"#).unwrap();
        let ServerMessage::Win { player } = event else {
            panic!("expected win, got {event:?}");
        };
        assert_eq!(player.as_value(), &Value::from(2));
        assert_eq!(player.to_string(), "2");
    }

    #[test]
    fn decode_passes_out_of_range_values_through() {
        let event = decode(r#"{"type":"play","player":"red","column":-4,"row":99}"#).unwrap();
        let ServerMessage::Play { column, row, .. } = event else {
            panic!("expected play, got {event:?}");
        };
        assert_eq!(column, Field::from(-4));
        assert_eq!(row.as_index(), Some(99));
    }

    #[test]
    fn decode_passes_unexpected_value_kinds_through() {
        let event = decode(r#"{"type":"play","player":true,"column":"3","row":0.0}"#).unwrap();
        let ServerMessage::Play {
            player,
            column,
            row,
        } = event
        else {
            panic!("expected play, got {event:?}");
        };
        assert_eq!(player.to_string(), "true");
        assert_eq!(column.as_value(), &Value::from("3"));
        assert_eq!(row.as_value(), &serde_json::json!(0.0));
    }

    #[test]
    fn decode_fills_missing_fields_with_null() {
        let event = decode(r#"{"type":"play","player":"p1","column":3}"#).unwrap();
        let ServerMessage::Play { row, .. } = event else {
            panic!("expected play, got {event:?}");
        };
        assert_eq!(row.as_value(), &Value::Null);

        let event = decode(r#"{"type":"error"}"#).unwrap();
        assert_eq!(
            event,
            ServerMessage::Error {
                message: Field::default()
            }
        );
    }

    #[test]
    fn decode_init_with_only_join() {
        let event = decode(r#"{"type":"init","join":"k"}"#).unwrap();
        assert_eq!(
            event,
            ServerMessage::Init {
                join: Some(Field::from("k")),
                watch: None,
            }
        );
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let event = decode(r#"{"type":"error","message":"Game not found","extra":true}"#).unwrap();
        assert_eq!(
            event,
            ServerMessage::Error {
                message: Field::from("Game not found")
            }
        );
    }

    #[test]
    fn decode_rejects_invalid_json() {
        assert!(matches!(decode("{not json"), Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn decode_rejects_missing_or_non_string_tag() {
        assert!(matches!(decode(r#"{"player":"p1"}"#), Err(DecodeError::MissingType)));
        assert!(matches!(decode(r#"{"type":7}"#), Err(DecodeError::MissingType)));
        assert!(matches!(decode("[1,2,3]"), Err(DecodeError::MissingType)));
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let err = decode(r#"{"type":"resign","player":"p1"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(ref t) if t == "resign"));
    }

    #[test]
    fn field_index_follows_property_key_rules() {
        assert_eq!(Field::from(6).as_index(), Some(6));
        assert_eq!(Field::new(3.0).as_index(), Some(3));
        assert_eq!(Field::from("3").as_index(), Some(3));
        assert_eq!(Field::from("03").as_index(), None);
        assert_eq!(Field::new(2.5).as_index(), None);
        assert_eq!(Field::from(-1).as_index(), None);
        assert_eq!(Field::default().as_index(), None);
    }

    #[test]
    fn field_display_leaves_strings_bare() {
        assert_eq!(Field::from("Not your turn.").to_string(), "Not your turn.");
        assert_eq!(Field::from(42).to_string(), "42");
        assert_eq!(Field::default().to_string(), "null");
    }

    #[test]
    fn decode_command_reads_client_frames() {
        assert_eq!(
            decode_command(r#"{"type":"play","column":5}"#).unwrap(),
            ClientMessage::Play { column: 5 }
        );
        assert!(matches!(
            decode_command(r#"{"type":"win","player":"red"}"#),
            Err(DecodeError::UnknownType(_))
        ));
        assert!(matches!(
            decode_command(r#"{"type":"play","column":"3"}"#),
            Err(DecodeError::MalformedPayload { ref kind, .. }) if kind == "play"
        ));
    }

    #[test]
    fn close_code_constants() {
        assert_eq!(CloseCode::NORMAL.as_u16(), 1000);
        assert_eq!(CloseCode::PROTOCOL_ERROR.to_string(), "1002");
    }
}
