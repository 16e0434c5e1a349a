#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol codec tests for the Connect Four client.
//!
//! Checks the exact JSON the client puts on the wire, decodes fixtures that
//! match real server output, and verifies that every client command survives
//! a trip through the server-side parser.

use connect_four_client::protocol::{
    decode, decode_command, encode, ClientMessage, Field, Player, ServerMessage,
};
use connect_four_client::role::{resolve_role, InvocationParams};
use connect_four_client::{ClientError, DecodeError};

// ════════════════════════════════════════════════════════════════════
// Outbound commands
// ════════════════════════════════════════════════════════════════════

#[test]
fn every_command_round_trips_through_the_server_parser() {
    let commands = [
        ClientMessage::Init {
            join: None,
            watch: None,
        },
        ClientMessage::Init {
            join: Some("abc".into()),
            watch: None,
        },
        ClientMessage::Init {
            join: None,
            watch: Some("xyz".into()),
        },
        ClientMessage::Play { column: 0 },
        ClientMessage::Play { column: 6 },
    ];
    for command in commands {
        let frame = encode(&command).unwrap();
        assert_eq!(decode_command(&frame).unwrap(), command, "frame: {frame}");
    }
}

#[test]
fn role_init_messages_match_wire_fixtures() {
    let cases = [
        ("", r#"{"type":"init"}"#),
        ("?join=abc", r#"{"type":"init","join":"abc"}"#),
        ("?watch=xyz", r#"{"type":"init","watch":"xyz"}"#),
        ("?join=", r#"{"type":"init","join":""}"#),
    ];
    for (query, expected) in cases {
        let role = resolve_role(&InvocationParams::from_query(query));
        assert_eq!(encode(&role.init_message()).unwrap(), expected, "query: {query:?}");
    }
}

#[test]
fn play_column_is_a_json_number() {
    let frame = encode(&ClientMessage::Play { column: 5 }).unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["column"], serde_json::json!(5));
    assert_eq!(value["type"], "play");
}

// ════════════════════════════════════════════════════════════════════
// Server fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_init_from_server() {
    let event = decode(r#"{"type": "init", "join": "8gKJ3x", "watch": "Qm2pLz"}"#).unwrap();
    assert_eq!(
        event,
        ServerMessage::Init {
            join: Some(Field::from("8gKJ3x")),
            watch: Some(Field::from("Qm2pLz")),
        }
    );
}

#[test]
fn fixture_play_from_server() {
    let event = decode(r#"{"type": "play", "player": "yellow", "column": 6, "row": 5}"#).unwrap();
    assert_eq!(
        event,
        ServerMessage::Play {
            player: Player::new("yellow"),
            column: Field::from(6),
            row: Field::from(5),
        }
    );
}

#[test]
fn fixture_win_from_server() {
    let event = decode(r#"{"type": "win", "player": "red"}"#).unwrap();
    assert_eq!(
        event,
        ServerMessage::Win {
            player: Player::new("red")
        }
    );
}

#[test]
fn fixture_error_from_server() {
    let event = decode(r#"{"type": "error", "message": "This slot is full."}"#).unwrap();
    assert_eq!(
        event,
        ServerMessage::Error {
            message: Field::from("This slot is full.")
        }
    );
}

#[test]
fn server_events_encode_back_to_the_same_event() {
    let events = [
        ServerMessage::Init {
            join: Some(Field::from("a")),
            watch: Some(Field::from("b")),
        },
        ServerMessage::Play {
            player: Player::new("red"),
            column: Field::from(2),
            row: Field::from(1),
        },
        ServerMessage::Win {
            player: Player::new("yellow"),
        },
        ServerMessage::Error {
            message: Field::from("Game not found."),
        },
    ];
    for event in events {
        let frame = serde_json::to_string(&event).unwrap();
        assert_eq!(decode(&frame).unwrap(), event);
    }
}

// ════════════════════════════════════════════════════════════════════
// Lenient payloads
// ════════════════════════════════════════════════════════════════════

#[test]
fn wrong_field_kind_passes_through() {
    let event = decode(r#"{"type":"play","player":"red","column":"3","row":0}"#).unwrap();
    let ServerMessage::Play { column, row, .. } = event else {
        panic!("expected play, got {event:?}");
    };
    assert_eq!(column, Field::from("3"));
    assert_eq!(column.as_index(), Some(3));
    assert_eq!(row.as_index(), Some(0));
}

#[test]
fn boolean_player_passes_through() {
    let event = decode(r#"{"type":"win","player":true}"#).unwrap();
    assert_eq!(
        event,
        ServerMessage::Win {
            player: Player::new(true)
        }
    );
}

#[test]
fn missing_payload_fields_decode_as_null() {
    assert_eq!(
        decode(r#"{"type":"error"}"#).unwrap(),
        ServerMessage::Error {
            message: Field::default()
        }
    );
    let ServerMessage::Win { player } = decode(r#"{"type":"win"}"#).unwrap() else {
        panic!("expected win");
    };
    assert_eq!(player.as_value(), &serde_json::Value::Null);
}

// ════════════════════════════════════════════════════════════════════
// Rejections
// ════════════════════════════════════════════════════════════════════

#[test]
fn decode_errors_become_fatal_client_errors() {
    for frame in ["", "null", "[]", r#"{"type":"draw"}"#, r#"{"type":7}"#] {
        let err: ClientError = decode(frame).unwrap_err().into();
        assert!(err.is_fatal(), "frame {frame:?} should be fatal");
    }
}

#[test]
fn decode_error_messages_name_the_problem() {
    let unknown = decode(r#"{"type":"draw"}"#).unwrap_err();
    assert!(unknown.to_string().contains("draw"));

    let missing = decode(r#"{"player":"red"}"#).unwrap_err();
    assert!(matches!(missing, DecodeError::MissingType));
    assert!(missing.to_string().contains("type"));
}

#[test]
fn client_payloads_stay_typed() {
    let err = decode_command(r#"{"type":"play","column":"3"}"#).unwrap_err();
    assert!(matches!(err, DecodeError::MalformedPayload { ref kind, .. } if kind == "play"));
}
