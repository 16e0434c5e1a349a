#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration-style session tests for the Connect Four client.
//!
//! Uses the channel-backed `MockTransport` from `tests/common` to play the
//! server side of a game and checks what `GameClient` sends, renders and
//! closes with.

mod common;

use connect_four_client::protocol::{self, ClientMessage, CloseCode, Field, Player};
use connect_four_client::{
    resolve_role, Activation, ClientConfig, ClientError, ConnectionState, DecodeError, GameClient,
    InvocationParams, Role, SessionEnd, Transport,
};

use tokio_test::{assert_err, assert_ok};

use common::{
    error_json, init_json, mock_pair, moved, play_json, recording_renderer, settle, win_json,
    MockServer, RenderCall, RenderLog,
};

// ════════════════════════════════════════════════════════════════════
// Helper: start a session against a mock server
// ════════════════════════════════════════════════════════════════════

fn start_session(role: Role) -> (GameClient, MockServer, RenderLog) {
    let (transport, server) = mock_pair();
    let (renderer, log) = recording_renderer();
    let client = GameClient::start(transport, role, renderer, ClientConfig::new());
    (client, server, log)
}

fn play(column: u32) -> String {
    protocol::encode(&ClientMessage::Play { column }).unwrap()
}

// ════════════════════════════════════════════════════════════════════
// Handshake
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn initiator_sends_bare_init_once() {
    let (mut client, server, _log) = start_session(Role::Initiator);
    settle().await;

    assert_eq!(server.sent(), vec![r#"{"type":"init"}"#.to_owned()]);
    assert_eq!(client.connection_state(), ConnectionState::Open);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn joiner_sends_join_key() {
    let role = resolve_role(&InvocationParams::from_query("?join=abc"));
    let (mut client, server, _log) = start_session(role);
    settle().await;

    assert_eq!(server.sent(), vec![r#"{"type":"init","join":"abc"}"#.to_owned()]);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn spectator_sends_watch_key() {
    let role = resolve_role(&InvocationParams::from_query("watch=xyz"));
    let (mut client, server, _log) = start_session(role);
    settle().await;

    let sent = server.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        protocol::decode_command(&sent[0]).unwrap(),
        ClientMessage::Init {
            join: None,
            watch: Some("xyz".into()),
        }
    );
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn join_key_takes_precedence_over_watch_key() {
    let role = resolve_role(&InvocationParams::from_query("?watch=xyz&join=abc"));
    let (mut client, server, _log) = start_session(role);
    settle().await;

    assert_eq!(server.sent(), vec![r#"{"type":"init","join":"abc"}"#.to_owned()]);
    client.shutdown().await.unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Server events
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn init_event_publishes_links() {
    let (mut client, server, log) = start_session(Role::Initiator);
    server.push(init_json("abc", "xyz"));
    settle().await;

    assert_eq!(
        log.calls(),
        vec![
            RenderCall::JoinLink("?join=abc".into()),
            RenderCall::WatchLink("?watch=xyz".into()),
        ]
    );
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn play_event_is_applied_exactly_once() {
    let (mut client, server, log) = start_session(Role::Joiner("abc".into()));
    server.push(play_json("p1", 3, 0));
    settle().await;

    assert_eq!(log.calls(), vec![moved("p1", 3, 0)]);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn events_are_rendered_in_arrival_order() {
    let (mut client, server, log) = start_session(Role::Spectator("xyz".into()));
    server.push(play_json("red", 0, 0));
    server.push(play_json("yellow", 0, 1));
    server.push(play_json("red", 1, 0));
    settle().await;

    assert_eq!(
        log.calls(),
        vec![
            moved("red", 0, 0),
            moved("yellow", 0, 1),
            moved("red", 1, 0),
        ]
    );
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn win_announces_and_closes_normally() {
    let (mut client, server, log) = start_session(Role::Initiator);
    server.push(play_json("red", 3, 0));
    server.push(win_json("red"));

    let end = client.wait().await.unwrap();
    assert_eq!(
        end,
        SessionEnd::Won {
            winner: Player::new("red")
        }
    );
    assert_eq!(log.announcements(), vec!["Player red wins!".to_owned()]);
    assert_eq!(server.closes(), vec![CloseCode::NORMAL]);
    assert_eq!(client.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn activations_after_win_are_not_sent() {
    let (mut client, server, _log) = start_session(Role::Initiator);
    server.push(win_json("yellow"));
    client.wait().await.unwrap();

    client.activate(Activation::on_column(2));
    settle().await;
    assert_eq!(server.sent(), vec![r#"{"type":"init"}"#.to_owned()]);
}

#[tokio::test]
async fn error_event_is_announced_and_session_continues() {
    let (mut client, server, log) = start_session(Role::Joiner("abc".into()));
    server.push(error_json("Not your turn."));
    settle().await;

    assert_eq!(log.announcements(), vec!["Not your turn.".to_owned()]);
    assert!(server.closes().is_empty());
    assert!(!client.is_finished());

    client.activate(Activation::on_column(4));
    settle().await;
    assert_eq!(server.sent().last().unwrap(), &play(4));

    assert_eq!(client.shutdown().await.unwrap(), SessionEnd::Shutdown);
    assert_eq!(server.closes(), vec![CloseCode::NORMAL]);
}

#[tokio::test]
async fn unexpected_payload_values_are_rendered_verbatim() {
    let (mut client, server, log) = start_session(Role::Spectator("xyz".into()));
    server.push(r#"{"type":"error","message":42}"#);
    server.push(r#"{"type":"play","player":"red","column":"3","row":0}"#);
    server.push(r#"{"type":"play","player":"red"}"#);
    settle().await;

    let calls = log.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], RenderCall::Announce("42".into()));
    assert_eq!(
        calls[1],
        RenderCall::Move("red".into(), Field::from("3"), Field::from(0))
    );
    assert_eq!(
        calls[2],
        RenderCall::Move("red".into(), Field::default(), Field::default())
    );
    assert!(server.closes().is_empty());
    assert_eq!(client.connection_state(), ConnectionState::Open);

    assert_eq!(client.shutdown().await.unwrap(), SessionEnd::Shutdown);
}

#[tokio::test]
async fn win_without_player_still_ends_the_game() {
    let (mut client, server, log) = start_session(Role::Initiator);
    server.push(r#"{"type":"win"}"#);

    assert_eq!(
        client.wait().await.unwrap(),
        SessionEnd::Won {
            winner: Player::default()
        }
    );
    assert_eq!(log.announcements(), vec!["Player null wins!".to_owned()]);
    assert_eq!(server.closes(), vec![CloseCode::NORMAL]);
}

// ════════════════════════════════════════════════════════════════════
// Fatal frames
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn invalid_json_is_fatal() {
    let (mut client, server, log) = start_session(Role::Initiator);
    server.push("{not json");

    let err = assert_err!(client.wait().await);
    assert!(err.is_fatal());
    assert!(matches!(err, ClientError::Decode(DecodeError::InvalidJson(_))));
    assert!(log.calls().is_empty());
    assert_eq!(server.closes(), vec![CloseCode::PROTOCOL_ERROR]);
}

#[tokio::test]
async fn unknown_event_type_is_fatal() {
    let (mut client, server, log) = start_session(Role::Initiator);
    server.push(r#"{"type":"resign","player":"red"}"#);

    let err = client.wait().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Decode(DecodeError::UnknownType(ref kind)) if kind == "resign"
    ));
    assert!(log.calls().is_empty());
    assert_eq!(server.closes(), vec![CloseCode::PROTOCOL_ERROR]);
}

#[tokio::test]
async fn frames_after_a_fatal_frame_are_not_rendered() {
    let (mut client, server, log) = start_session(Role::Initiator);
    server.push(r#"{"column":0,"row":0}"#);
    server.push(play_json("red", 0, 0));

    assert!(matches!(
        client.wait().await,
        Err(ClientError::Decode(DecodeError::MissingType))
    ));
    assert!(log.calls().is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Moves
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn player_activation_sends_play_after_init() {
    let (mut client, server, _log) = start_session(Role::Initiator);
    client.activate(Activation::on_column(3));
    settle().await;

    assert_eq!(server.sent(), vec![r#"{"type":"init"}"#.to_owned(), play(3)]);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn moves_are_sent_in_activation_order() {
    let (mut client, server, _log) = start_session(Role::Joiner("abc".into()));
    for column in [6, 0, 3] {
        client.activate(Activation::on_column(column));
    }
    settle().await;

    assert_eq!(&server.sent()[1..], &[play(6), play(0), play(3)]);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn spectator_never_sends_moves() {
    let (mut client, server, _log) = start_session(Role::Spectator("xyz".into()));
    client.activate(Activation::on_column(0));
    client.activate(Activation::on_column(5));
    settle().await;

    assert_eq!(server.sent().len(), 1);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn activation_outside_board_is_ignored() {
    let (mut client, server, _log) = start_session(Role::Initiator);
    client.activate(Activation::outside_board());
    client.activate(Activation::from_cell_attribute(Some("board")));
    client.activate(Activation::from_cell_attribute(Some("2")));
    settle().await;

    assert_eq!(server.sent(), vec![r#"{"type":"init"}"#.to_owned(), play(2)]);
    client.shutdown().await.unwrap();
}

// ════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn server_hang_up_ends_session() {
    let (mut client, server, _log) = start_session(Role::Initiator);
    server.hang_up();

    assert_eq!(client.wait().await.unwrap(), SessionEnd::ServerClosed);
    assert_eq!(client.connection_state(), ConnectionState::Closed);
    assert!(server.closes().is_empty());
}

#[tokio::test]
async fn transport_error_ends_session() {
    let (mut client, server, _log) = start_session(Role::Initiator);
    server.fail("connection reset");

    let err = assert_err!(client.wait().await);
    assert!(matches!(err, ClientError::TransportReceive(ref m) if m == "connection reset"));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn init_send_failure_ends_session() {
    let (transport, server) = mock_pair();
    server.fail_sends();
    let (renderer, log) = recording_renderer();
    let mut client = GameClient::start(transport, Role::Initiator, renderer, ClientConfig::new());

    let err = assert_err!(client.wait().await);
    assert!(matches!(err, ClientError::TransportSend(ref m) if m == "broken pipe"));
    assert_eq!(client.connection_state(), ConnectionState::Closed);
    assert!(server.sent().is_empty());
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn move_send_failure_ends_session() {
    let (mut client, server, _log) = start_session(Role::Initiator);
    settle().await;
    server.fail_sends();
    client.activate(Activation::on_column(1));

    let err = assert_err!(client.wait().await);
    assert!(matches!(err, ClientError::TransportSend(_)));
    assert!(!err.is_fatal());
    assert_eq!(client.connection_state(), ConnectionState::Closed);
    assert_eq!(server.sent(), vec![r#"{"type":"init"}"#.to_owned()]);
    assert!(server.closes().is_empty());
}

#[tokio::test]
async fn finished_resolves_when_the_game_ends() {
    let (client, server, _log) = start_session(Role::Initiator);
    server.push(win_json("red"));

    tokio::time::timeout(std::time::Duration::from_secs(1), client.finished())
        .await
        .unwrap();
    settle().await;
    assert!(client.is_finished());
}

#[tokio::test]
async fn dropping_the_client_closes_normally() {
    let (client, server, _log) = start_session(Role::Initiator);
    settle().await;

    drop(client);
    settle().await;
    assert_eq!(server.closes(), vec![CloseCode::NORMAL]);
}

#[tokio::test]
async fn shutdown_closes_normally() {
    let (mut client, server, _log) = start_session(Role::Initiator);
    settle().await;

    assert_eq!(assert_ok!(client.shutdown().await), SessionEnd::Shutdown);
    assert_eq!(server.closes(), vec![CloseCode::NORMAL]);
    assert!(client.is_finished());
    assert!(matches!(
        assert_err!(client.shutdown().await),
        ClientError::NotConnected
    ));
}

#[tokio::test]
async fn boxed_dyn_transport_works() {
    let (transport, server) = mock_pair();
    let boxed: Box<dyn Transport> = Box::new(transport);
    let (renderer, log) = recording_renderer();
    let mut client = GameClient::start(boxed, Role::Initiator, renderer, ClientConfig::new());

    server.push(init_json("k1", "k2"));
    server.push(win_json("red"));

    assert!(matches!(client.wait().await.unwrap(), SessionEnd::Won { .. }));
    assert_eq!(log.calls().len(), 3);
}

#[tokio::test]
async fn debug_output_names_role() {
    let (mut client, _server, _log) = start_session(Role::Joiner("abc".into()));
    let debug = format!("{client:?}");
    assert!(debug.contains("GameClient"));
    assert!(debug.contains("Joiner"));
    client.shutdown().await.unwrap();
}
