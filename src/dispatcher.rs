//! Event dispatcher: the client's protocol state machine.
//!
//! ```text
//!   AwaitingOpen ──on_open──▶ Active ──win / on_close / fatal──▶ Terminated
//! ```
//!
//! The dispatcher is synchronous and owns no I/O. It hands back the
//! handshake to send on open and a [`Flow`] for every inbound frame; the
//! session loop in [`client`](crate::client) performs the actual sends and
//! closes. This keeps it testable by feeding frames directly.

use std::fmt;

use tracing::{debug, error, info};

use crate::error::{ClientError, Result};
use crate::protocol::{self, ClientMessage, CloseCode, Player, ServerMessage};
use crate::renderer::Renderer;
use crate::role::{self, Role};

/// Where the dispatcher is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherState {
    /// Waiting for the connection to open; nothing sent yet.
    AwaitingOpen,
    /// Handshake sent; inbound events are applied.
    Active,
    /// The session is over; nothing more is sent or applied.
    Terminated,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingOpen => "awaiting open",
            Self::Active => "active",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// What the session loop should do after a frame was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// `winner` won. Close the connection with `close`; the session is over.
    GameOver { winner: Player, close: CloseCode },
}

/// Text announced when `player` wins.
pub fn win_message(player: &Player) -> String {
    format!("Player {player} wins!")
}

/// Routes inbound events to a [`Renderer`] and enforces the protocol order.
#[derive(Debug)]
pub struct Dispatcher<R> {
    role: Role,
    state: DispatcherState,
    renderer: R,
}

impl<R: Renderer> Dispatcher<R> {
    /// A dispatcher for `role`, writing into `renderer`.
    pub fn new(role: Role, renderer: R) -> Self {
        Self {
            role,
            state: DispatcherState::AwaitingOpen,
            renderer,
        }
    }

    /// The role this session runs as.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Current state.
    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Whether the session is over.
    pub fn is_terminated(&self) -> bool {
        self.state == DispatcherState::Terminated
    }

    /// The renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The connection opened. Returns the one handshake message to send.
    ///
    /// # Errors
    ///
    /// [`ClientError::ProtocolViolation`] if called more than once or after
    /// the session ended; the handshake is never produced twice.
    pub fn on_open(&mut self) -> Result<ClientMessage> {
        if self.state != DispatcherState::AwaitingOpen {
            return Err(self.violation("connection opened twice".to_owned()));
        }
        self.state = DispatcherState::Active;
        debug!(role = ?self.role, "connection open, sending init");
        Ok(self.role.init_message())
    }

    /// Apply one inbound frame.
    ///
    /// # Errors
    ///
    /// [`ClientError::Decode`] for an undecodable frame and
    /// [`ClientError::ProtocolViolation`] for a frame outside the active
    /// state. Both terminate the dispatcher and leave the renderer untouched.
    pub fn on_message(&mut self, frame: &str) -> Result<Flow> {
        if self.state != DispatcherState::Active {
            let detail = format!("unexpected frame: {frame}");
            let err = self.violation(detail);
            error!("{err}");
            self.state = DispatcherState::Terminated;
            return Err(err);
        }

        let event = match protocol::decode(frame) {
            Ok(event) => event,
            Err(e) => {
                error!("failed to decode server frame: {e} (raw: {frame})");
                self.state = DispatcherState::Terminated;
                return Err(e.into());
            }
        };
        debug!(kind = event.kind(), "dispatching server event");

        match event {
            ServerMessage::Init { join, watch } => {
                if let Some(key) = join {
                    self.renderer.set_join_link(&role::join_link(&key.to_string()));
                }
                if let Some(key) = watch {
                    self.renderer.set_watch_link(&role::watch_link(&key.to_string()));
                }
                Ok(Flow::Continue)
            }
            ServerMessage::Play {
                player,
                column,
                row,
            } => {
                self.renderer.apply_move(&player, &column, &row);
                Ok(Flow::Continue)
            }
            ServerMessage::Win { player } => {
                info!(%player, "game won");
                self.renderer.announce(&win_message(&player));
                self.state = DispatcherState::Terminated;
                Ok(Flow::GameOver {
                    winner: player,
                    close: CloseCode::NORMAL,
                })
            }
            ServerMessage::Error { message } => {
                debug!(%message, "server reported an error");
                self.renderer.announce(&message.to_string());
                Ok(Flow::Continue)
            }
        }
    }

    /// The connection closed, cleanly or not.
    pub fn on_close(&mut self) {
        if self.state != DispatcherState::Terminated {
            debug!(state = %self.state, "connection closed, terminating");
        }
        self.state = DispatcherState::Terminated;
    }

    fn violation(&self, detail: String) -> ClientError {
        ClientError::ProtocolViolation {
            state: self.state,
            detail,
        }
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
    use crate::protocol::Field;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        JoinLink(String),
        WatchLink(String),
        Move(String, String, String),
        Announce(String),
    }

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl Renderer for Recorder {
        fn set_join_link(&mut self, href: &str) {
            self.calls.push(Call::JoinLink(href.to_owned()));
        }

        fn set_watch_link(&mut self, href: &str) {
            self.calls.push(Call::WatchLink(href.to_owned()));
        }

        fn apply_move(&mut self, player: &Player, column: &Field, row: &Field) {
            let call = Call::Move(player.to_string(), column.to_string(), row.to_string());
            self.calls.push(call);
        }

        fn announce(&mut self, message: &str) {
            self.calls.push(Call::Announce(message.to_owned()));
        }
    }

    fn active(role: Role) -> Dispatcher<Recorder> {
        let mut dispatcher = Dispatcher::new(role, Recorder::default());
        dispatcher.on_open().unwrap();
        dispatcher
    }

    #[test]
    fn open_yields_init_once() {
        let mut dispatcher = Dispatcher::new(Role::Joiner("abc".into()), Recorder::default());
        assert_eq!(dispatcher.state(), DispatcherState::AwaitingOpen);

        let init = dispatcher.on_open().unwrap();
        assert_eq!(
            init,
            ClientMessage::Init {
                join: Some("abc".into()),
                watch: None,
            }
        );
        assert_eq!(dispatcher.state(), DispatcherState::Active);

        let err = dispatcher.on_open().unwrap_err();
        assert!(matches!(err, ClientError::ProtocolViolation { .. }));
    }

    #[test]
    fn init_event_sets_links() {
        let mut dispatcher = active(Role::Initiator);
        let flow = dispatcher
            .on_message(r#"{"type":"init","join":"abc","watch":"xyz"}"#)
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            dispatcher.renderer().calls,
            vec![
                Call::JoinLink("?join=abc".into()),
                Call::WatchLink("?watch=xyz".into()),
            ]
        );
    }

    #[test]
    fn repeated_init_is_applied_again() {
        let mut dispatcher = active(Role::Initiator);
        dispatcher
            .on_message(r#"{"type":"init","join":"a"}"#)
            .unwrap();
        dispatcher
            .on_message(r#"{"type":"init","join":"a"}"#)
            .unwrap();
        assert_eq!(dispatcher.renderer().calls.len(), 2);
        assert_eq!(dispatcher.state(), DispatcherState::Active);
    }

    #[test]
    fn play_event_applies_move() {
        let mut dispatcher = active(Role::Spectator("xyz".into()));
        dispatcher
            .on_message(r#"{"type":"play","player":"p1","column":3,"row":0}"#)
            .unwrap();
        assert_eq!(
            dispatcher.renderer().calls,
            vec![Call::Move("p1".into(), "3".into(), "0".into())]
        );
        assert_eq!(dispatcher.state(), DispatcherState::Active);
    }

    #[test]
    fn unexpected_payload_values_reach_the_renderer() {
        let mut dispatcher = active(Role::Spectator("xyz".into()));
        dispatcher
            .on_message(r#"{"type":"play","player":true,"column":"3","row":0.0}"#)
            .unwrap();
        dispatcher
            .on_message(r#"{"type":"error","message":42}"#)
            .unwrap();
        dispatcher
            .on_message(r#"{"type":"play","player":"red"}"#)
            .unwrap();

        assert_eq!(
            dispatcher.renderer().calls,
            vec![
                Call::Move("true".into(), "3".into(), "0.0".into()),
                Call::Announce("42".into()),
                Call::Move("red".into(), "null".into(), "null".into()),
            ]
        );
        assert_eq!(dispatcher.state(), DispatcherState::Active);
    }

    #[test]
    fn win_announces_and_requests_normal_close() {
        let mut dispatcher = active(Role::Initiator);
        let flow = dispatcher
            .on_message(r#"{"type":"win","player":"red"}"#)
            .unwrap();
        assert_eq!(
            flow,
            Flow::GameOver {
                winner: Player::new("red"),
                close: CloseCode::NORMAL,
            }
        );
        assert!(dispatcher.is_terminated());
        assert_eq!(
            dispatcher.renderer().calls,
            vec![Call::Announce("Player red wins!".into())]
        );

        let err = dispatcher
            .on_message(r#"{"type":"play","player":"p1","column":3,"row":0}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ProtocolViolation {
                state: DispatcherState::Terminated,
                ..
            }
        ));
        assert_eq!(dispatcher.renderer().calls.len(), 1);
    }

    #[test]
    fn error_event_announces_and_continues() {
        let mut dispatcher = active(Role::Joiner("abc".into()));
        let flow = dispatcher
            .on_message(r#"{"type":"error","message":"Not your turn."}"#)
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(dispatcher.state(), DispatcherState::Active);
        assert_eq!(
            dispatcher.renderer().calls,
            vec![Call::Announce("Not your turn.".into())]
        );
    }

    #[test]
    fn unknown_tag_is_fatal_without_render() {
        let mut dispatcher = active(Role::Initiator);
        let err = dispatcher.on_message(r#"{"type":"draw"}"#).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ClientError::Decode(_)));
        assert!(dispatcher.is_terminated());
        assert!(dispatcher.renderer().calls.is_empty());
    }

    #[test]
    fn invalid_json_is_fatal_without_render() {
        let mut dispatcher = active(Role::Initiator);
        assert!(dispatcher.on_message("not json").unwrap_err().is_fatal());
        assert!(dispatcher.is_terminated());
        assert!(dispatcher.renderer().calls.is_empty());
    }

    #[test]
    fn frame_before_open_is_a_violation() {
        let mut dispatcher = Dispatcher::new(Role::Initiator, Recorder::default());
        let err = dispatcher
            .on_message(r#"{"type":"play","player":"p1","column":3,"row":0}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ProtocolViolation {
                state: DispatcherState::AwaitingOpen,
                ..
            }
        ));
        assert!(dispatcher.is_terminated());
        assert!(dispatcher.renderer().calls.is_empty());
    }

    #[test]
    fn close_terminates_from_any_state() {
        let mut dispatcher = active(Role::Initiator);
        dispatcher.on_close();
        assert!(dispatcher.is_terminated());
        assert!(dispatcher.on_open().is_err());
    }
}
