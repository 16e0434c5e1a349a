//! Input capture: turns board activations into moves.

use tracing::debug;

use crate::protocol::ClientMessage;
use crate::renderer::Activation;
use crate::role::Role;
use crate::transport::ConnectionState;

/// Decides which user activations become [`ClientMessage::Play`] commands.
///
/// Spectators never produce moves. Activations that hit no column, or that
/// happen while the connection is not open, are dropped: nothing is queued
/// and no error is raised.
#[derive(Debug, Clone, Copy)]
pub struct InputCapture {
    enabled: bool,
}

impl InputCapture {
    /// Input capture for `role`.
    pub fn new(role: &Role) -> Self {
        Self {
            enabled: role.can_play(),
        }
    }

    /// Whether this capture can ever produce a move.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The move to send for `activation`, if any.
    pub fn capture(
        &self,
        activation: Activation,
        connection: ConnectionState,
    ) -> Option<ClientMessage> {
        if !self.enabled {
            return None;
        }
        let column = activation.column()?;
        if connection != ConnectionState::Open {
            debug!(column, state = %connection, "dropping move, connection not open");
            return None;
        }
        Some(ClientMessage::Play { column })
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

    #[test]
    fn player_activation_becomes_play() {
        let capture = InputCapture::new(&Role::Initiator);
        assert_eq!(
            capture.capture(Activation::on_column(4), ConnectionState::Open),
            Some(ClientMessage::Play { column: 4 })
        );
    }

    #[test]
    fn spectator_never_plays() {
        let capture = InputCapture::new(&Role::Spectator("xyz".into()));
        assert!(!capture.is_enabled());
        for column in 0..7 {
            assert_eq!(
                capture.capture(Activation::on_column(column), ConnectionState::Open),
                None
            );
        }
    }

    #[test]
    fn activation_without_column_is_ignored() {
        let capture = InputCapture::new(&Role::Joiner("abc".into()));
        assert_eq!(
            capture.capture(Activation::outside_board(), ConnectionState::Open),
            None
        );
    }

    #[test]
    fn moves_are_dropped_unless_open() {
        let capture = InputCapture::new(&Role::Initiator);
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            assert_eq!(capture.capture(Activation::on_column(1), state), None);
        }
    }
}
