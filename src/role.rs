//! Role resolution from invocation parameters.
//!
//! A client either starts a new game, joins one with a join key, or watches
//! one with a watch key. The decision is made once, before connecting, from
//! the `join` / `watch` parameters the client was invoked with (a page query
//! string such as `?join=abc`). Keys are opaque; the server validates them.
//!
//! ```
//! use connect_four_client::role::{resolve_role, InvocationParams, Role};
//!
//! let params = InvocationParams::from_query("?watch=xyz");
//! assert_eq!(resolve_role(&params), Role::Spectator("xyz".into()));
//! ```

use url::form_urlencoded;

use crate::protocol::ClientMessage;

/// Query parameter carrying a join key.
pub const JOIN_PARAM: &str = "join";
/// Query parameter carrying a watch key.
pub const WATCH_PARAM: &str = "watch";

/// The optional parameters a client was invoked with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationParams {
    /// Key of an existing game to play in.
    pub join: Option<String>,
    /// Key of an existing game to spectate.
    pub watch: Option<String>,
}

impl InvocationParams {
    /// Parameters for starting a new game.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the join key.
    #[must_use]
    pub fn with_join(mut self, key: impl Into<String>) -> Self {
        self.join = Some(key.into());
        self
    }

    /// Set the watch key.
    #[must_use]
    pub fn with_watch(mut self, key: impl Into<String>) -> Self {
        self.watch = Some(key.into());
        self
    }

    /// Parse a URL query string. The leading `?` is optional, values are
    /// percent-decoded, and a parameter present with an empty value still
    /// counts as present. When a parameter repeats, the first occurrence wins.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                JOIN_PARAM if params.join.is_none() => params.join = Some(value.into_owned()),
                WATCH_PARAM if params.watch.is_none() => params.watch = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// How this client participates in a game. Fixed for the life of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// Starts a new game and waits for an opponent.
    Initiator,
    /// Joins the game identified by the join key.
    Joiner(String),
    /// Watches the game identified by the watch key. Never plays.
    Spectator(String),
}

impl Role {
    /// Whether this role may send moves.
    pub fn can_play(&self) -> bool {
        !matches!(self, Self::Spectator(_))
    }

    /// The handshake message this role opens a connection with.
    pub fn init_message(&self) -> ClientMessage {
        match self {
            Self::Initiator => ClientMessage::Init {
                join: None,
                watch: None,
            },
            Self::Joiner(key) => ClientMessage::Init {
                join: Some(key.clone()),
                watch: None,
            },
            Self::Spectator(key) => ClientMessage::Init {
                join: None,
                watch: Some(key.clone()),
            },
        }
    }
}

/// Pick a role: a join key wins over a watch key; neither means a new game.
pub fn resolve_role(params: &InvocationParams) -> Role {
    if let Some(key) = &params.join {
        Role::Joiner(key.clone())
    } else if let Some(key) = &params.watch {
        Role::Spectator(key.clone())
    } else {
        Role::Initiator
    }
}

/// Query-relative link another player follows to join with `key`.
pub fn join_link(key: &str) -> String {
    format!("?{JOIN_PARAM}={key}")
}

/// Query-relative link a spectator follows to watch with `key`.
pub fn watch_link(key: &str) -> String {
    format!("?{WATCH_PARAM}={key}")
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
    fn no_params_is_initiator() {
        assert_eq!(resolve_role(&InvocationParams::new()), Role::Initiator);
        assert_eq!(
            resolve_role(&InvocationParams::from_query("")),
            Role::Initiator
        );
    }

    #[test]
    fn join_param_is_joiner() {
        let params = InvocationParams::from_query("?join=abc");
        assert_eq!(resolve_role(&params), Role::Joiner("abc".into()));
    }

    #[test]
    fn watch_param_is_spectator() {
        let params = InvocationParams::from_query("watch=xyz");
        assert_eq!(resolve_role(&params), Role::Spectator("xyz".into()));
    }

    #[test]
    fn join_takes_precedence_over_watch() {
        let params = InvocationParams::new().with_watch("xyz").with_join("abc");
        assert_eq!(resolve_role(&params), Role::Joiner("abc".into()));
    }

    #[test]
    fn empty_value_counts_as_present() {
        let params = InvocationParams::from_query("?join=");
        assert_eq!(resolve_role(&params), Role::Joiner(String::new()));
    }

    #[test]
    fn query_values_are_percent_decoded() {
        let params = InvocationParams::from_query("?foo=1&join=a%2Bb&join=second");
        assert_eq!(params.join.as_deref(), Some("a+b"));
        assert!(params.watch.is_none());
    }

    #[test]
    fn spectator_cannot_play() {
        assert!(Role::Initiator.can_play());
        assert!(Role::Joiner("k".into()).can_play());
        assert!(!Role::Spectator("k".into()).can_play());
    }

    #[test]
    fn init_message_carries_only_own_key() {
        assert_eq!(
            Role::Spectator("xyz".into()).init_message(),
            ClientMessage::Init {
                join: None,
                watch: Some("xyz".into()),
            }
        );
    }

    #[test]
    fn links_are_query_relative() {
        assert_eq!(join_link("abc"), "?join=abc");
        assert_eq!(watch_link("xyz"), "?watch=xyz");
    }
}
