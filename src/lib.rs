//! # Connect Four Client
//!
//! Client half of a two-player networked Connect Four game.
//!
//! The client opens one connection to the game server, introduces itself
//! with an `init` message that depends on its [`Role`] (new game, join a game,
//! watch a game), forwards the user's moves, and applies the server's events
//! to a [`Renderer`]. The server owns the rules; the client is only a view.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] for any text message channel
//! - **WebSocket built-in**: default `transport-websocket` feature provides `WebSocketTransport`
//! - **Testable core**: [`Dispatcher`] is a plain state machine fed with frames
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), connect_four_client::ClientError> {
//! use connect_four_client::{
//!     resolve_role, Activation, ClientConfig, GameClient, InvocationParams, TextBoard,
//! };
//!
//! let role = resolve_role(&InvocationParams::from_query("?join=abc"));
//! let board = TextBoard::new(std::io::stdout());
//! let mut client = GameClient::connect(role, board, ClientConfig::new()).await?;
//!
//! client.activate(Activation::on_column(3));
//! let end = client.wait().await?;
//! # let _ = end;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "tokio-runtime")]
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod input;
pub mod protocol;
pub mod renderer;
pub mod role;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
#[cfg(feature = "tokio-runtime")]
pub use client::{ClientConfig, GameClient, SessionEnd};
pub use dispatcher::{Dispatcher, DispatcherState, Flow};
pub use error::{ClientError, DecodeError};
pub use input::InputCapture;
pub use protocol::{ClientMessage, CloseCode, Field, Player, ServerMessage};
pub use renderer::{Activation, Renderer, TextBoard};
pub use role::{resolve_role, InvocationParams, Role};
pub use transport::{Connection, ConnectionState, Transport};
#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
