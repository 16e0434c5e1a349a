//! # Terminal Client
//!
//! Plays Connect Four against the game server from a terminal:
//!
//! 1. Pick a role from the query string given as the first argument
//! 2. Connect to the game server via WebSocket and send the handshake
//! 3. Print the board and announcements to stdout
//! 4. Read one column number per line from stdin and send it as a move
//! 5. Shut down on a win, a server hang-up, end of input or Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start the game server on localhost:8001, then start a new game:
//! cargo run --example terminal_client
//!
//! # Join or watch with the key printed by the first client:
//! cargo run --example terminal_client -- '?join=8gKJ3x'
//! cargo run --example terminal_client -- '?watch=Qm2pLz'
//!
//! # Override the server URL:
//! CONNECT_FOUR_URL=ws://my-server:8001 cargo run --example terminal_client
//! ```

use connect_four_client::client::DEFAULT_SERVER_URL;
use connect_four_client::{
    resolve_role, Activation, ClientConfig, GameClient, InvocationParams, SessionEnd, TextBoard,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output. Logs go to stderr so they
    // do not interleave with the board.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("CONNECT_FOUR_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let query = std::env::args().nth(1).unwrap_or_default();
    let role = resolve_role(&InvocationParams::from_query(&query));
    tracing::info!(?role, "connecting to {url}");

    // ── Connect ─────────────────────────────────────────────────────
    let config = ClientConfig::new().with_server_url(url);
    let mut client = GameClient::connect(role, TextBoard::new(std::io::stdout()), config).await?;

    if client.role().can_play() {
        println!("enter a column (0-6) to drop a disc");
    }

    // ── Input loop ──────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ended = false;
    loop {
        tokio::select! {
            // Branch 1: one line of user input.
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("end of input");
                    break;
                };
                client.activate(Activation::from_cell_attribute(Some(line.trim())));
            }

            // Branch 2: Ctrl+C.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }

            // Branch 3: the session ended on its own.
            () = client.finished() => {
                ended = true;
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    let end = if ended {
        client.wait().await
    } else {
        client.shutdown().await
    };
    match end? {
        SessionEnd::Won { winner } => tracing::info!(%winner, "game over"),
        SessionEnd::ServerClosed => tracing::warn!("server closed the connection"),
        SessionEnd::Shutdown => tracing::info!("left the game"),
    }
    Ok(())
}
