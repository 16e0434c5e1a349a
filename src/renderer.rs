//! Renderer adapter: the board view the dispatcher writes into.
//!
//! The client never reads the board back. It only tells a [`Renderer`] about
//! links to share, discs that landed, and messages to show. [`TextBoard`] is
//! a plain-text implementation used by the terminal demo.

use std::io::Write;

use tracing::warn;

use crate::protocol::{Field, Player};

/// Number of columns on a Connect Four board.
pub const COLUMNS: usize = 7;
/// Number of rows on a Connect Four board.
pub const ROWS: usize = 6;

/// Visual side of a game session.
///
/// Methods are infallible from the client's point of view; an implementation
/// that can fail should log and carry on.
pub trait Renderer: Send + 'static {
    /// Show the link another player follows to join (e.g. `?join=abc`).
    fn set_join_link(&mut self, href: &str);

    /// Show the link a spectator follows to watch (e.g. `?watch=xyz`).
    fn set_watch_link(&mut self, href: &str);

    /// Draw `player`'s disc at (`column`, `row`). Row 0 is the bottom row.
    ///
    /// The values are exactly what the server sent; see [`Field::as_index`].
    fn apply_move(&mut self, player: &Player, column: &Field, row: &Field);

    /// Show a message to the user (a win or a server error).
    fn announce(&mut self, message: &str);
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn set_join_link(&mut self, href: &str) {
        (**self).set_join_link(href);
    }

    fn set_watch_link(&mut self, href: &str) {
        (**self).set_watch_link(href);
    }

    fn apply_move(&mut self, player: &Player, column: &Field, row: &Field) {
        (**self).apply_move(player, column, row);
    }

    fn announce(&mut self, message: &str) {
        (**self).announce(message);
    }
}

// ── User activations ────────────────────────────────────────────────

/// One user activation of the board (a click, a key press).
///
/// Carries the column that was hit, or nothing when the activation landed
/// outside every cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Activation {
    column: Option<u32>,
}

impl Activation {
    /// An activation of `column`.
    pub fn on_column(column: u32) -> Self {
        Self {
            column: Some(column),
        }
    }

    /// An activation that hit no cell.
    pub fn outside_board() -> Self {
        Self { column: None }
    }

    /// Build an activation from a cell's column attribute.
    ///
    /// Leading whitespace is skipped and the leading decimal digits are
    /// parsed, so `"3"` and `" 3px"` both mean column 3. A missing attribute or
    /// one with no leading digits yields no column.
    pub fn from_cell_attribute(attribute: Option<&str>) -> Self {
        let column = attribute.and_then(|raw| {
            let raw = raw.trim_start();
            let end = raw
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(raw.len());
            raw.get(..end).and_then(|digits| digits.parse::<u32>().ok())
        });
        Self { column }
    }

    /// The activated column, if any.
    pub fn column(&self) -> Option<u32> {
        self.column
    }
}

// ── TextBoard ───────────────────────────────────────────────────────

/// A [`Renderer`] that keeps a 7×6 grid and redraws it as text into `W`.
///
/// Discs are drawn with the first letter of the player identifier, upper-cased
/// (`red` → `R`, `yellow` → `Y`). Moves whose coordinates are not a cell of
/// the grid are logged and ignored.
#[derive(Debug)]
pub struct TextBoard<W> {
    out: W,
    cells: Vec<Option<char>>,
    join_link: Option<String>,
    watch_link: Option<String>,
    last_announcement: Option<String>,
}

impl<W: Write + Send + 'static> TextBoard<W> {
    /// An empty board drawing into `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            cells: vec![None; COLUMNS * ROWS],
            join_link: None,
            watch_link: None,
            last_announcement: None,
        }
    }

    /// The disc marker at (`column`, `row`), if any.
    pub fn cell(&self, column: usize, row: usize) -> Option<char> {
        if column >= COLUMNS || row >= ROWS {
            return None;
        }
        self.cells.get(row * COLUMNS + column).copied().flatten()
    }

    /// Current join link.
    pub fn join_link(&self) -> Option<&str> {
        self.join_link.as_deref()
    }

    /// Current watch link.
    pub fn watch_link(&self) -> Option<&str> {
        self.watch_link.as_deref()
    }

    /// Most recent announcement.
    pub fn last_announcement(&self) -> Option<&str> {
        self.last_announcement.as_deref()
    }

    /// Give back the writer.
    pub fn into_writer(self) -> W {
        self.out
    }

    /// Render the grid, top row first, followed by a column index footer.
    pub fn draw(&self) -> String {
        let mut text = String::new();
        for row in (0..ROWS).rev() {
            text.push('|');
            for column in 0..COLUMNS {
                text.push(self.cell(column, row).unwrap_or(' '));
                text.push('|');
            }
            text.push('\n');
        }
        for column in 0..COLUMNS {
            text.push(' ');
            text.push_str(&column.to_string());
        }
        text.push('\n');
        text
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!("failed to write to board output: {e}");
        }
    }
}

fn marker(player: &Player) -> char {
    player
        .to_string()
        .chars()
        .next()
        .map_or('?', |c| c.to_ascii_uppercase())
}

impl<W: Write + Send + 'static> Renderer for TextBoard<W> {
    fn set_join_link(&mut self, href: &str) {
        self.join_link = Some(href.to_owned());
        self.write_line(&format!("join: {href}"));
    }

    fn set_watch_link(&mut self, href: &str) {
        self.watch_link = Some(href.to_owned());
        self.write_line(&format!("watch: {href}"));
    }

    fn apply_move(&mut self, player: &Player, column: &Field, row: &Field) {
        let index = column
            .as_index()
            .zip(row.as_index())
            .filter(|&(c, r)| c < COLUMNS && r < ROWS)
            .map(|(c, r)| r * COLUMNS + c);
        let Some(slot) = index.and_then(|i| self.cells.get_mut(i)) else {
            warn!(%player, %column, %row, "move outside the board, ignoring");
            return;
        };
        *slot = Some(marker(player));
        let picture = self.draw();
        self.write_line(&picture);
    }

    fn announce(&mut self, message: &str) {
        self.last_announcement = Some(message.to_owned());
        self.write_line(message);
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
    fn activation_from_attribute() {
        assert_eq!(Activation::from_cell_attribute(Some("3")).column(), Some(3));
        assert_eq!(Activation::from_cell_attribute(Some(" 6px")).column(), Some(6));
        assert_eq!(Activation::from_cell_attribute(Some("x1")).column(), None);
        assert_eq!(Activation::from_cell_attribute(Some("-1")).column(), None);
        assert_eq!(Activation::from_cell_attribute(None).column(), None);
        assert_eq!(Activation::outside_board().column(), None);
    }

    #[test]
    fn text_board_places_discs_bottom_up() {
        let mut board = TextBoard::new(Vec::new());
        board.apply_move(&Player::new("red"), &Field::from(3), &Field::from(0));
        board.apply_move(&Player::new("yellow"), &Field::from("3"), &Field::new(1.0));

        assert_eq!(board.cell(3, 0), Some('R'));
        assert_eq!(board.cell(3, 1), Some('Y'));
        assert_eq!(board.cell(0, 0), None);

        let picture = board.draw();
        let lines: Vec<&str> = picture.lines().collect();
        assert_eq!(lines[ROWS - 1], "| | | |R| | | |");
        assert_eq!(lines[ROWS - 2], "| | | |Y| | | |");
        assert_eq!(lines[ROWS], " 0 1 2 3 4 5 6");
    }

    #[test]
    fn text_board_ignores_moves_off_the_grid() {
        let mut board = TextBoard::new(Vec::new());
        let red = Player::new("red");
        board.apply_move(&red, &Field::from(7), &Field::from(0));
        board.apply_move(&red, &Field::from(-1), &Field::from(0));
        board.apply_move(&red, &Field::from(0), &Field::from(6));
        board.apply_move(&red, &Field::from("x"), &Field::default());
        assert!(board.into_writer().is_empty());
    }

    #[test]
    fn text_board_records_links_and_announcements() {
        let mut board = TextBoard::new(Vec::new());
        board.set_join_link("?join=abc");
        board.set_watch_link("?watch=xyz");
        board.announce("Player red wins!");

        assert_eq!(board.join_link(), Some("?join=abc"));
        assert_eq!(board.watch_link(), Some("?watch=xyz"));
        assert_eq!(board.last_announcement(), Some("Player red wins!"));

        let output = String::from_utf8(board.into_writer()).unwrap();
        assert_eq!(output, "join: ?join=abc\nwatch: ?watch=xyz\nPlayer red wins!\n");
    }
}
