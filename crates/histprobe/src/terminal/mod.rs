//! Terminal emulation for diagnostics.
//!
//! This module wraps the `vt100` crate. Everything the shell writes is fed
//! through the emulator so that a failed checkpoint can report what was
//! actually on screen, with escape sequences already interpreted.
//!
//! # Example
//!
//! ```
//! use histprobe::terminal::Terminal;
//! use histprobe::model::TerminalSize;
//!
//! let mut terminal = Terminal::new(TerminalSize { rows: 24, cols: 80 });
//! terminal.process_bytes(b"histprobe> \x1b[1mtrue\x1b[0m\r\n");
//! let snapshot = terminal.snapshot();
//! assert_eq!(snapshot.lines[0], "histprobe> true");
//! ```

use crate::model::{Cursor, ScreenSnapshot, TerminalSize};
use vt100::Parser;

/// Terminal emulator wrapper using vt100.
pub struct Terminal {
    parser: Parser,
}

impl Terminal {
    /// Create a new terminal with the given size.
    pub fn new(size: TerminalSize) -> Self {
        Self {
            parser: Parser::new(size.rows, size.cols, 0),
        }
    }

    /// Process incoming bytes.
    pub fn process_bytes(&mut self, bytes: &[u8]) {
        self.parser.process(bytes);
    }

    /// Plain-text capture of the current screen.
    pub fn snapshot(&self) -> ScreenSnapshot {
        let screen = self.parser.screen();
        let (rows, cols) = screen.size();
        let lines = screen
            .rows(0, cols)
            .map(|line| line.trim_end().to_string())
            .collect();
        let (row, col) = screen.cursor_position();
        ScreenSnapshot {
            rows,
            cols,
            cursor: Cursor { row, col },
            lines,
        }
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_interprets_cursor_movement() {
        let mut terminal = Terminal::new(TerminalSize { rows: 5, cols: 20 });
        terminal.process_bytes(b"first\r\nsecond\x1b[1;1Hx");
        let snapshot = terminal.snapshot();
        assert_eq!(snapshot.lines[0], "xirst");
        assert_eq!(snapshot.lines[1], "second");
        assert_eq!(snapshot.cursor, Cursor { row: 0, col: 1 });
        assert_eq!(snapshot.non_empty_lines(), vec!["xirst", "second"]);
    }
}
