use serde::{Deserialize, Serialize};

/// Terminal dimensions in rows and columns.
///
/// Default is 24 rows by 80 columns (standard VT100 size).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Cursor position, 0-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
}

/// Plain-text capture of the emulated screen.
///
/// Attached to timeout diagnostics so a failed checkpoint shows what the
/// shell was displaying when the harness gave up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSnapshot {
    pub rows: u16,
    pub cols: u16,
    pub cursor: Cursor,
    /// One entry per row, trailing spaces trimmed.
    pub lines: Vec<String>,
}

impl ScreenSnapshot {
    /// Rows with visible content, top to bottom.
    pub fn non_empty_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .map(String::as_str)
            .filter(|line| !line.trim().is_empty())
            .collect()
    }
}
