//! Pseudo-terminal sizing.

use std::io::IsTerminal;

use portable_pty::PtySize;

use crate::error::{Error, Result};

/// Rows used when nothing better is known.
pub const DEFAULT_ROWS: u16 = 24;

/// Columns used when nothing better is known.
pub const DEFAULT_COLS: u16 = 80;

/// Window size handed to the child's terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtyDimensions {
    /// Number of rows
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
}

impl Default for PtyDimensions {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

impl PtyDimensions {
    /// Pick dimensions: explicit values first, then our own terminal when
    /// stdout is one, then the defaults.
    pub fn resolve(rows: Option<u16>, cols: Option<u16>) -> Result<Self> {
        let terminal = if std::io::stdout().is_terminal() {
            crossterm::terminal::size().ok()
        } else {
            None
        };
        Self::pick(rows, cols, terminal)
    }

    /// `terminal` is `(cols, rows)`, as crossterm reports it.
    fn pick(rows: Option<u16>, cols: Option<u16>, terminal: Option<(u16, u16)>) -> Result<Self> {
        if rows == Some(0) || cols == Some(0) {
            return Err(Error::invalid_argument("pty rows and cols must be non-zero"));
        }
        let (term_cols, term_rows) = terminal
            .filter(|(c, r)| *c > 0 && *r > 0)
            .unwrap_or((DEFAULT_COLS, DEFAULT_ROWS));
        Ok(Self {
            rows: rows.unwrap_or(term_rows),
            cols: cols.unwrap_or(term_cols),
        })
    }
}

impl From<PtyDimensions> for PtySize {
    fn from(dims: PtyDimensions) -> Self {
        PtySize {
            rows: dims.rows,
            cols: dims.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}
