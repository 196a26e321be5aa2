//! This module holds utilities for tracking where things are in source code.
//!
//! The main items here are the [`Loc`] struct, which holds a position along with the
//! text of the line it occurs on, and the [`Located`] trait, which indicates that a struct has a location.

use std::fmt::Display;
use std::sync::Arc;

/// Indicates a specific character in given code (1-indexed line, 1-indexed column).
pub type Cursor = (usize /* line */, usize /* column */);

/// A position in source code.
///
/// A location also holds the full text of the line it points into,
/// so that a diagnostic can be rendered without access to the original source.
/// Every token on the same line shares one allocation of that text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Loc {
    line: usize,
    column: usize,
    line_text: Arc<str>,
}

impl Loc {
    /// Creates a new location.
    ///
    /// Line and column are 1-indexed. A zero is bumped to 1.
    pub fn new((line, column): Cursor, line_text: Arc<str>) -> Self {
        Loc { line: line.max(1), column: column.max(1), line_text }
    }

    /// Creates a location that points at nothing.
    ///
    /// This is used when an error occurs but there are no tokens to point at.
    pub fn unknown() -> Self {
        Loc::new((1, 1), Arc::from(""))
    }

    /// The line number (1-indexed).
    pub fn line(&self) -> usize {
        self.line
    }

    /// The column number (1-indexed).
    pub fn column(&self) -> usize {
        self.column
    }

    /// The (line, column) pair of this location.
    pub fn cursor(&self) -> Cursor {
        (self.line, self.column)
    }

    /// The text of the line this location points into.
    pub fn line_text(&self) -> &str {
        &self.line_text
    }
}

impl Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Indicates that a struct has a location.
pub trait Located {
    /// Gets the location of the struct.
    fn loc(&self) -> &Loc;
}

