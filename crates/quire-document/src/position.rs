//! Line coordinates.

use crate::line::LineId;
use std::cmp::Ordering;
use std::fmt;

/// A line handle paired with its line number.
///
/// The number is only valid at the instant the value was produced; any
/// later mutation above the line makes it stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LineInfo {
    line: LineId,
    number: usize,
}

impl LineInfo {
    pub fn new(line: LineId, number: usize) -> Self {
        Self { line, number }
    }

    pub fn line(&self) -> LineId {
        self.line
    }

    pub fn number(&self) -> usize {
        self.number
    }
}

impl fmt::Display for LineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.line, self.number)
    }
}

/// An immutable point in a document.
///
/// Two positions are equal when their line numbers and columns match.
#[derive(Clone, Copy, Debug)]
pub struct Position {
    line_info: LineInfo,
    column: usize,
}

impl Position {
    pub fn new(line_info: LineInfo, column: usize) -> Self {
        Self { line_info, column }
    }

    pub fn line_info(&self) -> LineInfo {
        self.line_info
    }

    pub fn line(&self) -> LineId {
        self.line_info.line
    }

    pub fn line_number(&self) -> usize {
        self.line_info.number
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.line_number() == other.line_number() && self.column == other.column
    }
}

impl Eq for Position {}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_positions(
            self.line_number(),
            self.column,
            other.line_number(),
            other.column,
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line_number(), self.column)
    }
}

/// Order two `(line number, column)` pairs.
pub fn compare_positions(
    line_number_a: usize,
    column_a: usize,
    line_number_b: usize,
    column_b: usize,
) -> Ordering {
    line_number_a
        .cmp(&line_number_b)
        .then(column_a.cmp(&column_b))
}
