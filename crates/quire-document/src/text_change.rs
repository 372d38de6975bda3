//! Records of applied edits.

use crate::line::LineId;
use crate::position::LineInfo;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Delete,
}

/// One applied insertion or deletion.
///
/// The end coordinates are inclusive: for an insertion they point at the last
/// inserted character; for a deletion they equal the start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChange {
    kind: ChangeKind,
    line: LineId,
    line_number: usize,
    column: usize,
    last_line: LineId,
    last_line_number: usize,
    end_line: LineId,
    end_line_number: usize,
    end_column: usize,
    text: String,
}

impl TextChange {
    pub(crate) fn insertion(
        line: LineInfo,
        column: usize,
        last_line: LineInfo,
        end: LineInfo,
        end_column: usize,
        text: String,
    ) -> Self {
        Self {
            kind: ChangeKind::Insert,
            line: line.line(),
            line_number: line.number(),
            column,
            last_line: last_line.line(),
            last_line_number: last_line.number(),
            end_line: end.line(),
            end_line_number: end.number(),
            end_column,
            text,
        }
    }

    pub(crate) fn deletion(line: LineInfo, column: usize, text: String) -> Self {
        Self {
            kind: ChangeKind::Delete,
            line: line.line(),
            line_number: line.number(),
            column,
            last_line: line.line(),
            last_line_number: line.number(),
            end_line: line.line(),
            end_line_number: line.number(),
            end_column: column,
            text,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn line(&self) -> LineId {
        self.line
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// Last line touched by the change.
    pub fn last_line(&self) -> LineId {
        self.last_line
    }

    pub fn last_line_number(&self) -> usize {
        self.last_line_number
    }

    pub fn end_line(&self) -> LineId {
        self.end_line
    }

    pub fn end_line_number(&self) -> usize {
        self.end_line_number
    }

    pub fn end_column(&self) -> usize {
        self.end_column
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of characters inserted or deleted.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for TextChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ChangeKind::Insert => "I",
            ChangeKind::Delete => "D",
        };
        write!(
            f,
            "{}({},{})-({},{}): {:?}",
            kind, self.line_number, self.column, self.end_line_number, self.end_column, self.text
        )
    }
}
