//! Position arithmetic over a document.

use crate::document::Document;
use crate::error::{DocumentError, Result};
use crate::position::{LineInfo, Position};
use crate::util;

pub use crate::position::compare_positions;
pub use crate::util::last_cursor_column;

/// Text from `begin` (inclusive) to `end` (exclusive). The positions may be
/// given in either order.
pub fn text_between(document: &Document, begin: &Position, end: &Position) -> Result<String> {
    let (begin, end) = if begin <= end {
        (begin, end)
    } else {
        (end, begin)
    };

    let mut text = String::new();
    let mut line = begin.line();
    let mut number = begin.line_number();
    let mut column = begin.column();
    loop {
        let current = document
            .line(line)
            .ok_or(DocumentError::StaleLine(line))?;
        if number == end.line_number() {
            let count = end.column().saturating_sub(column);
            text.push_str(util::slice(current.text(), column, count));
            return Ok(text);
        }
        text.push_str(util::slice(current.text(), column, usize::MAX));
        line = document
            .next_line(line)
            .ok_or(DocumentError::LineNumberOutOfBounds {
                line_number: number + 1,
                line_count: document.line_count(),
            })?;
        number += 1;
        column = 0;
    }
}

/// The position `offset` characters away from `position`, crossing line
/// boundaries. Newlines count as one character.
pub fn position_at_offset(document: &Document, position: &Position, offset: isize) -> Result<Position> {
    let mut line = position.line();
    let mut number = position.line_number();
    let mut len = document
        .line(line)
        .ok_or(DocumentError::StaleLine(line))?
        .len();
    let mut column = position.column() as isize + offset;

    while column < 0 {
        line = document
            .previous_line(line)
            .ok_or(DocumentError::ColumnOutOfBounds {
                column: 0,
                max_column: len,
            })?;
        number -= 1;
        len = document.line(line).map_or(0, |l| l.len());
        column += len as isize;
    }

    while column as usize >= len {
        let Some(next) = document.next_line(line) else {
            let max_column = document.line(line).map_or(0, |l| last_cursor_column(l.text()));
            if column as usize <= max_column {
                break;
            }
            return Err(DocumentError::ColumnOutOfBounds {
                column: column as usize,
                max_column,
            });
        };
        column -= len as isize;
        line = next;
        number += 1;
        len = document.line(line).map_or(0, |l| l.len());
    }

    Ok(Position::new(LineInfo::new(line, number), column as usize))
}
