//! Resolving line numbers to lines and back.
//!
//! Line numbers are not stored on lines. The finder walks the chain from the
//! nearest known point: an anchor that caches its line number, or one of the
//! document ends.

use crate::anchor_manager::AnchorManager;
use crate::error::{DocumentError, Result};
use crate::line::{LineId, LineStore};
use crate::position::LineInfo;

/// Borrowed view over a document's lines and anchors.
pub struct LineFinder<'a> {
    lines: &'a LineStore,
    anchors: &'a AnchorManager,
}

impl<'a> LineFinder<'a> {
    pub fn new(lines: &'a LineStore, anchors: &'a AnchorManager) -> Self {
        Self { lines, anchors }
    }

    /// Locate the line with the given number.
    pub fn find_line_by_number(&self, line_number: usize) -> Result<LineInfo> {
        let line_count = self.lines.count();
        if line_number >= line_count {
            return Err(DocumentError::LineNumberOutOfBounds {
                line_number,
                line_count,
            });
        }

        let to_first = line_number;
        let to_last = line_count - 1 - line_number;

        if let Some(anchor) = self.anchors.find_closest_anchor_with_line_number(line_number) {
            if let Some(anchor_number) = anchor.line_number() {
                let to_anchor = anchor_number.abs_diff(line_number);
                if to_anchor < to_first && to_anchor < to_last {
                    return self.walk(anchor.line(), anchor_number, line_number);
                }
            }
        }

        if to_first <= to_last {
            self.walk(self.lines.first(), 0, line_number)
        } else {
            self.walk(self.lines.last(), line_count - 1, line_number)
        }
    }

    /// Locate `line_number` by walking from a known line.
    pub fn find_line_from(&self, hint: LineInfo, line_number: usize) -> Result<LineInfo> {
        let line_count = self.lines.count();
        if line_number >= line_count {
            return Err(DocumentError::LineNumberOutOfBounds {
                line_number,
                line_count,
            });
        }
        if !self.lines.contains(hint.line()) {
            return Err(DocumentError::StaleLine(hint.line()));
        }
        self.walk(hint.line(), hint.number(), line_number)
    }

    /// Compute the number of `line`.
    pub fn find_line(&self, line: LineId) -> Result<LineInfo> {
        if !self.lines.contains(line) {
            return Err(DocumentError::StaleLine(line));
        }
        if line == self.lines.first() {
            return Ok(LineInfo::new(line, 0));
        }
        if line == self.lines.last() {
            return Ok(LineInfo::new(line, self.lines.count() - 1));
        }

        let mut forward = Some(line);
        let mut forward_count = 0;
        let mut backward = self.lines.prev(line);
        let mut backward_count = 1;

        while let (Some(f), Some(b)) = (forward, backward) {
            if let Some(number) = self.cached_number(f) {
                return Ok(LineInfo::new(line, number - forward_count));
            }
            if let Some(number) = self.cached_number(b) {
                return Ok(LineInfo::new(line, number + backward_count));
            }
            forward = self.lines.next(f);
            forward_count += 1;
            backward = self.lines.prev(b);
            backward_count += 1;
        }

        let number = if forward.is_none() {
            self.lines.count() - forward_count
        } else {
            backward_count - 1
        };
        Ok(LineInfo::new(line, number))
    }

    fn cached_number(&self, line: LineId) -> Option<usize> {
        self.anchors
            .find_anchor_with_line_number(line)
            .and_then(|anchor| anchor.line_number())
    }

    fn walk(&self, start: LineId, start_number: usize, target: usize) -> Result<LineInfo> {
        let mut line = start;
        let mut number = start_number;
        while number < target {
            line = self.lines.next(line).ok_or(DocumentError::StaleLine(line))?;
            number += 1;
        }
        while number > target {
            line = self.lines.prev(line).ok_or(DocumentError::StaleLine(line))?;
            number -= 1;
        }
        Ok(LineInfo::new(line, number))
    }
}
