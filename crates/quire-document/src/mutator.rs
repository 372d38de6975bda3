//! Insertion and deletion over the line chain.
//!
//! Every operation touches only the lines it edits plus the anchors on them,
//! and asks the anchor manager to adjust those anchors while the mutation is
//! active.

use crate::anchor::AnchorId;
use crate::anchor_manager::{AnchorManager, MutationLog};
use crate::error::{DocumentError, Result};
use crate::event::DocumentEvent;
use crate::line::{LineId, LineStore};
use crate::position::LineInfo;
use crate::text_change::TextChange;
use crate::util;
use tracing::trace;

/// Outcome of one mutation: its record and the events to dispatch.
#[derive(Debug)]
pub(crate) struct Mutation {
    pub change: TextChange,
    pub events: Vec<DocumentEvent>,
}

/// Applies edits to a document's lines and anchors.
pub(crate) struct DocumentMutator<'a> {
    lines: &'a mut LineStore,
    anchors: &'a mut AnchorManager,
}

/// Check that `column` is a valid insertion point on `line`.
pub(crate) fn check_insertion(lines: &LineStore, line: LineId, column: usize) -> Result<()> {
    let text = lines.get(line).ok_or(DocumentError::StaleLine(line))?.text();
    let max_column = util::last_cursor_column(text);
    if column > max_column {
        return Err(DocumentError::ColumnOutOfBounds { column, max_column });
    }
    Ok(())
}

/// The text a deletion of `count` characters at `column` of `line` would
/// remove, or the bounds error it would hit.
pub(crate) fn deleted_text(
    lines: &LineStore,
    line: LineId,
    column: usize,
    count: usize,
) -> Result<String> {
    let first = lines.get(line).ok_or(DocumentError::StaleLine(line))?;
    if count == 0 {
        return Ok(String::new());
    }
    if column >= first.len() {
        return Err(DocumentError::ColumnOutOfBounds {
            column,
            max_column: first.len().saturating_sub(1),
        });
    }

    let mut text = String::new();
    let mut remaining = count;
    let mut cursor = Some(line);
    let mut start = column;
    while remaining > 0 {
        let Some(id) = cursor else { break };
        let Some(current) = lines.get(id) else { break };
        let piece = util::slice(current.text(), start, remaining);
        remaining -= util::char_len(piece);
        text.push_str(piece);
        start = 0;
        cursor = lines.next(id);
    }

    if remaining > 0 {
        return Err(DocumentError::DeleteOutOfBounds {
            requested: count,
            available: count - remaining,
        });
    }
    Ok(text)
}

/// Anchors classified while walking a deletion.
#[derive(Default)]
struct DeletionLists {
    remove: Vec<AnchorId>,
    shift: Vec<AnchorId>,
    leftover: Vec<AnchorId>,
}

impl<'a> DocumentMutator<'a> {
    pub fn new(lines: &'a mut LineStore, anchors: &'a mut AnchorManager) -> Self {
        Self { lines, anchors }
    }

    /// Insert `text` at `column` of `line`, whose number is `line_number`.
    pub fn insert_text(
        &mut self,
        line: LineId,
        line_number: usize,
        column: usize,
        text: &str,
    ) -> Result<Mutation> {
        check_insertion(self.lines, line, column)?;
        trace!(%line, line_number, column, len = text.len(), "insert text");

        let at = LineInfo::new(line, line_number);
        self.anchors.begin_mutation();
        let inserted = if text.contains('\n') {
            self.insert_multiline(at, column, text)
        } else {
            self.insert_single_line(at, column, text)
        };
        let log = self.anchors.end_mutation();
        let (change, added) = inserted?;

        let mut events = anchor_events(log);
        if !added.is_empty() {
            events.push(DocumentEvent::LineCountChanged {
                line_count: self.lines.count(),
            });
            events.push(DocumentEvent::LinesAdded {
                line_number: line_number + 1,
                lines: added,
            });
        }
        events.push(DocumentEvent::TextChanged(change.clone()));
        Ok(Mutation { change, events })
    }

    fn insert_single_line(
        &mut self,
        at: LineInfo,
        column: usize,
        text: &str,
    ) -> Result<(TextChange, Vec<LineId>)> {
        let line = at.line();
        let current = self
            .lines
            .get(line)
            .ok_or(DocumentError::StaleLine(line))?
            .text();
        let (head, tail) = util::split_at_column(current, column);
        let updated = format!("{head}{text}{tail}");
        self.lines.set_text(line, updated);

        let len = util::char_len(text);
        self.anchors.handle_single_line_insertion(line, column, len);

        let change = TextChange::insertion(
            at,
            column,
            at,
            at,
            (column + len).saturating_sub(1),
            text.to_string(),
        );
        Ok((change, Vec::new()))
    }

    fn insert_multiline(
        &mut self,
        at: LineInfo,
        column: usize,
        text: &str,
    ) -> Result<(TextChange, Vec<LineId>)> {
        let line = at.line();
        let current = self
            .lines
            .get(line)
            .ok_or(DocumentError::StaleLine(line))?
            .text()
            .to_string();
        let (head, tail) = util::split_at_column(&current, column);

        let mut parts = text.split('\n');
        let first_part = parts.next().unwrap_or_default();
        let mut middle: Vec<&str> = parts.collect();
        let last_part = middle.pop().unwrap_or_default();

        self.lines.set_text(line, format!("{head}{first_part}\n"));

        let mut added = Vec::with_capacity(middle.len() + 1);
        let mut previous = line;
        for part in middle {
            previous = self.lines.insert_after(previous, format!("{part}\n"));
            added.push(previous);
        }
        let last_line = self.lines.insert_after(previous, format!("{last_part}{tail}"));
        added.push(last_line);

        let last = LineInfo::new(last_line, at.number() + added.len());
        let last_part_len = util::char_len(last_part);
        self.anchors.handle_multiline_insertion(
            line,
            at.number(),
            column,
            last_line,
            last.number(),
            last_part_len,
        );

        let (end, end_column) = if text.ends_with('\n') {
            let end = LineInfo::new(previous, last.number() - 1);
            let end_len = self.lines.get(previous).map_or(1, |l| l.len());
            (end, end_len.saturating_sub(1))
        } else {
            (last, last_part_len - 1)
        };

        let change = TextChange::insertion(at, column, last, end, end_column, text.to_string());
        Ok((change, added))
    }

    /// Delete `count` characters starting at `column` of `line`, whose number
    /// is `line_number`.
    pub fn delete_text(
        &mut self,
        line: LineId,
        line_number: usize,
        column: usize,
        count: usize,
    ) -> Result<Mutation> {
        let text = deleted_text(self.lines, line, column, count)?;
        let at = LineInfo::new(line, line_number);
        if count == 0 {
            return Ok(Mutation {
                change: TextChange::deletion(at, column, text),
                events: Vec::new(),
            });
        }
        trace!(%line, line_number, column, count, "delete text");

        self.anchors.begin_mutation();
        let removed = self.delete_span(at, column, count);
        let log = self.anchors.end_mutation();
        let removed = removed?;

        let mut events = anchor_events(log);
        if !removed.is_empty() {
            events.push(DocumentEvent::LineCountChanged {
                line_count: self.lines.count(),
            });
            events.push(DocumentEvent::LinesRemoved {
                line_number: line_number + 1,
                lines: removed.clone(),
            });
        }
        self.lines.purge(&removed);

        let change = TextChange::deletion(at, column, text);
        events.push(DocumentEvent::TextChanged(change.clone()));
        Ok(Mutation { change, events })
    }

    /// Walk the deletion line by line and return the lines it removed.
    fn delete_span(&mut self, at: LineInfo, column: usize, count: usize) -> Result<Vec<LineId>> {
        let first = at.line();
        let first_text = self
            .lines
            .node_text(first)
            .ok_or(DocumentError::StaleLine(first))?;
        let first_chunk = util::split_at_column(first_text, column).0.to_string();
        let out_of_bounds = |remaining: usize| DocumentError::DeleteOutOfBounds {
            requested: count,
            available: count - remaining,
        };

        let mut lists = DeletionLists::default();
        let mut removed = Vec::new();
        let mut current = first;
        let mut current_number = at.number();
        let mut current_column = column;
        let mut remaining = count;

        let (mut current_count, mut newline_deleted) =
            self.delete_from_line(current, current_column, remaining, true, &mut lists)?;
        remaining -= current_count;

        while remaining > 0 {
            current = self
                .lines
                .node_next(current)
                .ok_or_else(|| out_of_bounds(remaining))?;
            current_number += 1;
            current_column = 0;
            (current_count, newline_deleted) =
                self.delete_from_line(current, 0, remaining, false, &mut lists)?;
            remaining -= current_count;
            removed.push(current);
        }

        if newline_deleted {
            // The following line joins onto the first.
            current = self
                .lines
                .node_next(current)
                .ok_or_else(|| out_of_bounds(remaining))?;
            current_number += 1;
            current_column = 0;
            current_count = 0;
            self.lines.unlink(current);
            removed.push(current);
        }

        let last_text = self
            .lines
            .node_text(current)
            .ok_or(DocumentError::StaleLine(current))?
            .to_string();
        let last_len = util::char_len(&last_text);
        let first_untouched = current_column + current_count;
        if current_count < last_len || last_len == 0 {
            self.anchors.handle_deletion_last_line_leftover(
                &mut lists.leftover,
                first,
                current,
                first_untouched,
            );
        }

        let last_chunk = util::split_at_column(&last_text, first_untouched).1;
        self.lines.set_text(first, format!("{first_chunk}{last_chunk}"));

        self.anchors.handle_deletion_finished(
            &lists.remove,
            &lists.shift,
            &lists.leftover,
            first,
            at.number(),
            column,
            current_number - at.number(),
            first_untouched,
        );
        Ok(removed)
    }

    /// Classify anchors and take this line's share of the deletion. Returns
    /// the characters taken and whether the last of them was a newline.
    fn delete_from_line(
        &mut self,
        line: LineId,
        column: usize,
        remaining: usize,
        is_first_line: bool,
        lists: &mut DeletionLists,
    ) -> Result<(usize, bool)> {
        let text = self
            .lines
            .node_text(line)
            .ok_or(DocumentError::StaleLine(line))?;
        let len = util::char_len(text);
        let count = (len - column).min(remaining);
        let newline = count > 0 && util::char_at(text, column + count - 1) == Some('\n');

        self.anchors.handle_predeletion_for_line(
            line,
            column,
            count,
            len,
            &mut lists.remove,
            &mut lists.shift,
            is_first_line,
        );
        if !is_first_line {
            self.lines.unlink(line);
        }
        Ok((count, newline))
    }
}

fn anchor_events(log: MutationLog) -> Vec<DocumentEvent> {
    let mut events = Vec::new();
    if !log.shifted.is_empty() {
        events.push(DocumentEvent::AnchorsShifted(log.shifted));
    }
    if !log.removed.is_empty() {
        events.push(DocumentEvent::AnchorsRemoved(log.removed));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &LineStore) -> Vec<String> {
        lines.iter().map(|l| l.text().to_string()).collect()
    }

    #[test]
    fn test_check_insertion_bounds() {
        let mut lines = LineStore::new();
        let line = lines.first();
        lines.set_text(line, "abc\n".into());
        assert!(check_insertion(&lines, line, 3).is_ok());
        assert_eq!(
            check_insertion(&lines, line, 4),
            Err(DocumentError::ColumnOutOfBounds { column: 4, max_column: 3 })
        );
    }

    #[test]
    fn test_deleted_text_spans_lines() {
        let mut lines = LineStore::new();
        let first = lines.first();
        lines.set_text(first, "ab\n".into());
        lines.insert_after(first, "cd".into());

        assert_eq!(deleted_text(&lines, first, 1, 3).unwrap(), "b\nc");
        assert_eq!(
            deleted_text(&lines, first, 1, 5),
            Err(DocumentError::DeleteOutOfBounds { requested: 5, available: 4 })
        );
    }

    #[test]
    fn test_multiline_insert_reports_added_lines() {
        let mut lines = LineStore::new();
        let mut anchors = AnchorManager::new();
        let first = lines.first();
        lines.set_text(first, "xyz".into());

        let mutation = DocumentMutator::new(&mut lines, &mut anchors)
            .insert_text(first, 0, 0, "a\nb\nc")
            .unwrap();
        assert_eq!(texts(&lines), vec!["a\n", "b\n", "cxyz"]);

        let added: Vec<&DocumentEvent> = mutation
            .events
            .iter()
            .filter(|e| matches!(e, DocumentEvent::LinesAdded { .. }))
            .collect();
        assert_eq!(added.len(), 1);
        if let DocumentEvent::LinesAdded { line_number, lines: ids } = added[0] {
            assert_eq!(*line_number, 1);
            assert_eq!(ids.len(), 2);
        }
        assert_eq!(mutation.change.end_line_number(), 2);
        assert_eq!(mutation.change.end_column(), 0);
    }

    #[test]
    fn test_zero_length_delete_emits_nothing() {
        let mut lines = LineStore::new();
        let mut anchors = AnchorManager::new();
        let first = lines.first();
        lines.set_text(first, "abc".into());

        let mutation = DocumentMutator::new(&mut lines, &mut anchors)
            .delete_text(first, 0, 1, 0)
            .unwrap();
        assert!(mutation.events.is_empty());
        assert!(mutation.change.is_empty());
        assert_eq!(texts(&lines), vec!["abc"]);
    }
}
