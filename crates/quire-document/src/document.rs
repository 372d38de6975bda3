//! The document: a chain of lines, its anchors, and its listeners.

use crate::anchor::{Anchor, AnchorId, AnchorPolicy, AnchorType};
use crate::anchor_manager::AnchorManager;
use crate::error::{DocumentError, Result};
use crate::event::{DocumentEvent, DocumentListener, ListenerId, ListenerRegistry};
use crate::line::{Line, LineId, LineStore, Lines};
use crate::line_finder::LineFinder;
use crate::mutator::{self, DocumentMutator, Mutation};
use crate::position::{LineInfo, Position};
use crate::tags::TagMap;
use crate::text_change::{ChangeKind, TextChange};
use crate::util;
use std::any::Any;
use std::fmt;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique document identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

/// A line-oriented text buffer with position-stable anchors.
///
/// A document always has at least one line. Mutations take `&mut self` and
/// run to completion; listeners are notified afterwards with `&Document`.
pub struct Document {
    id: DocumentId,
    lines: LineStore,
    anchors: AnchorManager,
    listeners: ListenerRegistry,
    event_tx: broadcast::Sender<DocumentEvent>,
    tags: TagMap,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document holding a single empty line.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            id: DocumentId::next(),
            lines: LineStore::new(),
            anchors: AnchorManager::new(),
            listeners: ListenerRegistry::default(),
            event_tx,
            tags: TagMap::new(),
        }
    }

    /// Create a document with the given contents.
    pub fn from_text(text: &str) -> Self {
        let mut document = Self::new();
        let mut parts = text.split('\n').peekable();
        let mut line = document.lines.first();
        let mut first = true;
        while let Some(part) = parts.next() {
            let content = if parts.peek().is_some() {
                format!("{part}\n")
            } else {
                part.to_string()
            };
            if first {
                document.lines.set_text(line, content);
                first = false;
            } else {
                line = document.lines.insert_after(line, content);
            }
        }
        document
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The full text.
    pub fn text(&self) -> String {
        self.lines.iter().map(Line::text).collect()
    }

    /// Up to `count` characters starting at `column` of `line`, continuing
    /// onto following lines and stopping at the end of the document.
    pub fn text_at(&self, line: LineId, column: usize, count: usize) -> Result<String> {
        let first = self.lines.get(line).ok_or(DocumentError::StaleLine(line))?;
        if column > first.len() {
            return Err(DocumentError::ColumnOutOfBounds {
                column,
                max_column: first.len(),
            });
        }
        let mut text = String::new();
        let mut remaining = count;
        let mut cursor = Some(line);
        let mut start = column;
        while let Some(current) = cursor.and_then(|id| self.lines.get(id)) {
            if remaining == 0 {
                break;
            }
            let piece = util::slice(current.text(), start, remaining);
            remaining -= util::char_len(piece);
            text.push_str(piece);
            start = 0;
            cursor = self.lines.next(current.id());
        }
        Ok(text)
    }

    pub fn line_count(&self) -> usize {
        self.lines.count()
    }

    pub fn last_line_number(&self) -> usize {
        self.lines.count() - 1
    }

    pub fn first_line(&self) -> LineId {
        self.lines.first()
    }

    pub fn last_line(&self) -> LineId {
        self.lines.last()
    }

    pub fn first_line_info(&self) -> LineInfo {
        LineInfo::new(self.lines.first(), 0)
    }

    pub fn last_line_info(&self) -> LineInfo {
        LineInfo::new(self.lines.last(), self.last_line_number())
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id)
    }

    pub fn next_line(&self, id: LineId) -> Option<LineId> {
        self.lines.next(id)
    }

    pub fn previous_line(&self, id: LineId) -> Option<LineId> {
        self.lines.prev(id)
    }

    pub fn lines(&self) -> Lines<'_> {
        self.lines.iter()
    }

    pub fn line_store(&self) -> &LineStore {
        &self.lines
    }

    pub fn line_tags(&self, id: LineId) -> Option<&TagMap> {
        self.lines.get(id).map(Line::tags)
    }

    pub fn line_tags_mut(&mut self, id: LineId) -> Option<&mut TagMap> {
        self.lines.get_mut(id).map(Line::tags_mut)
    }

    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagMap {
        &mut self.tags
    }

    pub fn anchors(&self) -> &AnchorManager {
        &self.anchors
    }

    pub fn line_finder(&self) -> LineFinder<'_> {
        LineFinder::new(&self.lines, &self.anchors)
    }

    /// Shorthand for `line_finder().find_line_by_number(n)`.
    pub fn line_info(&self, line_number: usize) -> Result<LineInfo> {
        self.line_finder().find_line_by_number(line_number)
    }

    // Anchors

    /// Attach an anchor to `line`. `line_number` must be the line's current
    /// number, or `None` to not track it; `column` is `None` for a line anchor.
    pub fn create_anchor(
        &mut self,
        anchor_type: AnchorType,
        line: LineId,
        line_number: Option<usize>,
        column: Option<usize>,
        policy: AnchorPolicy,
    ) -> Result<AnchorId> {
        self.create_anchor_inner(anchor_type, line, line_number, column, policy, None)
    }

    /// Like [`Document::create_anchor`], carrying a caller value.
    pub fn create_anchor_with_value<T: Any + Send + Sync>(
        &mut self,
        anchor_type: AnchorType,
        line: LineId,
        line_number: Option<usize>,
        column: Option<usize>,
        policy: AnchorPolicy,
        value: T,
    ) -> Result<AnchorId> {
        self.create_anchor_inner(
            anchor_type,
            line,
            line_number,
            column,
            policy,
            Some(Arc::new(value)),
        )
    }

    fn create_anchor_inner(
        &mut self,
        anchor_type: AnchorType,
        line: LineId,
        line_number: Option<usize>,
        column: Option<usize>,
        policy: AnchorPolicy,
        value: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<AnchorId> {
        self.check_anchor_target(line, line_number, column)?;
        Ok(self
            .anchors
            .create_anchor(anchor_type, line, line_number, column, policy, value))
    }

    /// `line` must be attached, `line_number` must be its current number and
    /// `column` must not pass the last cursor column of its text.
    fn check_anchor_target(
        &self,
        line: LineId,
        line_number: Option<usize>,
        column: Option<usize>,
    ) -> Result<()> {
        let text = self
            .lines
            .get(line)
            .map(Line::text)
            .ok_or(DocumentError::StaleLine(line))?;
        if let Some(column) = column {
            let max_column = util::last_cursor_column(text);
            if column > max_column {
                return Err(DocumentError::ColumnOutOfBounds { column, max_column });
            }
        }
        if let Some(line_number) = line_number {
            let line_count = self.lines.count();
            if line_number >= line_count {
                return Err(DocumentError::LineNumberOutOfBounds {
                    line_number,
                    line_count,
                });
            }
            let actual = self.line_finder().find_line(line)?.number();
            if actual != line_number {
                return Err(DocumentError::LineNumberMismatch {
                    line,
                    line_number,
                    actual,
                });
            }
        }
        Ok(())
    }

    pub fn anchor(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.anchor(id)
    }

    pub fn set_anchor_value<T: Any + Send + Sync>(&mut self, id: AnchorId, value: T) -> Result<()> {
        let anchor = self
            .anchors
            .anchor_mut(id)
            .ok_or(DocumentError::StaleAnchor(id))?;
        anchor.set_value(value);
        Ok(())
    }

    /// Detach an anchor.
    pub fn remove_anchor(&mut self, id: AnchorId) -> Result<()> {
        self.anchors
            .remove_anchor(id)
            .ok_or(DocumentError::StaleAnchor(id))?;
        self.dispatch(vec![DocumentEvent::AnchorsRemoved(vec![id])]);
        Ok(())
    }

    /// Move an anchor. A line anchor keeps ignoring its column, and an anchor
    /// that does not track its line number keeps not tracking it; only the
    /// parts the anchor uses are validated.
    pub fn move_anchor(
        &mut self,
        id: AnchorId,
        line: LineId,
        line_number: usize,
        column: usize,
    ) -> Result<()> {
        let anchor = self.anchors.anchor(id).ok_or(DocumentError::StaleAnchor(id))?;
        let checked_number = anchor.has_line_number().then_some(line_number);
        let checked_column = (!anchor.is_line_anchor()).then_some(column);
        self.check_anchor_target(line, checked_number, checked_column)?;
        self.anchors.move_anchor(id, line, line_number, column)?;
        self.dispatch(vec![DocumentEvent::AnchorMoved(id)]);
        Ok(())
    }

    pub fn anchor_position(&self, id: AnchorId) -> Result<Position> {
        self.anchors.position(&self.lines, id)
    }

    pub fn next_anchor(&self, id: AnchorId, anchor_type: Option<AnchorType>) -> Option<&Anchor> {
        self.anchors.next_anchor(&self.lines, id, anchor_type)
    }

    pub fn previous_anchor(
        &self,
        id: AnchorId,
        anchor_type: Option<AnchorType>,
    ) -> Option<&Anchor> {
        self.anchors.previous_anchor(&self.lines, id, anchor_type)
    }

    // Mutations

    /// Insert `text` at `column` of `line`, whose current number is
    /// `line_number`.
    pub fn insert_text(
        &mut self,
        line: LineId,
        line_number: usize,
        column: usize,
        text: &str,
    ) -> Result<TextChange> {
        mutator::check_insertion(&self.lines, line, column)?;
        self.dispatch(vec![DocumentEvent::PreTextChange {
            kind: ChangeKind::Insert,
            line: LineInfo::new(line, line_number),
            column,
            text: text.to_string(),
        }]);
        let mutation =
            DocumentMutator::new(&mut self.lines, &mut self.anchors).insert_text(line, line_number, column, text)?;
        Ok(self.finish(mutation))
    }

    /// Insert at a line number.
    pub fn insert_text_at(&mut self, line_number: usize, column: usize, text: &str) -> Result<TextChange> {
        let info = self.line_info(line_number)?;
        self.insert_text(info.line(), info.number(), column, text)
    }

    /// Insert on a line whose number is not known.
    pub fn insert_text_on(&mut self, line: LineId, column: usize, text: &str) -> Result<TextChange> {
        let info = self.line_finder().find_line(line)?;
        self.insert_text(line, info.number(), column, text)
    }

    /// Delete `count` characters starting at `column` of `line`, whose
    /// current number is `line_number`. Fails without changing anything if
    /// the deletion runs past the end of the document.
    pub fn delete_text(
        &mut self,
        line: LineId,
        line_number: usize,
        column: usize,
        count: usize,
    ) -> Result<TextChange> {
        let text = mutator::deleted_text(&self.lines, line, column, count)?;
        if count > 0 {
            self.dispatch(vec![DocumentEvent::PreTextChange {
                kind: ChangeKind::Delete,
                line: LineInfo::new(line, line_number),
                column,
                text,
            }]);
        }
        let mutation = DocumentMutator::new(&mut self.lines, &mut self.anchors)
            .delete_text(line, line_number, column, count)?;
        Ok(self.finish(mutation))
    }

    pub fn delete_text_at(&mut self, line_number: usize, column: usize, count: usize) -> Result<TextChange> {
        let info = self.line_info(line_number)?;
        self.delete_text(info.line(), info.number(), column, count)
    }

    pub fn delete_text_on(&mut self, line: LineId, column: usize, count: usize) -> Result<TextChange> {
        let info = self.line_finder().find_line(line)?;
        self.delete_text(line, info.number(), column, count)
    }

    fn finish(&mut self, mutation: Mutation) -> TextChange {
        let Mutation { change, events } = mutation;
        self.dispatch(events);
        change
    }

    // Listeners

    pub fn register_listener(&mut self, listener: impl DocumentListener + 'static) -> ListenerId {
        self.listeners.add(Box::new(listener))
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Subscribe to this document's events on a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.event_tx.subscribe()
    }

    fn dispatch(&mut self, events: Vec<DocumentEvent>) {
        if events.is_empty() {
            return;
        }
        let mut listeners = std::mem::take(&mut self.listeners);
        for event in &events {
            listeners.dispatch(self, event);
            if self.event_tx.receiver_count() > 0 {
                let _ = self.event_tx.send(event.clone());
            }
        }
        self.listeners = listeners;
    }

    /// Drop all line tags and anchors, keeping text, document tags, and
    /// listeners.
    pub fn clear_transient_state(&mut self) {
        self.lines.clear_tags();
        self.anchors.clear();
    }

    /// Multi-line dump of the lines and the anchors on them.
    pub fn debug_string(&self) -> String {
        let mut out = String::new();
        for (number, line) in self.lines.iter().enumerate() {
            let _ = write!(out, "{number:>4} {:<6} {:?}", line.id().to_string(), line.text());
            let anchors: Vec<String> = self
                .anchors
                .anchors_on_line(line.id())
                .map(ToString::to_string)
                .collect();
            if !anchors.is_empty() {
                let _ = write!(out, "  {}", anchors.join(" "));
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("line_count", &self.lines.count())
            .field("anchor_count", &self.anchors.anchor_count())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    const CURSOR: AnchorType = AnchorType::new("test", "cursor");

    fn texts(document: &Document) -> Vec<String> {
        document.lines().map(|l| l.text().to_string()).collect()
    }

    #[test]
    fn test_from_text_matches_insertion() {
        let built = Document::from_text("Hello world\nFoo bar\n");
        let mut inserted = Document::new();
        inserted.insert_text_at(0, 0, "Hello world\nFoo bar\n").unwrap();
        assert_eq!(texts(&built), texts(&inserted));
        assert_eq!(texts(&built), vec!["Hello world\n", "Foo bar\n", ""]);
        assert_eq!(built.line_count(), 3);
    }

    #[test]
    fn test_text_at_spans_lines_and_stops_at_end() {
        let document = Document::from_text("ab\ncd");
        assert_eq!(document.text_at(document.first_line(), 1, 3).unwrap(), "b\nc");
        assert_eq!(document.text_at(document.first_line(), 0, 99).unwrap(), "ab\ncd");
    }

    #[test]
    fn test_event_order_for_multiline_insert() {
        let mut document = Document::from_text("xyz");
        let first = document.first_line();
        document
            .create_anchor(CURSOR, first, Some(0), Some(1), AnchorPolicy::CURSOR)
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        document.register_listener(move |_: &Document, event: &DocumentEvent| {
            let name = match event {
                DocumentEvent::PreTextChange { .. } => "pre",
                DocumentEvent::AnchorsShifted(_) => "shifted",
                DocumentEvent::AnchorsRemoved(_) => "removed",
                DocumentEvent::AnchorMoved(_) => "moved",
                DocumentEvent::LineCountChanged { .. } => "count",
                DocumentEvent::LinesAdded { .. } => "added",
                DocumentEvent::LinesRemoved { .. } => "lines-removed",
                DocumentEvent::TextChanged(_) => "text",
            };
            sink.lock().push(name);
        });

        document.insert_text_at(0, 0, "a\nb\n").unwrap();
        assert_eq!(*seen.lock(), vec!["pre", "shifted", "count", "added", "text"]);
    }

    #[test]
    fn test_listener_sees_consistent_state() {
        let mut document = Document::from_text("one\ntwo");
        let observed = Arc::new(Mutex::new(None));
        let sink = observed.clone();
        document.register_listener(move |doc: &Document, event: &DocumentEvent| {
            if let DocumentEvent::LineCountChanged { line_count } = event {
                *sink.lock() = Some((*line_count, doc.line_count(), doc.text()));
            }
        });
        document.delete_text_at(0, 3, 1).unwrap();
        assert_eq!(*observed.lock(), Some((1, 1, "onetwo".to_string())));
    }

    #[test]
    fn test_unregister_listener() {
        let mut document = Document::new();
        let id = document.register_listener(|_: &Document, _: &DocumentEvent| {});
        assert_eq!(document.listener_count(), 1);
        assert!(document.unregister_listener(id));
        assert!(!document.unregister_listener(id));
    }

    #[test]
    fn test_broadcast_subscription() {
        let mut document = Document::new();
        let mut rx = document.subscribe();
        document.insert_text_at(0, 0, "hi").unwrap();
        assert!(matches!(rx.try_recv(), Ok(DocumentEvent::PreTextChange { .. })));
        assert!(matches!(rx.try_recv(), Ok(DocumentEvent::TextChanged(_))));
    }

    #[test]
    fn test_clear_transient_state() {
        let mut document = Document::from_text("a\nb");
        let first = document.first_line();
        document.line_tags_mut(first).unwrap().put("parsed", true);
        document.tags_mut().put("path", String::from("/a.txt"));
        document
            .create_anchor(CURSOR, first, Some(0), Some(0), AnchorPolicy::CURSOR)
            .unwrap();

        document.clear_transient_state();
        assert!(document.line_tags(first).unwrap().is_empty());
        assert_eq!(document.anchors().anchor_count(), 0);
        assert!(document.tags().contains("path"));
        assert_eq!(document.text(), "a\nb");
    }

    #[test]
    fn test_debug_string_lists_anchors() {
        let mut document = Document::from_text("a\nb");
        let first = document.first_line();
        document
            .create_anchor(CURSOR, first, Some(0), Some(1), AnchorPolicy::CURSOR)
            .unwrap();
        let dump = document.debug_string();
        assert!(dump.contains("test:cursor 0:1"));
        assert_eq!(dump.lines().count(), 2);
    }
}
