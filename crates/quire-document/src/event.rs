//! Document change notifications.

use crate::anchor::AnchorId;
use crate::document::Document;
use crate::line::LineId;
use crate::position::LineInfo;
use crate::text_change::{ChangeKind, TextChange};

/// Notifications emitted by a [`Document`].
///
/// A mutation emits, in order: `PreTextChange` (before any state changes),
/// `AnchorsShifted`, `AnchorsRemoved`, `LineCountChanged`, `LinesAdded` or
/// `LinesRemoved`, then `TextChanged`. Events with nothing to report are
/// omitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentEvent {
    /// A mutation is about to be applied.
    PreTextChange {
        kind: ChangeKind,
        line: LineInfo,
        column: usize,
        text: String,
    },
    /// Anchors moved as a side effect of a mutation.
    AnchorsShifted(Vec<AnchorId>),
    /// Anchors detached by a mutation or removed explicitly.
    AnchorsRemoved(Vec<AnchorId>),
    /// An anchor was moved explicitly.
    AnchorMoved(AnchorId),
    LineCountChanged { line_count: usize },
    /// New lines, in document order, starting at `line_number`.
    LinesAdded {
        line_number: usize,
        lines: Vec<LineId>,
    },
    /// Removed lines, in their former order, formerly starting at
    /// `line_number`. The ids are no longer attached.
    LinesRemoved {
        line_number: usize,
        lines: Vec<LineId>,
    },
    TextChanged(TextChange),
}

/// Handle returned by listener registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous observer of a document.
///
/// Listeners receive the document by shared reference, after its line and
/// anchor state is consistent.
pub trait DocumentListener: Send + Sync {
    fn on_event(&mut self, document: &Document, event: &DocumentEvent);
}

impl<F> DocumentListener for F
where
    F: FnMut(&Document, &DocumentEvent) + Send + Sync,
{
    fn on_event(&mut self, document: &Document, event: &DocumentEvent) {
        self(document, event)
    }
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Vec<(ListenerId, Box<dyn DocumentListener>)>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn add(&mut self, listener: Box<dyn DocumentListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(other, _)| *other != id);
        before != self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn dispatch(&mut self, document: &Document, event: &DocumentEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener.on_event(document, event);
        }
    }
}
