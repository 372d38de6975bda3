//! Line storage.
//!
//! Lines form a doubly linked chain held in an arena keyed by [`LineId`].
//! Ids are allocated monotonically and never reused, so a handle to a line
//! that has been removed is detectably stale.

use crate::tags::TagMap;
use crate::util;
use std::collections::HashMap;
use std::fmt;

/// Handle to a line of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(u64);

impl LineId {
    /// The raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A single line of text.
///
/// Every line except the last of its document ends with `\n`.
#[derive(Debug)]
pub struct Line {
    id: LineId,
    text: String,
    len: usize,
    prev: Option<LineId>,
    next: Option<LineId>,
    attached: bool,
    tags: TagMap,
}

impl Line {
    fn new(id: LineId, text: String) -> Self {
        let len = util::char_len(&text);
        Self {
            id,
            text,
            len,
            prev: None,
            next: None,
            attached: true,
            tags: TagMap::new(),
        }
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    /// The line's text, including its trailing newline if any.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters, including the trailing newline.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has_trailing_newline(&self) -> bool {
        self.text.ends_with('\n')
    }

    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagMap {
        &mut self.tags
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.len = util::char_len(&text);
        self.text = text;
    }
}

/// The owned chain of lines backing a document.
#[derive(Debug)]
pub struct LineStore {
    nodes: HashMap<LineId, Line>,
    first: LineId,
    last: LineId,
    count: usize,
    next_id: u64,
}

impl Default for LineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LineStore {
    /// Create a store holding a single empty line.
    pub fn new() -> Self {
        let id = LineId(0);
        let mut nodes = HashMap::new();
        nodes.insert(id, Line::new(id, String::new()));
        Self {
            nodes,
            first: id,
            last: id,
            count: 1,
            next_id: 1,
        }
    }

    pub fn first(&self) -> LineId {
        self.first
    }

    pub fn last(&self) -> LineId {
        self.last
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether `id` refers to a line currently in the chain.
    pub fn contains(&self, id: LineId) -> bool {
        self.nodes.get(&id).map_or(false, |line| line.attached)
    }

    /// Get an attached line.
    pub fn get(&self, id: LineId) -> Option<&Line> {
        self.nodes.get(&id).filter(|line| line.attached)
    }

    /// Mutable access to an attached line.
    pub fn get_mut(&mut self, id: LineId) -> Option<&mut Line> {
        self.nodes.get_mut(&id).filter(|line| line.attached)
    }

    pub fn next(&self, id: LineId) -> Option<LineId> {
        self.get(id).and_then(|line| line.next)
    }

    pub fn prev(&self, id: LineId) -> Option<LineId> {
        self.get(id).and_then(|line| line.prev)
    }

    /// Iterate over the lines from first to last.
    pub fn iter(&self) -> Lines<'_> {
        Lines {
            store: self,
            cursor: Some(self.first),
        }
    }

    /// Text of a line, including detached lines that are still held while a
    /// deletion is in progress.
    pub(crate) fn node_text(&self, id: LineId) -> Option<&str> {
        self.nodes.get(&id).map(Line::text)
    }

    /// Successor link of a line, attached or not.
    pub(crate) fn node_next(&self, id: LineId) -> Option<LineId> {
        self.nodes.get(&id).and_then(|line| line.next)
    }

    pub(crate) fn set_text(&mut self, id: LineId, text: String) {
        if let Some(line) = self.nodes.get_mut(&id) {
            line.set_text(text);
        }
    }

    /// Link a new line after `after` and return its id.
    pub(crate) fn insert_after(&mut self, after: LineId, text: String) -> LineId {
        let id = LineId(self.next_id);
        self.next_id += 1;

        let mut line = Line::new(id, text);
        let next = self.nodes.get(&after).and_then(|l| l.next);
        line.prev = Some(after);
        line.next = next;
        self.nodes.insert(id, line);

        if let Some(prev) = self.nodes.get_mut(&after) {
            prev.next = Some(id);
        }
        match next {
            Some(next) => {
                if let Some(next) = self.nodes.get_mut(&next) {
                    next.prev = Some(id);
                }
            }
            None => self.last = id,
        }
        self.count += 1;
        id
    }

    /// Unlink a line from the chain. The node itself is kept, with its own
    /// links intact, until [`LineStore::purge`] drops it.
    pub(crate) fn unlink(&mut self, id: LineId) {
        let (prev, next) = match self.nodes.get_mut(&id) {
            Some(line) if line.attached => {
                line.attached = false;
                (line.prev, line.next)
            }
            _ => return,
        };

        match prev {
            Some(prev) => {
                if let Some(prev) = self.nodes.get_mut(&prev) {
                    prev.next = next;
                }
            }
            None => {
                if let Some(next) = next {
                    self.first = next;
                }
            }
        }
        match next {
            Some(next) => {
                if let Some(next) = self.nodes.get_mut(&next) {
                    next.prev = prev;
                }
            }
            None => {
                if let Some(prev) = prev {
                    self.last = prev;
                }
            }
        }
        self.count -= 1;
    }

    /// Drop unlinked nodes along with their tags.
    pub(crate) fn purge(&mut self, ids: &[LineId]) {
        for id in ids {
            if self.nodes.get(id).map_or(false, |line| !line.attached) {
                self.nodes.remove(id);
            }
        }
    }

    /// Clear the tags of every line.
    pub(crate) fn clear_tags(&mut self) {
        for line in self.nodes.values_mut() {
            line.tags.clear();
        }
    }
}

/// Iterator over the lines of a [`LineStore`].
pub struct Lines<'a> {
    store: &'a LineStore,
    cursor: Option<LineId>,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a Line;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.store.get(self.cursor?)?;
        self.cursor = line.next;
        Some(line)
    }
}
