//! Anchors: position-stable markers attached to lines.

use crate::line::LineId;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Handle to an anchor owned by an [`AnchorManager`](crate::AnchorManager).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub(crate) u64);

impl AnchorId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Namespaced identifier for a kind of anchor, e.g. `("selection", "cursor")`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnchorType {
    namespace: &'static str,
    name: &'static str,
}

impl AnchorType {
    pub const fn new(namespace: &'static str, name: &'static str) -> Self {
        Self { namespace, name }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for AnchorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Where an anchor goes when text is inserted exactly at its column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InsertPolicy {
    /// Stay before the inserted text.
    Earlier,
    /// Move past the inserted text.
    Later,
}

/// What happens to an anchor whose position is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeletePolicy {
    /// Move to the point where the deleted range collapsed.
    Clamp,
    /// Detach the anchor from the document.
    Remove,
}

/// Insert and delete behavior of an anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnchorPolicy {
    pub insert: InsertPolicy,
    pub delete: DeletePolicy,
}

impl AnchorPolicy {
    pub const MARKER: AnchorPolicy = AnchorPolicy::new(InsertPolicy::Earlier, DeletePolicy::Remove);
    pub const CURSOR: AnchorPolicy = AnchorPolicy::new(InsertPolicy::Later, DeletePolicy::Clamp);
    pub const SELECTION_BASE: AnchorPolicy =
        AnchorPolicy::new(InsertPolicy::Earlier, DeletePolicy::Clamp);
    pub const RANGE_START: AnchorPolicy =
        AnchorPolicy::new(InsertPolicy::Earlier, DeletePolicy::Clamp);
    pub const RANGE_END: AnchorPolicy = AnchorPolicy::new(InsertPolicy::Later, DeletePolicy::Clamp);
    pub const LINE_TRACKER: AnchorPolicy =
        AnchorPolicy::new(InsertPolicy::Earlier, DeletePolicy::Clamp);

    pub const fn new(insert: InsertPolicy, delete: DeletePolicy) -> Self {
        Self { insert, delete }
    }
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        Self::MARKER
    }
}

/// A marker bound to a line and, unless it is a line anchor, a column.
#[derive(Clone)]
pub struct Anchor {
    pub(crate) id: AnchorId,
    pub(crate) anchor_type: AnchorType,
    pub(crate) line: LineId,
    pub(crate) line_number: Option<usize>,
    pub(crate) column: Option<usize>,
    pub(crate) policy: AnchorPolicy,
    pub(crate) value: Option<Arc<dyn Any + Send + Sync>>,
}

impl Anchor {
    pub fn id(&self) -> AnchorId {
        self.id
    }

    pub fn anchor_type(&self) -> AnchorType {
        self.anchor_type
    }

    pub fn line(&self) -> LineId {
        self.line
    }

    /// Cached line number, kept current by the anchor manager. `None` if the
    /// anchor ignores line numbers.
    pub fn line_number(&self) -> Option<usize> {
        self.line_number
    }

    /// Column on the line. `None` for a line anchor.
    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn policy(&self) -> AnchorPolicy {
        self.policy
    }

    pub fn is_line_anchor(&self) -> bool {
        self.column.is_none()
    }

    pub fn has_line_number(&self) -> bool {
        self.line_number.is_some()
    }

    /// The caller-supplied value, if it has type `T`.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    pub fn set_value<T: Any + Send + Sync>(&mut self, value: T) {
        self.value = Some(Arc::new(value));
    }
}

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor")
            .field("id", &self.id)
            .field("type", &self.anchor_type)
            .field("line", &self.line)
            .field("line_number", &self.line_number)
            .field("column", &self.column)
            .field("policy", &self.policy)
            .finish()
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let number = self
            .line_number
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        let column = self
            .column
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        write!(f, "{}[{} {}:{}]", self.id, self.anchor_type, number, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_presets() {
        assert_eq!(AnchorPolicy::default(), AnchorPolicy::MARKER);
        assert_eq!(AnchorPolicy::CURSOR.insert, InsertPolicy::Later);
        assert_eq!(AnchorPolicy::CURSOR.delete, DeletePolicy::Clamp);
        assert_eq!(AnchorPolicy::RANGE_START.insert, InsertPolicy::Earlier);
        assert_eq!(AnchorPolicy::RANGE_END.insert, InsertPolicy::Later);
        assert_eq!(AnchorPolicy::MARKER.delete, DeletePolicy::Remove);
    }

    #[test]
    fn test_anchor_type_display() {
        let kind = AnchorType::new("selection", "cursor");
        assert_eq!(kind.to_string(), "selection:cursor");
    }
}
