//! # quire-document
//!
//! A line-oriented text buffer for collaborative editing.
//!
//! - Lines form an owned chain addressed by never-reused [`LineId`] handles
//! - [`Anchor`]s mark positions that survive arbitrary insertions and
//!   deletions, following their [`AnchorPolicy`]
//! - Every edit costs time proportional to the edit, not the document
//! - Each edit yields one [`TextChange`] and a batch of [`DocumentEvent`]s,
//!   delivered once the document is consistent again
//!
//! ```
//! use quire_document::{AnchorPolicy, AnchorType, Document};
//!
//! const CURSOR: AnchorType = AnchorType::new("selection", "cursor");
//!
//! let mut doc = Document::from_text("xyz");
//! let line = doc.first_line();
//! let cursor = doc
//!     .create_anchor(CURSOR, line, Some(0), Some(3), AnchorPolicy::CURSOR)
//!     .unwrap();
//!
//! doc.insert_text_at(0, 0, "a\nb\n").unwrap();
//! assert_eq!(doc.text(), "a\nb\nxyz");
//!
//! let position = doc.anchor_position(cursor).unwrap();
//! assert_eq!((position.line_number(), position.column()), (2, 3));
//! ```

pub mod anchor;
pub mod anchor_manager;
pub mod document;
pub mod error;
pub mod event;
pub mod line;
pub mod line_finder;
pub mod line_utils;
mod mutator;
pub mod position;
pub mod shared;
pub mod tags;
pub mod text_change;
mod util;

pub use anchor::{Anchor, AnchorId, AnchorPolicy, AnchorType, DeletePolicy, InsertPolicy};
pub use anchor_manager::AnchorManager;
pub use document::{Document, DocumentId};
pub use error::{DocumentError, Result};
pub use event::{DocumentEvent, DocumentListener, ListenerId};
pub use line::{Line, LineId, LineStore};
pub use line_finder::LineFinder;
pub use position::{LineInfo, Position};
pub use shared::SharedDocument;
pub use tags::TagMap;
pub use text_change::{ChangeKind, TextChange};
