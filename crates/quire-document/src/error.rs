//! Error types for document operations.

use crate::anchor::AnchorId;
use crate::line::LineId;
use thiserror::Error;

/// Errors that can occur while querying or mutating a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Line number out of bounds: {line_number} (line count: {line_count})")]
    LineNumberOutOfBounds {
        line_number: usize,
        line_count: usize,
    },

    #[error("Line {line} is line {actual}, not line {line_number}")]
    LineNumberMismatch {
        line: LineId,
        line_number: usize,
        actual: usize,
    },

    #[error("Column out of bounds: {column} (maximum: {max_column})")]
    ColumnOutOfBounds { column: usize, max_column: usize },

    #[error("Deletion of {requested} characters exceeds the {available} remaining in the document")]
    DeleteOutOfBounds { requested: usize, available: usize },

    #[error("Line {0} is not attached to the document")]
    StaleLine(LineId),

    #[error("Anchor {0} is not attached to the document")]
    StaleAnchor(AnchorId),

    #[error("Document is already being mutated")]
    ReentrantMutation,
}

pub type Result<T> = std::result::Result<T, DocumentError>;
