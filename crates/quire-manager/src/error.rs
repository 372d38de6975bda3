//! Error types for the document manager.

use quire_document::DocumentError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("Failed to load {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Document is not linked to a file")]
    NotLinkedToFile,

    #[error("Document is not managed here")]
    UnknownDocument,

    #[error("No Tokio runtime is available to run loads")]
    NoRuntime,

    #[error("Load was abandoned before it completed")]
    Abandoned,
}

pub type Result<T> = std::result::Result<T, ManagerError>;
