//! Error types for the reorderer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    #[error("Gap timeout must be non-zero")]
    InvalidTimeout,

    #[error("No Tokio runtime is available to drive gap timers")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, ReorderError>;
