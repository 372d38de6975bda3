//! # quire-manager
//!
//! Keeps the documents of an editing session resident, bounded by a small
//! least-recently-used budget, and reports their lifecycle.
//!
//! - [`DocumentManager`] resolves paths to [`SharedDocument`]s, batching
//!   concurrent loads and evicting documents no editor has open.
//! - [`DocumentLoader`] is the seam to whatever actually fetches file
//!   contents; [`InMemoryLoader`] serves them from a map.
//! - [`DocumentMetadata`] reads and writes the manager's bookkeeping on a
//!   document's tag map.
//!
//! [`SharedDocument`]: quire_document::SharedDocument

pub mod config;
pub mod error;
pub mod loader;
pub mod manager;
pub mod metadata;

pub use config::{ManagerConfig, ManagerConfigBuilder};
pub use error::{ManagerError, Result};
pub use loader::{ConflictChunk, DocumentLoader, FileContents, InMemoryLoader, LoadResponse};
pub use manager::{DocumentManager, DocumentResponse, EditorId, GetDocumentCallback, LifecycleEvent};
pub use metadata::DocumentMetadata;
