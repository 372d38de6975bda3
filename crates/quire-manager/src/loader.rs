//! The collaborator that fetches file contents for the manager.

use crate::error::{ManagerError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A region of a file where the working copy and the base revision disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictChunk {
    pub start_line: usize,
    pub end_line: usize,
    pub resolved: bool,
}

/// File contents as delivered by a loader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileContents {
    pub path: String,
    pub contents: String,
    /// Stable identifier of the edit session, independent of the path.
    /// `None` means the contents are not linked to a file.
    pub file_edit_session_key: Option<String>,
    pub base_revision: u64,
    pub conflicts: Vec<ConflictChunk>,
}

impl FileContents {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            file_edit_session_key: None,
            base_revision: 0,
            conflicts: Vec::new(),
        }
    }

    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.file_edit_session_key = Some(key.into());
        self
    }

    pub fn with_base_revision(mut self, revision: u64) -> Self {
        self.base_revision = revision;
        self
    }

    pub fn with_conflicts(mut self, conflicts: Vec<ConflictChunk>) -> Self {
        self.conflicts = conflicts;
        self
    }
}

/// Outcome of a load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadResponse {
    /// Text that can be opened as a document.
    Editable(FileContents),
    /// Binary or otherwise non-text contents.
    Uneditable(FileContents),
    NotFound,
}

/// Fetches file contents, usually over the network.
#[async_trait]
pub trait DocumentLoader: Send + Sync + 'static {
    async fn load(&self, path: &str) -> Result<LoadResponse>;
}

/// Loader backed by a map, for tests and simulation.
#[derive(Clone, Default)]
pub struct InMemoryLoader {
    files: Arc<RwLock<HashMap<String, LoadResponse>>>,
    loads: Arc<RwLock<HashMap<String, usize>>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `contents` as an editable file.
    pub fn insert(&self, contents: FileContents) {
        self.files
            .write()
            .insert(contents.path.clone(), LoadResponse::Editable(contents));
    }

    pub fn insert_uneditable(&self, contents: FileContents) {
        self.files
            .write()
            .insert(contents.path.clone(), LoadResponse::Uneditable(contents));
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// How many times `path` has been requested.
    pub fn load_count(&self, path: &str) -> usize {
        self.loads.read().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl DocumentLoader for InMemoryLoader {
    async fn load(&self, path: &str) -> Result<LoadResponse> {
        *self.loads.write().entry(path.to_string()).or_insert(0) += 1;
        if path.is_empty() {
            return Err(ManagerError::Load {
                path: String::new(),
                reason: "empty path".to_string(),
            });
        }
        Ok(self
            .files
            .read()
            .get(path)
            .cloned()
            .unwrap_or(LoadResponse::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_loader() {
        let loader = InMemoryLoader::new();
        loader.insert(FileContents::new("/a.txt", "hello").with_session_key("k1"));
        loader.insert_uneditable(FileContents::new("/logo.png", ""));

        match loader.load("/a.txt").await.unwrap() {
            LoadResponse::Editable(contents) => {
                assert_eq!(contents.contents, "hello");
                assert_eq!(contents.file_edit_session_key.as_deref(), Some("k1"));
            }
            other => panic!("unexpected response {other:?}"),
        }
        assert!(matches!(
            loader.load("/logo.png").await.unwrap(),
            LoadResponse::Uneditable(_)
        ));
        assert_eq!(loader.load("/missing").await.unwrap(), LoadResponse::NotFound);
        assert!(loader.load("").await.is_err());
        assert_eq!(loader.load_count("/a.txt"), 1);
    }
}
