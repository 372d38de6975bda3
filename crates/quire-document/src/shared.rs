//! Shared, lockable document handles.

use crate::document::{Document, DocumentId};
use crate::error::{DocumentError, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// A document shared between collaborators.
#[derive(Clone)]
pub struct SharedDocument {
    id: DocumentId,
    inner: Arc<RwLock<Document>>,
}

impl SharedDocument {
    pub fn new(document: Document) -> Self {
        Self {
            id: document.id(),
            inner: Arc::new(RwLock::new(document)),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Document> {
        self.inner.read()
    }

    /// Shared access, failing instead of blocking while the document is
    /// locked for writing.
    pub fn try_read(&self) -> Result<RwLockReadGuard<'_, Document>> {
        self.inner.try_read().ok_or(DocumentError::ReentrantMutation)
    }

    /// Block until exclusive access is available.
    pub fn write(&self) -> RwLockWriteGuard<'_, Document> {
        self.inner.write()
    }

    /// Run `f` with exclusive access, failing instead of blocking if the
    /// document is already locked, for instance by a mutation whose listener
    /// called back into this handle.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Document) -> R) -> Result<R> {
        let mut guard = self
            .inner
            .try_write()
            .ok_or(DocumentError::ReentrantMutation)?;
        Ok(f(&mut guard))
    }

    /// Whether both handles refer to the same document.
    pub fn ptr_eq(&self, other: &SharedDocument) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for SharedDocument {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SharedDocument {}

impl fmt::Debug for SharedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDocument").field("id", &self.id).finish()
    }
}

impl From<Document> for SharedDocument {
    fn from(document: Document) -> Self {
        Self::new(document)
    }
}
