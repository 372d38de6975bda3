//! Bounded cache of documents keyed by file edit session.
//!
//! Documents live in a list ordered from least to most recently used. After
//! each newly created document the manager evicts from the front of that
//! list until it is back under capacity, skipping anything an editor has
//! open. Loads go through a [`DocumentLoader`] on the Tokio runtime and
//! concurrent requests for one path share a single load.
//!
//! The manager never blocks on a document lock while it holds its own state.
//! An operation that has to read or write a document locked elsewhere, such
//! as one called from inside [`SharedDocument::edit`], fails with
//! [`DocumentError::ReentrantMutation`](quire_document::DocumentError::ReentrantMutation)
//! and leaves everything as it was.

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::loader::{DocumentLoader, FileContents, LoadResponse};
use crate::metadata::DocumentMetadata;
use parking_lot::Mutex;
use quire_document::{Document, DocumentId, SharedDocument};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, trace, warn};

/// Identifies an editor surface that can show one document at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditorId(pub u64);

impl fmt::Display for EditorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "editor-{}", self.0)
    }
}

/// Changes in a managed document's life.
#[derive(Clone, Debug)]
pub enum LifecycleEvent {
    Created(SharedDocument),
    LinkedToFile {
        document: SharedDocument,
        contents: FileContents,
    },
    Opened {
        document: SharedDocument,
        editor: EditorId,
    },
    Closed {
        document: SharedDocument,
        editor: EditorId,
    },
    /// Sent before the link is dropped; carries the file metadata as it was.
    UnlinkingFromFile {
        document: SharedDocument,
        file_edit_session_key: Option<String>,
        path: Option<String>,
    },
    GarbageCollected(SharedDocument),
}

impl LifecycleEvent {
    pub fn document(&self) -> &SharedDocument {
        match self {
            LifecycleEvent::Created(document) | LifecycleEvent::GarbageCollected(document) => document,
            LifecycleEvent::LinkedToFile { document, .. }
            | LifecycleEvent::Opened { document, .. }
            | LifecycleEvent::Closed { document, .. }
            | LifecycleEvent::UnlinkingFromFile { document, .. } => document,
        }
    }
}

/// Receives the outcome of [`DocumentManager::get_document`].
pub trait GetDocumentCallback: Send + 'static {
    fn on_document_received(&mut self, document: SharedDocument);

    fn on_uneditable_file_contents_received(&mut self, contents: &FileContents);

    fn on_file_not_found_received(&mut self);

    fn on_error(&mut self, error: &ManagerError);
}

/// Outcome of [`DocumentManager::load_document`].
#[derive(Clone, Debug)]
pub enum DocumentResponse {
    Document(SharedDocument),
    Uneditable(FileContents),
    NotFound,
}

impl DocumentResponse {
    pub fn into_document(self) -> Option<SharedDocument> {
        match self {
            DocumentResponse::Document(document) => Some(document),
            _ => None,
        }
    }
}

struct OneshotCallback(Option<oneshot::Sender<Result<DocumentResponse>>>);

impl OneshotCallback {
    fn send(&mut self, response: Result<DocumentResponse>) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(response);
        }
    }
}

impl GetDocumentCallback for OneshotCallback {
    fn on_document_received(&mut self, document: SharedDocument) {
        self.send(Ok(DocumentResponse::Document(document)));
    }

    fn on_uneditable_file_contents_received(&mut self, contents: &FileContents) {
        self.send(Ok(DocumentResponse::Uneditable(contents.clone())));
    }

    fn on_file_not_found_received(&mut self) {
        self.send(Ok(DocumentResponse::NotFound));
    }

    fn on_error(&mut self, error: &ManagerError) {
        self.send(Err(error.clone()));
    }
}

#[derive(Default)]
struct ManagerState {
    /// Index 0 is the least recently used.
    documents: Vec<SharedDocument>,
    by_session_key: HashMap<String, SharedDocument>,
    keys_by_path: HashMap<String, String>,
    editors: HashMap<EditorId, SharedDocument>,
    outstanding: HashMap<String, Vec<Box<dyn GetDocumentCallback>>>,
}

impl ManagerState {
    fn position(&self, document: &SharedDocument) -> Option<usize> {
        self.documents.iter().position(|d| d.ptr_eq(document))
    }

    fn is_open(&self, document: &SharedDocument) -> bool {
        self.editors.values().any(|d| d.ptr_eq(document))
    }

    fn mark_active(&mut self, document: &SharedDocument) {
        if let Some(index) = self.position(document) {
            if index + 1 != self.documents.len() {
                let document = self.documents.remove(index);
                self.documents.push(document);
            }
        }
    }

    fn resident_for_path(&self, path: &str) -> Option<SharedDocument> {
        let key = self.keys_by_path.get(path)?;
        self.by_session_key.get(key).cloned()
    }
}

struct Inner {
    config: ManagerConfig,
    loader: Arc<dyn DocumentLoader>,
    runtime: Handle,
    state: Mutex<ManagerState>,
    event_tx: broadcast::Sender<LifecycleEvent>,
}

/// Owns the resident documents of one session.
#[derive(Clone)]
pub struct DocumentManager {
    inner: Arc<Inner>,
}

impl DocumentManager {
    /// Create a manager that runs loads on the current Tokio runtime.
    pub fn new(config: ManagerConfig, loader: impl DocumentLoader) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| ManagerError::NoRuntime)?;
        Ok(Self::with_handle(config, Arc::new(loader), runtime))
    }

    pub fn with_handle(config: ManagerConfig, loader: Arc<dyn DocumentLoader>, runtime: Handle) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                loader,
                runtime,
                state: Mutex::new(ManagerState::default()),
                event_tx,
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Resolve `path` to a document.
    ///
    /// A resident document is handed to `callback` before this returns.
    /// Otherwise a load is started (or joined, if one for `path` is already
    /// in flight) and `callback` runs when it completes.
    pub fn get_document(&self, path: &str, callback: impl GetDocumentCallback) {
        let mut callback: Box<dyn GetDocumentCallback> = Box::new(callback);
        let mut state = self.inner.state.lock();

        if let Some(document) = state.resident_for_path(path) {
            state.mark_active(&document);
            drop(state);
            trace!(path, document = %document.id(), "Serving resident document");
            callback.on_document_received(document);
            return;
        }

        if let Some(waiting) = state.outstanding.get_mut(path) {
            trace!(path, "Joining load already in flight");
            waiting.push(callback);
            return;
        }

        state.outstanding.insert(path.to_string(), vec![callback]);
        drop(state);
        self.spawn_load(path.to_string());
    }

    /// [`get_document`](Self::get_document) as a future.
    pub async fn load_document(&self, path: &str) -> Result<DocumentResponse> {
        let (tx, rx) = oneshot::channel();
        self.get_document(path, OneshotCallback(Some(tx)));
        rx.await.map_err(|_| ManagerError::Abandoned)?
    }

    /// Number of paths with a load in flight.
    pub fn pending_load_count(&self) -> usize {
        self.inner.state.lock().outstanding.len()
    }

    /// Show `document` in `editor`, closing whatever it showed before.
    pub fn attach_to_editor(&self, document: &SharedDocument, editor: EditorId) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.position(document).is_none() {
            return Err(ManagerError::UnknownDocument);
        }

        if let Some(previous) = state.editors.get(&editor).cloned() {
            if previous.ptr_eq(document) {
                state.mark_active(document);
                return Ok(());
            }
            self.inner.detach_locked(&mut state, editor, &previous)?;
        }

        state.editors.insert(editor, document.clone());
        state.mark_active(document);
        debug!(document = %document.id(), %editor, "Document opened");
        self.inner.emit(LifecycleEvent::Opened {
            document: document.clone(),
            editor,
        });
        Ok(())
    }

    /// Close whatever `editor` shows. Line tags and anchors of the closed
    /// document are cleared once no editor shows it.
    pub fn detach_from_editor(&self, editor: EditorId) -> Result<Option<SharedDocument>> {
        let mut state = self.inner.state.lock();
        let Some(document) = state.editors.get(&editor).cloned() else {
            return Ok(None);
        };
        self.inner.detach_locked(&mut state, editor, &document)?;
        Ok(Some(document))
    }

    pub fn editor_document(&self, editor: EditorId) -> Option<SharedDocument> {
        self.inner.state.lock().editors.get(&editor).cloned()
    }

    pub fn is_open(&self, document: &SharedDocument) -> bool {
        self.inner.state.lock().is_open(document)
    }

    pub fn document_by_file_edit_session_key(&self, key: &str) -> Option<SharedDocument> {
        self.inner.state.lock().by_session_key.get(key).cloned()
    }

    pub fn document_by_id(&self, id: DocumentId) -> Option<SharedDocument> {
        self.inner
            .state
            .lock()
            .documents
            .iter()
            .find(|d| d.id() == id)
            .cloned()
    }

    /// Snapshot of the resident documents, least recently used first.
    pub fn documents(&self) -> Vec<SharedDocument> {
        self.inner.state.lock().documents.clone()
    }

    pub fn document_count(&self) -> usize {
        self.inner.state.lock().documents.len()
    }

    /// Documents shown in editors, ordered by editor.
    pub fn open_documents(&self) -> Vec<(SharedDocument, EditorId)> {
        let state = self.inner.state.lock();
        let mut open: Vec<_> = state
            .editors
            .iter()
            .map(|(editor, document)| (document.clone(), *editor))
            .collect();
        open.sort_by_key(|(_, editor)| *editor);
        open
    }

    pub fn most_recent_document(&self) -> Option<SharedDocument> {
        self.inner.state.lock().documents.last().cloned()
    }

    /// Detach `document` from its file edit session. The document stays
    /// resident.
    pub fn unlink_from_file(&self, document: &SharedDocument) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.position(document).is_none() {
            return Err(ManagerError::UnknownDocument);
        }
        if !DocumentMetadata::is_linked_to_file(&*document.try_read()?) {
            return Err(ManagerError::NotLinkedToFile);
        }
        self.inner.unlink_locked(&mut state, document)
    }

    /// Drop `document` from the cache, unlinking it first if needed.
    pub fn garbage_collect_document(&self, document: &SharedDocument) -> Result<()> {
        let mut state = self.inner.state.lock();
        self.inner.garbage_collect_locked(&mut state, document)
    }

    /// Follow a file rename. Returns whether a resident document moved.
    pub fn handle_path_moved(&self, old_path: &str, new_path: &str) -> Result<bool> {
        let mut state = self.inner.state.lock();
        let Some(key) = state.keys_by_path.get(old_path).cloned() else {
            return Ok(false);
        };
        let Some(document) = state.by_session_key.get(&key).cloned() else {
            return Ok(false);
        };
        document.edit(|doc| DocumentMetadata::put_path(doc, new_path))?;
        debug!(document = %document.id(), old_path, new_path, "Document path moved");
        state.keys_by_path.remove(old_path);
        state.keys_by_path.insert(new_path.to_string(), key);
        Ok(true)
    }

    /// React to files or directories disappearing. Open documents under a
    /// removed path are unlinked; the rest are collected. A document that is
    /// locked elsewhere is left alone.
    pub fn handle_paths_removed(&self, removed: &[&str]) {
        let mut state = self.inner.state.lock();
        let documents = state.documents.clone();
        for document in documents {
            let path = match document.try_read() {
                Ok(doc) if DocumentMetadata::is_linked_to_file(&doc) => {
                    DocumentMetadata::path(&doc).map(str::to_string)
                }
                Ok(_) => continue,
                Err(err) => {
                    warn!(document = %document.id(), error = %err, "Skipping busy document");
                    continue;
                }
            };
            let Some(path) = path else {
                continue;
            };
            if !removed.iter().any(|root| path_contains(root, &path)) {
                continue;
            }
            let outcome = if state.is_open(&document) {
                self.inner.unlink_locked(&mut state, &document)
            } else {
                self.inner.garbage_collect_locked(&mut state, &document)
            };
            if let Err(err) = outcome {
                warn!(document = %document.id(), path = %path, error = %err, "Removed file left resident");
            }
        }
    }

    /// Evict every document, oldest first, and abandon loads in flight.
    /// Documents locked elsewhere stay resident.
    pub fn cleanup(&self) {
        let mut state = self.inner.state.lock();
        state.outstanding.clear();
        let documents = state.documents.clone();
        for document in documents {
            if let Err(err) = self.inner.garbage_collect_locked(&mut state, &document) {
                warn!(document = %document.id(), error = %err, "Could not evict document");
            }
        }
        info!(remaining = state.documents.len(), "Document manager cleaned up");
    }

    fn spawn_load(&self, path: String) {
        let inner = self.inner.clone();
        debug!(path = %path, "Loading file contents");
        self.inner.runtime.spawn(async move {
            let response = inner.loader.load(&path).await;
            inner.handle_load_response(&path, response);
        });
    }
}

impl fmt::Debug for DocumentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DocumentManager")
            .field("config", &self.inner.config)
            .field("documents", &state.documents.len())
            .field("open", &state.editors.len())
            .field("pending_loads", &state.outstanding.len())
            .finish()
    }
}

impl Inner {
    fn emit(&self, event: LifecycleEvent) {
        let _ = self.event_tx.send(event);
    }

    fn handle_load_response(&self, path: &str, response: Result<LoadResponse>) {
        let Some(callbacks) = self.state.lock().outstanding.remove(path) else {
            debug!(path, "Dropping load response nobody is waiting for");
            return;
        };

        match response {
            Err(err) => {
                error!(path, error = %err, "Failed to retrieve file contents");
                for mut callback in callbacks {
                    callback.on_error(&err);
                }
            }
            Ok(LoadResponse::NotFound) => {
                warn!(path, "Tried to load a missing file");
                for mut callback in callbacks {
                    callback.on_file_not_found_received();
                }
            }
            Ok(LoadResponse::Uneditable(contents)) => {
                for mut callback in callbacks {
                    callback.on_uneditable_file_contents_received(&contents);
                }
            }
            Ok(LoadResponse::Editable(contents)) => {
                let document = self.handle_editable(contents);
                for mut callback in callbacks {
                    callback.on_document_received(document.clone());
                }
            }
        }
    }

    fn handle_editable(&self, contents: FileContents) -> SharedDocument {
        let mut state = self.state.lock();

        // A load for another path may have produced this session already.
        let existing = contents
            .file_edit_session_key
            .as_ref()
            .and_then(|key| state.by_session_key.get(key).cloned());
        if let Some(document) = existing {
            if let Some(key) = &contents.file_edit_session_key {
                state.keys_by_path.insert(contents.path.clone(), key.clone());
            }
            drop(state);
            DocumentMetadata::put_path(&mut document.write(), contents.path);
            return document;
        }

        let document = self.create_document(&mut state, contents);
        self.try_garbage_collect(&mut state);
        document
    }

    fn create_document(&self, state: &mut ManagerState, contents: FileContents) -> SharedDocument {
        let linked = contents.file_edit_session_key.is_some();
        let mut document = Document::from_text(&contents.contents);
        DocumentMetadata::put_linked_to_file(&mut document, linked);
        DocumentMetadata::put_path(&mut document, contents.path.clone());
        DocumentMetadata::put_file_edit_session_key(&mut document, contents.file_edit_session_key.clone());
        DocumentMetadata::put_base_revision(&mut document, contents.base_revision);
        DocumentMetadata::put_conflicts(&mut document, contents.conflicts.clone());

        let document = SharedDocument::new(document);
        state.documents.push(document.clone());
        if let Some(key) = &contents.file_edit_session_key {
            state.by_session_key.insert(key.clone(), document.clone());
            state.keys_by_path.insert(contents.path.clone(), key.clone());
        }

        info!(document = %document.id(), path = %contents.path, linked, "Created document");
        self.emit(LifecycleEvent::Created(document.clone()));
        if linked {
            self.emit(LifecycleEvent::LinkedToFile {
                document: document.clone(),
                contents,
            });
        }
        document
    }

    fn try_garbage_collect(&self, state: &mut ManagerState) {
        let mut excess = state
            .documents
            .len()
            .saturating_sub(self.config.max_cached_documents);
        let mut index = 0;
        while excess > 0 && index < state.documents.len() {
            let document = state.documents[index].clone();
            if state.is_open(&document) {
                index += 1;
                continue;
            }
            match self.garbage_collect_locked(state, &document) {
                Ok(()) => excess -= 1,
                Err(err) => {
                    warn!(document = %document.id(), error = %err, "Could not evict document");
                    index += 1;
                }
            }
        }
    }

    fn garbage_collect_locked(&self, state: &mut ManagerState, document: &SharedDocument) -> Result<()> {
        let index = state.position(document).ok_or(ManagerError::UnknownDocument)?;
        let linked = DocumentMetadata::is_linked_to_file(&*document.try_read()?);
        if linked {
            self.unlink_locked(state, document)?;
        }
        state.documents.remove(index);
        state.editors.retain(|_, shown| !shown.ptr_eq(document));

        debug!(document = %document.id(), "Document garbage collected");
        self.emit(LifecycleEvent::GarbageCollected(document.clone()));
        Ok(())
    }

    fn unlink_locked(&self, state: &mut ManagerState, document: &SharedDocument) -> Result<()> {
        let (key, path) = document.edit(|doc| {
            let key = DocumentMetadata::file_edit_session_key(doc).map(str::to_string);
            let path = DocumentMetadata::path(doc).map(str::to_string);
            DocumentMetadata::put_linked_to_file(doc, false);
            (key, path)
        })?;
        self.emit(LifecycleEvent::UnlinkingFromFile {
            document: document.clone(),
            file_edit_session_key: key.clone(),
            path,
        });

        if let Some(key) = &key {
            state.by_session_key.remove(key);
            state.keys_by_path.retain(|_, k| k != key);
        }
        Ok(())
    }

    fn detach_locked(&self, state: &mut ManagerState, editor: EditorId, document: &SharedDocument) -> Result<()> {
        let still_shown = state
            .editors
            .iter()
            .any(|(other, shown)| *other != editor && shown.ptr_eq(document));
        if !still_shown {
            document.edit(Document::clear_transient_state)?;
        }
        state.editors.remove(&editor);
        debug!(document = %document.id(), %editor, "Document closed");
        self.emit(LifecycleEvent::Closed {
            document: document.clone(),
            editor,
        });
        Ok(())
    }
}

/// Whether `path` is `root` or lies beneath it.
fn path_contains(root: &str, path: &str) -> bool {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return true;
    }
    path == root || path.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
}
