//! Manager bookkeeping stored in a document's tag map.

use crate::loader::ConflictChunk;
use quire_document::Document;

const LINKED_TO_FILE: &str = "quire.manager.linked-to-file";
const PATH: &str = "quire.manager.path";
const FILE_EDIT_SESSION_KEY: &str = "quire.manager.file-edit-session-key";
const BASE_REVISION: &str = "quire.manager.base-revision";
const CONFLICTS: &str = "quire.manager.conflicts";

/// Typed accessors over the manager's document tags.
pub struct DocumentMetadata;

impl DocumentMetadata {
    pub fn is_linked_to_file(document: &Document) -> bool {
        document.tags().get::<bool>(LINKED_TO_FILE).copied().unwrap_or(false)
    }

    pub fn put_linked_to_file(document: &mut Document, linked: bool) {
        document.tags_mut().put(LINKED_TO_FILE, linked);
    }

    pub fn path(document: &Document) -> Option<&str> {
        document.tags().get::<String>(PATH).map(String::as_str)
    }

    pub fn put_path(document: &mut Document, path: impl Into<String>) {
        document.tags_mut().put(PATH, path.into());
    }

    pub fn file_edit_session_key(document: &Document) -> Option<&str> {
        document
            .tags()
            .get::<Option<String>>(FILE_EDIT_SESSION_KEY)
            .and_then(|key| key.as_deref())
    }

    pub fn put_file_edit_session_key(document: &mut Document, key: Option<String>) {
        document.tags_mut().put(FILE_EDIT_SESSION_KEY, key);
    }

    pub fn base_revision(document: &Document) -> u64 {
        document.tags().get::<u64>(BASE_REVISION).copied().unwrap_or(0)
    }

    pub fn put_base_revision(document: &mut Document, revision: u64) {
        document.tags_mut().put(BASE_REVISION, revision);
    }

    pub fn conflicts(document: &Document) -> &[ConflictChunk] {
        document
            .tags()
            .get::<Vec<ConflictChunk>>(CONFLICTS)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn put_conflicts(document: &mut Document, conflicts: Vec<ConflictChunk>) {
        document.tags_mut().put(CONFLICTS, conflicts);
    }

    pub fn has_unresolved_conflicts(document: &Document) -> bool {
        Self::conflicts(document).iter().any(|chunk| !chunk.resolved)
    }
}
