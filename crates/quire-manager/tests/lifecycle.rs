//! Cache eviction and lifecycle notifications.

use quire_document::SharedDocument;
use quire_manager::{
    DocumentManager, DocumentMetadata, EditorId, FileContents, InMemoryLoader, LifecycleEvent,
    ManagerConfigBuilder, ManagerError,
};
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

fn manager(count: usize) -> DocumentManager {
    let loader = InMemoryLoader::new();
    for i in 0..count {
        loader.insert(
            FileContents::new(format!("/file{i}.txt"), format!("contents of {i}\n"))
                .with_session_key(format!("session-{i}")),
        );
    }
    let config = ManagerConfigBuilder::new().max_cached_documents(4).build();
    assert_ok!(DocumentManager::new(config, loader))
}

async fn load(manager: &DocumentManager, i: usize) -> SharedDocument {
    let response = assert_ok!(manager.load_document(&format!("/file{i}.txt")).await);
    response.into_document().expect("editable file")
}

fn drain(events: &mut broadcast::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn contains(documents: &[SharedDocument], document: &SharedDocument) -> bool {
    documents.iter().any(|d| d.ptr_eq(document))
}

#[tokio::test]
async fn test_fifth_document_evicts_least_recently_used() {
    let manager = manager(5);
    let mut docs = Vec::new();
    for i in 0..4 {
        docs.push(load(&manager, i).await);
    }
    assert_eq!(manager.document_count(), 4);

    let mut events = manager.subscribe();
    let fifth = load(&manager, 4).await;

    let resident = manager.documents();
    assert_eq!(resident.len(), 4);
    assert!(!contains(&resident, &docs[0]));
    assert!(contains(&resident, &fifth));
    assert!(manager.document_by_file_edit_session_key("session-0").is_none());
    assert!(!DocumentMetadata::is_linked_to_file(&docs[0].read()));

    let events = drain(&mut events);
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], LifecycleEvent::Created(d) if d.ptr_eq(&fifth)));
    assert!(matches!(&events[1], LifecycleEvent::LinkedToFile { document, contents }
        if document.ptr_eq(&fifth) && contents.path == "/file4.txt"));
    assert!(matches!(&events[2], LifecycleEvent::UnlinkingFromFile { document, file_edit_session_key, path }
        if document.ptr_eq(&docs[0])
            && file_edit_session_key.as_deref() == Some("session-0")
            && path.as_deref() == Some("/file0.txt")));
    assert!(matches!(&events[3], LifecycleEvent::GarbageCollected(d) if d.ptr_eq(&docs[0])));
}

#[tokio::test]
async fn test_open_document_is_never_evicted() {
    let manager = manager(5);
    let mut docs = Vec::new();
    for i in 0..4 {
        docs.push(load(&manager, i).await);
    }
    assert_ok!(manager.attach_to_editor(&docs[0], EditorId(7)));
    // Touching the others makes document 0 the least recently used again.
    for doc in &docs[1..] {
        assert_ok!(manager.attach_to_editor(doc, EditorId(8)));
    }
    assert_ok!(manager.detach_from_editor(EditorId(8)));
    assert!(manager.documents()[0].ptr_eq(&docs[0]));

    load(&manager, 4).await;
    let resident = manager.documents();
    assert_eq!(resident.len(), 4);
    assert!(contains(&resident, &docs[0]));
    assert!(!contains(&resident, &docs[1]));
    assert_eq!(manager.open_documents().len(), 1);
    assert_eq!(manager.open_documents()[0].1, EditorId(7));
}

#[tokio::test]
async fn test_locked_document_is_skipped_by_eviction() {
    let manager = manager(5);
    let mut docs = Vec::new();
    for i in 0..4 {
        docs.push(load(&manager, i).await);
    }

    let reader = docs[0].read();
    load(&manager, 4).await;
    drop(reader);

    let resident = manager.documents();
    assert_eq!(resident.len(), 4);
    assert!(contains(&resident, &docs[0]));
    assert!(!contains(&resident, &docs[1]));
    assert!(DocumentMetadata::is_linked_to_file(&docs[0].read()));
    assert!(manager.document_by_file_edit_session_key("session-0").is_some());
}

#[tokio::test]
async fn test_touching_a_document_protects_it() {
    let manager = manager(5);
    let mut docs = Vec::new();
    for i in 0..4 {
        docs.push(load(&manager, i).await);
    }
    // Served from the cache, which marks it most recently used.
    let again = load(&manager, 0).await;
    assert!(again.ptr_eq(&docs[0]));
    assert!(manager.most_recent_document().unwrap().ptr_eq(&docs[0]));

    load(&manager, 4).await;
    let resident = manager.documents();
    assert!(contains(&resident, &docs[0]));
    assert!(!contains(&resident, &docs[1]));
}

#[tokio::test]
async fn test_unlink_then_collect() {
    let manager = manager(1);
    let doc = load(&manager, 0).await;
    let mut events = manager.subscribe();

    assert_ok!(manager.unlink_from_file(&doc));
    assert_eq!(assert_err!(manager.unlink_from_file(&doc)), ManagerError::NotLinkedToFile);
    assert!(manager.document_by_file_edit_session_key("session-0").is_none());
    assert_eq!(manager.document_count(), 1);

    assert_ok!(manager.garbage_collect_document(&doc));
    assert_eq!(manager.document_count(), 0);

    let events = drain(&mut events);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], LifecycleEvent::UnlinkingFromFile { .. }));
    assert!(matches!(&events[1], LifecycleEvent::GarbageCollected(_)));
}

#[tokio::test]
async fn test_cleanup_collects_everything_in_order() {
    let manager = manager(3);
    let mut docs = Vec::new();
    for i in 0..3 {
        docs.push(load(&manager, i).await);
    }
    assert_ok!(manager.attach_to_editor(&docs[1], EditorId(1)));
    let mut events = manager.subscribe();

    manager.cleanup();
    assert_eq!(manager.document_count(), 0);
    assert!(manager.open_documents().is_empty());

    let collected: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            LifecycleEvent::GarbageCollected(doc) => Some(doc),
            _ => None,
        })
        .collect();
    assert_eq!(collected.len(), 3);
    assert!(collected[0].ptr_eq(&docs[0]));
    assert!(collected[1].ptr_eq(&docs[2]));
    assert!(collected[2].ptr_eq(&docs[1]));
}

#[tokio::test]
async fn test_document_edits_survive_cache_hits() {
    let manager = manager(1);
    let doc = load(&manager, 0).await;
    assert_ok!(assert_ok!(doc.edit(|d| d.insert_text_at(0, 0, "edited "))));

    let again = load(&manager, 0).await;
    assert_eq!(again.read().text(), "edited contents of 0\n");
}
