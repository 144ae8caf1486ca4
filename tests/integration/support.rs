use doctree::classify::ExtensionClassifier;
use doctree::store::{MemoryContentStore, MemoryMetadataStore};
use doctree::{DocumentId, DocumentNode, VersionPolicy, VersionedDocumentStore};
use std::sync::Arc;

/// A store over in-memory backends the test can still reach into
pub struct Harness {
    pub store: VersionedDocumentStore,
    pub metadata: Arc<MemoryMetadataStore>,
    pub content: Arc<MemoryContentStore>,
}

pub fn harness(policy: VersionPolicy) -> Harness {
    let metadata = Arc::new(MemoryMetadataStore::new());
    let content = Arc::new(MemoryContentStore::new());
    let store = VersionedDocumentStore::open(
        metadata.clone(),
        content.clone(),
        Arc::new(ExtensionClassifier::new()),
        policy,
    )
    .unwrap();
    Harness {
        store,
        metadata,
        content,
    }
}

pub fn folder(store: &VersionedDocumentStore, parent: DocumentId, name: &str) -> DocumentNode {
    store.create_folder(parent, name).unwrap()
}

pub fn write(
    store: &VersionedDocumentStore,
    parent: DocumentId,
    name: &str,
    text: &str,
) -> DocumentNode {
    store.store_document(parent, name, text.as_bytes()).unwrap()
}

pub fn text(store: &VersionedDocumentStore, id: DocumentId) -> String {
    String::from_utf8(store.content(id).unwrap()).unwrap()
}

/// Every node below `id` as (path relative to `id`, is_folder, is_version, content), sorted
pub fn snapshot(
    store: &VersionedDocumentStore,
    id: DocumentId,
    include_versions: bool,
) -> Vec<(String, bool, bool, Vec<u8>)> {
    let base = store.path_of(id).unwrap();
    let mut out = Vec::new();
    collect(store, id, &base, include_versions, &mut out);
    out.sort();
    out
}

fn collect(
    store: &VersionedDocumentStore,
    id: DocumentId,
    base: &str,
    include_versions: bool,
    out: &mut Vec<(String, bool, bool, Vec<u8>)>,
) {
    for child in store.children(id).unwrap() {
        if child.is_version && !include_versions {
            continue;
        }
        let path = store.path_of(child.id).unwrap();
        let relative = path
            .strip_prefix(base.trim_end_matches('/'))
            .unwrap()
            .to_string();
        let data = if child.is_folder {
            Vec::new()
        } else {
            store.content(child.id).unwrap()
        };
        out.push((relative, child.is_folder, child.is_version, data));
        if child.is_folder {
            collect(store, child.id, base, include_versions, out);
        }
    }
}
