use doctree::classify::ExtensionClassifier;
use doctree::store::{MetadataStore, SledStores};
use doctree::{VersionPolicy, VersionedDocumentStore, ROOT_ID};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn open(path: &Path, policy: VersionPolicy) -> (VersionedDocumentStore, SledStores) {
    let stores = SledStores::open(path).unwrap();
    let store = VersionedDocumentStore::open(
        stores.metadata.clone(),
        stores.content.clone(),
        Arc::new(ExtensionClassifier::new()),
        policy,
    )
    .unwrap();
    (store, stores)
}

#[test]
fn tree_and_versions_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store");

    let (readme_id, docs_id) = {
        let (store, stores) = open(&path, VersionPolicy::default());
        let docs = store.create_folder(ROOT_ID, "docs").unwrap();
        let readme = store.store_document(docs.id, "readme.txt", b"v0").unwrap();
        store.store_document(docs.id, "readme.txt", b"v1").unwrap();
        store.store_document(docs.id, "readme.txt", b"v2").unwrap();
        stores.flush().unwrap();
        (readme.id, docs.id)
    };

    let (store, stores) = open(&path, VersionPolicy::default());
    let readme = store.document_from_path("/docs/readme.txt").unwrap();
    assert_eq!(readme.id, readme_id);
    assert_eq!(readme.parent_id, Some(docs_id));
    assert_eq!(store.content(readme.id).unwrap(), b"v2".to_vec());

    let versions = store.versions_of(readme.id).unwrap();
    let contents: Vec<Vec<u8>> = versions
        .iter()
        .map(|v| store.content(v.id).unwrap())
        .collect();
    assert_eq!(contents, vec![b"v0".to_vec(), b"v1".to_vec()]);
    assert_eq!(store.node_count(), 5);
    assert_eq!(stores.metadata.find_all().unwrap().len(), 5);
}

#[test]
fn ids_stay_unique_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store");

    let first = {
        let (store, stores) = open(&path, VersionPolicy::default());
        let node = store.create_folder(ROOT_ID, "a").unwrap();
        stores.flush().unwrap();
        node.id
    };
    let (store, _stores) = open(&path, VersionPolicy::default());
    let second = store.create_folder(ROOT_ID, "b").unwrap();
    assert_ne!(first, second.id);
    assert_ne!(second.id, ROOT_ID);
    assert_eq!(store.children(ROOT_ID).unwrap().len(), 2);
}

#[test]
fn hidden_versions_are_still_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store");
    {
        let (store, stores) = open(&path, VersionPolicy::hidden());
        store.store_document(ROOT_ID, "a.txt", b"v0").unwrap();
        store.store_document(ROOT_ID, "a.txt", b"v1").unwrap();
        stores.flush().unwrap();
    }

    let (store, _stores) = open(&path, VersionPolicy::default());
    let version = store.document_from_path("/a.txt_1").unwrap();
    assert!(version.is_version);
    assert_eq!(store.content(version.id).unwrap(), b"v0".to_vec());
}
