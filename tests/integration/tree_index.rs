use crate::support::{folder, harness, write};
use chrono::Utc;
use doctree::store::{DocumentRecord, MemoryMetadataStore, MetadataStore};
use doctree::{DocumentError, TreeIndex, VersionPolicy, ROOT_ID};
use proptest::prelude::*;
use proptest::sample::Index;

#[test]
fn nested_paths_resolve_to_their_nodes() {
    let h = harness(VersionPolicy::default());
    let docs = folder(&h.store, ROOT_ID, "docs");
    let img = folder(&h.store, docs.id, "img");
    let logo = write(&h.store, img.id, "logo.svg", "<svg/>");

    assert_eq!(h.store.path_of(logo.id).unwrap(), "/docs/img/logo.svg");
    assert_eq!(h.store.document_from_path("/docs/img/logo.svg").unwrap().id, logo.id);
    assert_eq!(h.store.document_from_path("/docs/img/").unwrap().id, img.id);
    assert_eq!(h.store.document_from_path("/").unwrap().id, ROOT_ID);
    assert!(h.store.document_from_path("/docs/missing").is_none());
    assert!(h.store.document_from_path("/docs/img/logo.svg/deeper").is_none());
}

#[test]
fn reload_rebuilds_a_connected_tree() {
    let metadata = MemoryMetadataStore::new();
    let now = Utc::now();
    let a = metadata.insert(&DocumentRecord::folder(ROOT_ID, "a", now)).unwrap();
    let b = metadata.insert(&DocumentRecord::folder(a, "b", now)).unwrap();
    metadata
        .insert(&DocumentRecord::file(b, "c.txt", "text/plain", true, 0, now))
        .unwrap();

    let index = TreeIndex::initialize(&metadata, true).unwrap();
    assert_eq!(index.len(), 4);
    for node in index.nodes() {
        let mut current = node.clone();
        let mut hops = 0;
        while let Some(parent_id) = current.parent_id {
            current = index.resolve_by_id(parent_id).unwrap().clone();
            hops += 1;
            assert!(hops <= index.len());
        }
        assert!(current.is_root());
    }
}

#[test]
fn orphaned_record_is_reported_as_corrupt() {
    let now = Utc::now();
    let mut orphan = DocumentRecord::file(99, "lost.txt", "text/plain", true, 0, now);
    orphan.id = 5;
    let result = TreeIndex::build(vec![DocumentRecord::root(now), orphan]);
    assert!(matches!(result, Err(DocumentError::Corrupt(_))));

    let result = TreeIndex::build(Vec::new());
    assert!(matches!(result, Err(DocumentError::Corrupt(_))));
}

#[test]
fn parent_cycle_is_reported_as_corrupt() {
    let now = Utc::now();
    let mut a = DocumentRecord::folder(3, "a", now);
    a.id = 2;
    let mut b = DocumentRecord::folder(2, "b", now);
    b.id = 3;
    let result = TreeIndex::build(vec![DocumentRecord::root(now), a, b]);
    assert!(matches!(result, Err(DocumentError::Corrupt(_))));
}

#[test]
fn fuzzy_search_ignores_case_and_hides_versions_by_default() {
    let h = harness(VersionPolicy::default());
    let docs = folder(&h.store, ROOT_ID, "Docs");
    write(&h.store, docs.id, "ReadMe.txt", "v0");
    write(&h.store, docs.id, "ReadMe.txt", "v1");

    let found: Vec<String> = h
        .store
        .list_by_fuzzy_path("readme")
        .map(|node| node.name)
        .collect();
    assert_eq!(found, vec!["ReadMe.txt".to_string()]);

    let mut all: Vec<String> = h.store.list_by_fuzzy_path("DOCS").map(|n| n.name).collect();
    all.sort();
    assert_eq!(all, vec!["Docs".to_string(), "ReadMe.txt".to_string()]);
}

#[test]
fn fuzzy_search_lists_versions_when_enabled() {
    let h = harness(VersionPolicy::all_visible());
    write(&h.store, ROOT_ID, "notes.txt", "v0");
    write(&h.store, ROOT_ID, "notes.txt", "v1");

    let mut found: Vec<String> = h.store.list_by_fuzzy_path("notes").map(|n| n.name).collect();
    found.sort();
    assert_eq!(found, vec!["notes.txt".to_string(), "notes.txt_1".to_string()]);
}

#[test]
fn hidden_versions_stay_out_of_the_index() {
    let h = harness(VersionPolicy::hidden());
    let live = write(&h.store, ROOT_ID, "a.txt", "v0");
    write(&h.store, ROOT_ID, "a.txt", "v1");

    assert_eq!(h.store.node_count(), 2);
    assert!(h.store.document_from_path("/a.txt_1").is_none());

    let versions = h.store.versions_of(live.id).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(h.store.content(versions[0].id).unwrap(), b"v0".to_vec());

    h.store.reload().unwrap();
    assert_eq!(h.store.node_count(), 2);
    assert_eq!(h.metadata.len(), 3);
}

proptest! {
    #[test]
    fn every_node_round_trips_through_its_path(
        ops in proptest::collection::vec((any::<Index>(), "[a-z]{1,4}", any::<bool>()), 1..40)
    ) {
        let h = harness(VersionPolicy::all_visible());
        let mut folders = vec![ROOT_ID];
        for (parent, name, is_folder) in ops {
            let parent_id = *parent.get(&folders);
            if is_folder {
                if let Ok(node) = h.store.create_folder(parent_id, &name) {
                    folders.push(node.id);
                }
            } else {
                let _ = h.store.store_document(parent_id, &format!("{}.txt", name), name.as_bytes());
            }
        }

        let nodes: Vec<_> = h.store.list_by_fuzzy_path("").collect();
        prop_assert_eq!(nodes.len() + 1, h.store.node_count());
        for node in nodes {
            let path = h.store.path_of(node.id).unwrap();
            let resolved = h.store.document_from_path(&path).unwrap();
            prop_assert_eq!(resolved.id, node.id);
        }
    }
}
