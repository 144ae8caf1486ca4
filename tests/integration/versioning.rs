use crate::support::{folder, harness, text, write};
use doctree::{DocumentError, StorageError, VersionPolicy, MAX_VERSIONS, ROOT_ID};
use doctree::store::MetadataStore;

#[test]
fn each_overwrite_adds_a_version_until_the_cap() {
    let h = harness(VersionPolicy::default());
    let docs = folder(&h.store, ROOT_ID, "docs");
    let live = write(&h.store, docs.id, "readme.txt", "v0");

    for k in 1..=7u32 {
        let node = write(&h.store, docs.id, "readme.txt", &format!("v{}", k));
        assert_eq!(node.id, live.id, "live id must survive overwrites");
        assert_eq!(text(&h.store, live.id), format!("v{}", k));

        let versions = h.store.versions_of(live.id).unwrap();
        assert_eq!(versions.len() as u32, k.min(MAX_VERSIONS));
        if k <= MAX_VERSIONS {
            for (i, version) in versions.iter().enumerate() {
                assert_eq!(version.name, format!("readme.txt_{}", i + 1));
                assert!(version.is_version);
                assert_eq!(text(&h.store, version.id), format!("v{}", i));
            }
        }
    }
}

#[test]
fn sixth_overwrite_recycles_the_oldest_slot() {
    let h = harness(VersionPolicy::default());
    let live = write(&h.store, ROOT_ID, "a.txt", "v0");
    for k in 1..=5 {
        write(&h.store, ROOT_ID, "a.txt", &format!("v{}", k));
    }
    let before = h.store.versions_of(live.id).unwrap();
    assert_eq!(before.len(), 5);
    let oldest = before.iter().min_by_key(|v| v.modified_at).unwrap().clone();
    assert_eq!(oldest.name, "a.txt_1");

    write(&h.store, ROOT_ID, "a.txt", "v6");

    let after = h.store.versions_of(live.id).unwrap();
    assert_eq!(after.len(), 5);
    let before_ids: Vec<_> = before.iter().map(|v| v.id).collect();
    let after_ids: Vec<_> = after.iter().map(|v| v.id).collect();
    assert_eq!(before_ids, after_ids, "recycling reuses existing records");

    let recycled = after.iter().find(|v| v.id == oldest.id).unwrap();
    assert_eq!(recycled.name, "a.txt_1");
    assert_eq!(text(&h.store, recycled.id), "v5");
    assert!(recycled.modified_at > oldest.modified_at);
    assert_eq!(text(&h.store, live.id), "v6");

    // The next overwrite goes to the slot that is now oldest
    write(&h.store, ROOT_ID, "a.txt", "v7");
    let slot_two = h.store.document_from_path("/a.txt_2").unwrap();
    assert_eq!(text(&h.store, slot_two.id), "v6");
}

#[test]
fn versions_are_siblings_of_the_live_file() {
    let h = harness(VersionPolicy::default());
    let docs = folder(&h.store, ROOT_ID, "docs");
    write(&h.store, docs.id, "readme.txt", "v0");
    write(&h.store, docs.id, "readme.txt", "v1");

    let version = h.store.document_from_path("/docs/readme.txt_1").unwrap();
    assert_eq!(version.parent_id, Some(docs.id));
    assert!(version.is_version);
    assert_eq!(h.store.children(docs.id).unwrap().len(), 2);
}

#[test]
fn unsupported_type_leaves_no_trace() {
    let h = harness(VersionPolicy::default());
    let records = h.metadata.len();
    let blobs = h.content.len();
    let nodes = h.store.node_count();

    let result = h.store.create_file(ROOT_ID, "photo.png");
    assert!(matches!(
        result,
        Err(DocumentError::UnsupportedType { ref mime_type, .. }) if mime_type == "image/png"
    ));

    assert_eq!(h.metadata.len(), records);
    assert_eq!(h.content.len(), blobs);
    assert_eq!(h.store.node_count(), nodes);
    assert!(h.store.document_from_path("/photo.png").is_none());
}

#[test]
fn create_file_starts_empty_and_text() {
    let h = harness(VersionPolicy::default());
    let node = h.store.create_file(ROOT_ID, "todo.txt").unwrap();
    assert!(node.is_text);
    assert_eq!(node.size, 0);
    assert_eq!(node.mime_type.as_deref(), Some("text/plain"));
    assert!(h.store.content(node.id).unwrap().is_empty());
    assert!(h.store.versions_of(node.id).unwrap().is_empty());
}

#[test]
fn binary_content_is_stored_but_flagged() {
    let h = harness(VersionPolicy::default());
    let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0];
    let node = h.store.store_document(ROOT_ID, "pixel.png", &png).unwrap();
    assert!(!node.is_text);
    assert_eq!(node.size, png.len() as u64);
    assert_eq!(h.store.content(node.id).unwrap(), png.to_vec());
}

#[test]
fn name_conflicts_are_rejected() {
    let h = harness(VersionPolicy::default());
    folder(&h.store, ROOT_ID, "docs");
    write(&h.store, ROOT_ID, "a.txt", "v0");
    write(&h.store, ROOT_ID, "a.txt", "v1");

    assert!(matches!(
        h.store.create_folder(ROOT_ID, "docs"),
        Err(DocumentError::NameConflict { .. })
    ));
    assert!(matches!(
        h.store.create_file(ROOT_ID, "a.txt"),
        Err(DocumentError::NameConflict { .. })
    ));
    assert!(matches!(
        h.store.store_document(ROOT_ID, "a.txt_1", b"direct"),
        Err(DocumentError::NameConflict { .. })
    ));
    assert!(matches!(
        h.store.store_document(ROOT_ID, "docs", b"x"),
        Err(DocumentError::NotAFolder(_))
    ));
}

#[test]
fn hidden_version_names_still_conflict() {
    let h = harness(VersionPolicy::hidden());
    write(&h.store, ROOT_ID, "a.txt", "v0");
    write(&h.store, ROOT_ID, "a.txt", "v1");
    assert!(matches!(
        h.store.store_document(ROOT_ID, "a.txt_1", b"direct"),
        Err(DocumentError::NameConflict { .. })
    ));
}

#[test]
fn live_file_holding_the_next_slot_name_does_not_block_overwrites() {
    let h = harness(VersionPolicy::default());
    let original = write(&h.store, ROOT_ID, "a.txt", "v0");
    let squatter = write(&h.store, ROOT_ID, "a.txt_1", "unrelated");

    for n in 1..=7 {
        write(&h.store, ROOT_ID, "a.txt", &format!("v{}", n));
    }

    let versions = h.store.versions_of(original.id).unwrap();
    let names: Vec<&str> = versions.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt_2", "a.txt_3", "a.txt_4", "a.txt_5"]);
    assert_eq!(text(&h.store, original.id), "v7");
    assert_eq!(text(&h.store, squatter.id), "unrelated");
    assert!(!h.store.document_by_id(squatter.id).unwrap().is_version);
}

#[test]
fn restored_versions_join_the_rotation() {
    let h = harness(VersionPolicy::default());
    let live = write(&h.store, ROOT_ID, "a.txt", "now");

    let restored = h.store.restore_version(ROOT_ID, "a.txt_3", b"older").unwrap();
    assert!(restored.is_version);
    let again = h.store.restore_version(ROOT_ID, "a.txt_3", b"replaced").unwrap();
    assert_eq!(again.id, restored.id);
    assert_eq!(text(&h.store, restored.id), "replaced");

    write(&h.store, ROOT_ID, "a.txt", "next");
    let names: Vec<String> = h
        .store
        .versions_of(live.id)
        .unwrap()
        .into_iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(names, vec!["a.txt_1", "a.txt_3"]);

    h.store.delete_document(live.id).unwrap();
    assert!(h.store.document_from_path("/a.txt_3").is_none());
    assert!(h.metadata.find_by_id(restored.id).unwrap().is_none());
}

#[test]
fn restoring_a_version_needs_its_live_file() {
    let h = harness(VersionPolicy::default());
    write(&h.store, ROOT_ID, "b.txt_1", "live");
    assert!(matches!(
        h.store.restore_version(ROOT_ID, "a.txt_1", b"x"),
        Err(DocumentError::NotFound(_))
    ));
    assert!(matches!(
        h.store.restore_version(ROOT_ID, "a.txt", b"x"),
        Err(DocumentError::InvalidName(_))
    ));
    write(&h.store, ROOT_ID, "b.txt", "base");
    assert!(matches!(
        h.store.restore_version(ROOT_ID, "b.txt_1", b"x"),
        Err(DocumentError::NameConflict { .. })
    ));
}

#[test]
fn invalid_names_and_parents_are_rejected() {
    let h = harness(VersionPolicy::default());
    let file = write(&h.store, ROOT_ID, "a.txt", "x");
    for name in ["", ".", "..", "a/b"] {
        assert!(matches!(
            h.store.create_folder(ROOT_ID, name),
            Err(DocumentError::InvalidName(_))
        ));
    }
    assert!(matches!(
        h.store.create_folder(file.id, "sub"),
        Err(DocumentError::NotAFolder(_))
    ));
    assert!(matches!(
        h.store.store_document(4242, "x.txt", b"x"),
        Err(DocumentError::NotFound(_))
    ));
    assert!(matches!(
        h.store.create_folder(4242, "sub"),
        Err(DocumentError::NotFound(_))
    ));
    assert!(matches!(
        h.store.create_file(4242, "x.txt"),
        Err(DocumentError::NotFound(_))
    ));
    assert!(matches!(
        h.store.create_file(file.id, "x.txt"),
        Err(DocumentError::NotAFolder(_))
    ));
}

#[test]
fn failed_content_update_keeps_snapshot_and_live_record() {
    let h = harness(VersionPolicy::default());
    let live = write(&h.store, ROOT_ID, "a.txt", "v0");

    h.content.reject_updates(true);
    let result = h.store.store_document(ROOT_ID, "a.txt", b"v1 is longer");
    assert!(matches!(
        result,
        Err(DocumentError::Store(StorageError::Unavailable(_)))
    ));
    h.content.reject_updates(false);

    // The snapshot was written before the live record was touched
    let versions = h.store.versions_of(live.id).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(text(&h.store, versions[0].id), "v0");

    let current = h.store.document_by_id(live.id).unwrap();
    assert_eq!(current.size, 2);
    assert_eq!(text(&h.store, live.id), "v0");
}

#[test]
fn rejected_metadata_insert_creates_nothing() {
    let h = harness(VersionPolicy::default());
    h.metadata.reject_writes(true);
    assert!(matches!(
        h.store.store_document(ROOT_ID, "a.txt", b"x"),
        Err(DocumentError::Store(_))
    ));
    h.metadata.reject_writes(false);
    assert!(h.store.document_from_path("/a.txt").is_none());
    assert!(h.content.is_empty());
}
