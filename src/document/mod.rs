//! Versioned Document Store
//!
//! Create, overwrite, and delete semantics over the metadata store, the
//! content store, and the tree index. Every mutation runs under one global
//! lock and updates the stores before mirroring the result into the index.
//! Reads only take the index read lock and may observe a tree mid-mutation.

pub mod rotation;

use crate::classify::{Classifier, ExtensionClassifier, MimeType};
use crate::error::{DocumentError, DocumentResult, StorageError};
use crate::store::{
    ContentStore, DocumentRecord, MemoryContentStore, MemoryMetadataStore, MetadataStore,
};
use crate::tree::{DocumentNode, TreeIndex};
use crate::types::{DocumentId, MAX_VERSIONS, PATH_SEPARATOR, ROOT_ID};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rotation::{plan_rotation, version_base, version_name, version_suffix, RotationPlan};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use rotation::VersionPolicy;

/// Hands out strictly increasing timestamps so version age is never tied
struct Clock {
    last: Mutex<DateTime<Utc>>,
}

impl Clock {
    fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let mut now = Utc::now();
        if now <= *last {
            now = *last + Duration::microseconds(1);
        }
        *last = now;
        now
    }
}

/// Reject names that cannot be a single path segment
pub fn validate_name(name: &str) -> DocumentResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(PATH_SEPARATOR) {
        return Err(DocumentError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub struct VersionedDocumentStore {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
    classifier: Arc<dyn Classifier>,
    index: RwLock<TreeIndex>,
    write_lock: Mutex<()>,
    policy: VersionPolicy,
    clock: Clock,
}

impl VersionedDocumentStore {
    /// Build the index from the metadata store and wrap the collaborators
    pub fn open(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        classifier: Arc<dyn Classifier>,
        policy: VersionPolicy,
    ) -> DocumentResult<Self> {
        let index = TreeIndex::initialize(metadata.as_ref(), policy.index_versions)?;
        Ok(Self {
            metadata,
            content,
            classifier,
            index: RwLock::new(index),
            write_lock: Mutex::new(()),
            policy,
            clock: Clock::new(),
        })
    }

    /// Empty store held entirely in memory
    pub fn in_memory(policy: VersionPolicy) -> DocumentResult<Self> {
        Self::open(
            Arc::new(MemoryMetadataStore::new()),
            Arc::new(MemoryContentStore::new()),
            Arc::new(ExtensionClassifier::new()),
            policy,
        )
    }

    pub fn policy(&self) -> VersionPolicy {
        self.policy
    }

    /// Discard the index and rebuild it from the metadata store
    pub fn reload(&self) -> DocumentResult<()> {
        let _guard = self.write_lock.lock();
        let index = TreeIndex::initialize(self.metadata.as_ref(), self.policy.index_versions)?;
        *self.index.write() = index;
        Ok(())
    }

    // ---- read surface ----

    pub fn root(&self) -> DocumentNode {
        self.index.read().root().clone()
    }

    pub fn node_count(&self) -> usize {
        self.index.read().len()
    }

    pub fn document_by_id(&self, id: DocumentId) -> Option<DocumentNode> {
        self.index.read().resolve_by_id(id).cloned()
    }

    pub fn document_from_path(&self, path: &str) -> Option<DocumentNode> {
        self.index.read().resolve_by_path(path).cloned()
    }

    pub fn child_by_name(&self, parent_id: DocumentId, name: &str) -> Option<DocumentNode> {
        let index = self.index.read();
        let parent = index.resolve_by_id(parent_id)?;
        index.child_by_name(parent, name).cloned()
    }

    pub fn children(&self, id: DocumentId) -> DocumentResult<Vec<DocumentNode>> {
        let index = self.index.read();
        if !index.contains(id) {
            return Err(DocumentError::not_found_id(id));
        }
        Ok(index.children_of(id).cloned().collect())
    }

    pub fn path_of(&self, id: DocumentId) -> DocumentResult<String> {
        self.index
            .read()
            .path_of(id)
            .ok_or_else(|| DocumentError::not_found_id(id))
    }

    /// Documents whose full path contains `fragment`, ignoring case
    ///
    /// The matches are collected under one read lock; the returned iterator
    /// does not observe later mutations.
    pub fn list_by_fuzzy_path(&self, fragment: &str) -> impl Iterator<Item = DocumentNode> {
        let matches: Vec<DocumentNode> = self
            .index
            .read()
            .find_by_fuzzy_path(fragment, self.policy.search_versions)
            .cloned()
            .collect();
        matches.into_iter()
    }

    /// Current bytes of a file, or of a version node
    pub fn content(&self, id: DocumentId) -> DocumentResult<Vec<u8>> {
        let record = match self.document_by_id(id) {
            Some(node) => node.to_record(),
            None => self
                .metadata
                .find_by_id(id)?
                .ok_or_else(|| DocumentError::not_found_id(id))?,
        };
        if record.is_folder {
            return Err(DocumentError::IsAFolder(record.name));
        }
        Ok(self.content.load(id)?)
    }

    /// Version nodes of a live file ordered by suffix
    ///
    /// Read from the metadata store so hidden versions are listed too.
    pub fn versions_of(&self, id: DocumentId) -> DocumentResult<Vec<DocumentNode>> {
        let node = self
            .document_by_id(id)
            .ok_or_else(|| DocumentError::not_found_id(id))?;
        if node.is_folder {
            return Err(DocumentError::IsAFolder(node.name));
        }
        let parent_id = match node.parent_id {
            Some(parent_id) if !node.is_version => parent_id,
            _ => return Ok(Vec::new()),
        };
        let mut versions = self.metadata.sibling_versions(parent_id, &node.name)?;
        versions.sort_by_key(|record| version_suffix(&node.name, &record.name));
        Ok(versions.into_iter().map(DocumentNode::from).collect())
    }

    // ---- mutations ----

    /// Create an empty folder under `parent_id`
    ///
    /// A parent id that does not resolve fails with `NotFound`; one that
    /// resolves to a file fails with `NotAFolder`. `create_file` and
    /// `store_document` check their parent the same way.
    pub fn create_folder(&self, parent_id: DocumentId, name: &str) -> DocumentResult<DocumentNode> {
        let _guard = self.write_lock.lock();
        validate_name(name)?;
        self.folder(parent_id)?;
        self.ensure_name_free(parent_id, name)?;

        let mut record = DocumentRecord::folder(parent_id, name, self.clock.now());
        record.id = self.metadata.insert(&record)?;
        let node = self.mirror_new(record)?;
        debug!(id = node.id, parent_id, name, "Created folder");
        Ok(node)
    }

    /// Create an empty text file; the type is classified from the name alone
    pub fn create_file(&self, parent_id: DocumentId, name: &str) -> DocumentResult<DocumentNode> {
        let _guard = self.write_lock.lock();
        validate_name(name)?;
        self.folder(parent_id)?;

        let mime_type = self.classifier.detect_by_name(name);
        if !self.classifier.is_text_type(&mime_type) {
            return Err(DocumentError::UnsupportedType {
                name: name.to_string(),
                mime_type: mime_type.to_string(),
            });
        }
        self.ensure_name_free(parent_id, name)?;

        let record = DocumentRecord::file(
            parent_id,
            name,
            mime_type.as_str(),
            true,
            0,
            self.clock.now(),
        );
        let node = self.persist_new_file(record, &[])?;
        debug!(id = node.id, parent_id, name, "Created empty file");
        Ok(node)
    }

    /// Write `bytes` as `name` under `parent_id`
    ///
    /// A new name creates a file without history. An existing file first has
    /// its current content archived as a version node, then is overwritten in
    /// place keeping its id.
    pub fn store_document(
        &self,
        parent_id: DocumentId,
        name: &str,
        bytes: &[u8],
    ) -> DocumentResult<DocumentNode> {
        let _guard = self.write_lock.lock();
        validate_name(name)?;
        self.folder(parent_id)?;
        let mime_type = self.classifier.detect_by_content(name, bytes);

        match self.child_by_name(parent_id, name) {
            None => {
                self.ensure_name_free(parent_id, name)?;
                let is_text = self.classifier.is_text_type(&mime_type);
                let record = DocumentRecord::file(
                    parent_id,
                    name,
                    mime_type.as_str(),
                    is_text,
                    bytes.len() as u64,
                    self.clock.now(),
                );
                let node = self.persist_new_file(record, bytes)?;
                debug!(id = node.id, parent_id, name, size = node.size, "Stored new document");
                Ok(node)
            }
            Some(existing) if existing.is_folder => Err(DocumentError::NotAFolder(format!(
                "{} is a folder and cannot hold content",
                name
            ))),
            Some(existing) if existing.is_version => Err(DocumentError::NameConflict {
                parent_id,
                name: name.to_string(),
            }),
            Some(target) => self.overwrite(target, bytes, &mime_type),
        }
    }

    /// Write `bytes` into the version slot `name`, such as `notes.txt_2`
    ///
    /// The live file the slot belongs to must exist under `parent_id`. An
    /// existing version record with that name is overwritten in place; a free
    /// slot gets a new version record. The slot counts toward the cap like
    /// any other version and is deleted with its live file.
    pub fn restore_version(
        &self,
        parent_id: DocumentId,
        name: &str,
        bytes: &[u8],
    ) -> DocumentResult<DocumentNode> {
        let _guard = self.write_lock.lock();
        validate_name(name)?;
        self.folder(parent_id)?;
        let base = version_base(name).ok_or_else(|| DocumentError::InvalidName(name.to_string()))?;
        match self.metadata.find_by_parent_id_and_name(parent_id, base)? {
            Some(live) if !live.is_folder && !live.is_version => {}
            _ => return Err(DocumentError::NotFound(format!("{} (live file of {})", base, name))),
        }

        let mime_type = self.classifier.detect_by_content(base, bytes);
        let is_text = self.classifier.is_text_type(&mime_type);
        let now = self.clock.now();
        match self.metadata.find_by_parent_id_and_name(parent_id, name)? {
            Some(mut record) if record.is_version => {
                record.modified_at = now;
                record.size = bytes.len() as u64;
                record.mime_type = Some(mime_type.as_str().to_string());
                record.is_text = is_text;
                self.metadata.update(&record)?;
                self.content.update(record.id, bytes)?;
                if self.policy.index_versions {
                    self.index.write().update(&record);
                }
                debug!(id = record.id, name, "Restored version in place");
                Ok(DocumentNode::from(record))
            }
            Some(_) => Err(DocumentError::NameConflict {
                parent_id,
                name: name.to_string(),
            }),
            None => {
                if self.metadata.count_sibling_versions(parent_id, base)? >= MAX_VERSIONS {
                    return Err(DocumentError::NameConflict {
                        parent_id,
                        name: name.to_string(),
                    });
                }
                let mut record = DocumentRecord::file(
                    parent_id,
                    name,
                    mime_type.as_str(),
                    is_text,
                    bytes.len() as u64,
                    now,
                );
                record.is_version = true;
                let record = self.persist_record(record, bytes)?;
                let node = if self.policy.index_versions {
                    self.mirror_new(record)?
                } else {
                    DocumentNode::from(record)
                };
                debug!(id = node.id, parent_id, name, "Restored version");
                Ok(node)
            }
        }
    }

    /// Delete a document and everything below it
    ///
    /// Children go first (post-order); deleting a live file also deletes its
    /// version nodes. There is no rollback if a store call fails midway.
    pub fn delete_document(&self, id: DocumentId) -> DocumentResult<DocumentNode> {
        let _guard = self.write_lock.lock();
        if id == ROOT_ID {
            return Err(DocumentError::CannotDeleteRoot);
        }
        let node = self
            .document_by_id(id)
            .ok_or_else(|| DocumentError::not_found_id(id))?;

        let removed = self.delete_recursive(node.to_record()).map_err(|e| {
            warn!(id, error = %e, "Delete interrupted; subtree may be partially removed");
            e
        })?;
        info!(id, name = %node.name, removed, "Deleted document");
        Ok(node)
    }

    // ---- internals ----

    fn folder(&self, id: DocumentId) -> DocumentResult<DocumentNode> {
        let node = self
            .document_by_id(id)
            .ok_or_else(|| DocumentError::not_found_id(id))?;
        if !node.is_folder {
            return Err(DocumentError::NotAFolder(node.name));
        }
        Ok(node)
    }

    /// Sibling names are unique across indexed and hidden records
    fn ensure_name_free(&self, parent_id: DocumentId, name: &str) -> DocumentResult<()> {
        let taken = self.child_by_name(parent_id, name).is_some()
            || self
                .metadata
                .find_by_parent_id_and_name(parent_id, name)?
                .is_some();
        if taken {
            return Err(DocumentError::NameConflict {
                parent_id,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn mirror_new(&self, record: DocumentRecord) -> DocumentResult<DocumentNode> {
        let node = DocumentNode::from(record);
        self.index.write().insert(node.clone())?;
        Ok(node)
    }

    /// Insert record then content; drop the record again if the content write fails
    fn persist_record(
        &self,
        mut record: DocumentRecord,
        bytes: &[u8],
    ) -> DocumentResult<DocumentRecord> {
        record.id = self.metadata.insert(&record)?;
        if let Err(e) = self.content.insert(record.id, bytes) {
            if let Err(cleanup) = self.metadata.delete_by_id(record.id) {
                warn!(id = record.id, error = %cleanup, "Failed to remove record after content write failure");
            }
            return Err(e.into());
        }
        Ok(record)
    }

    fn persist_new_file(&self, record: DocumentRecord, bytes: &[u8]) -> DocumentResult<DocumentNode> {
        let record = self.persist_record(record, bytes)?;
        self.mirror_new(record)
    }

    fn overwrite(
        &self,
        target: DocumentNode,
        bytes: &[u8],
        mime_type: &MimeType,
    ) -> DocumentResult<DocumentNode> {
        let parent_id = target
            .parent_id
            .ok_or_else(|| DocumentError::Corrupt(format!("file {} has no parent", target.id)))?;

        // Snapshot before the live record is touched
        let previous = self.content.load(target.id)?;
        let now = self.clock.now();
        self.archive_previous(&target, parent_id, &previous, now)?;

        let mut record = target.to_record();
        record.modified_at = now;
        record.size = bytes.len() as u64;
        record.mime_type = Some(mime_type.as_str().to_string());
        record.is_text = self.classifier.is_text_type(mime_type);
        record.is_version = false;
        self.content.update(record.id, bytes)?;
        self.metadata.update(&record)?;

        let mut index = self.index.write();
        index.update(&record);
        let node = index
            .resolve_by_id(record.id)
            .cloned()
            .ok_or_else(|| DocumentError::not_found_id(record.id))?;
        debug!(id = node.id, name = %node.name, size = node.size, "Overwrote document");
        Ok(node)
    }

    fn archive_previous(
        &self,
        target: &DocumentNode,
        parent_id: DocumentId,
        previous: &[u8],
        now: DateTime<Utc>,
    ) -> DocumentResult<()> {
        match plan_rotation(self.metadata.as_ref(), parent_id, &target.name)? {
            RotationPlan::Append { suffix, name } => {
                let mut record = target.to_record();
                record.id = 0;
                record.name = name;
                record.size = previous.len() as u64;
                record.created_at = now;
                record.modified_at = now;
                record.is_version = true;
                record.id = self.metadata.insert(&record)?;
                self.content.insert(record.id, previous)?;
                debug!(id = record.id, of = target.id, suffix, "Archived previous content as new version");
                if self.policy.index_versions {
                    self.mirror_new(record)?;
                }
            }
            RotationPlan::Recycle { id } => {
                let mut record = self
                    .metadata
                    .find_by_id(id)?
                    .ok_or(StorageError::MissingRecord(id))?;
                record.modified_at = now;
                record.size = previous.len() as u64;
                record.mime_type = target.mime_type.clone();
                record.is_text = target.is_text;
                self.metadata.update(&record)?;
                self.content.update(id, previous)?;
                debug!(id, of = target.id, name = %record.name, "Recycled oldest version");
                self.index.write().update(&record);
            }
            RotationPlan::NoFreeSlot => {
                return Err(DocumentError::NameConflict {
                    parent_id,
                    name: version_name(&target.name, MAX_VERSIONS),
                })
            }
        }
        Ok(())
    }

    /// Returns how many records were removed
    fn delete_recursive(&self, record: DocumentRecord) -> DocumentResult<usize> {
        let mut removed = 0;
        if record.is_folder {
            for child in self.metadata.find_by_parent_id(Some(record.id))? {
                // Version nodes may already be gone with their live file
                if self.metadata.find_by_id(child.id)?.is_some() {
                    removed += self.delete_recursive(child)?;
                }
            }
        } else if !record.is_version {
            if let Some(parent_id) = record.parent_id {
                for version in self.metadata.sibling_versions(parent_id, &record.name)? {
                    removed += self.delete_record(&version)?;
                }
            }
        }
        removed += self.delete_record(&record)?;
        Ok(removed)
    }

    fn delete_record(&self, record: &DocumentRecord) -> DocumentResult<usize> {
        self.metadata.delete_by_id(record.id)?;
        if !record.is_folder {
            self.content.delete(record.id)?;
        }
        self.index.write().remove(record.id);
        debug!(id = record.id, name = %record.name, "Deleted record");
        Ok(1)
    }
}
