//! Document Record Store
//!
//! Persistence ports for the document tree. `MetadataStore` keeps one
//! `DocumentRecord` per folder or file keyed by id; `ContentStore` keeps the
//! raw bytes of each file keyed by the same id. Version nodes are ordinary
//! records, so both stores are keyed by document id only.

pub mod memory;
pub mod persistence;

use crate::document::rotation::version_suffix;
use crate::error::StorageError;
use crate::types::{DocumentId, ROOT_ID, ROOT_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::{MemoryContentStore, MemoryMetadataStore};
pub use persistence::{SledContentStore, SledMetadataStore, SledStores};

/// DocumentRecord: persisted metadata of a folder or file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub parent_id: Option<DocumentId>,
    pub name: String,
    pub is_folder: bool,
    pub mime_type: Option<String>,
    pub is_text: bool,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub is_version: bool,
}

impl DocumentRecord {
    /// The root folder record, stored under the reserved id
    pub fn root(now: DateTime<Utc>) -> Self {
        Self {
            id: ROOT_ID,
            parent_id: None,
            name: ROOT_NAME.to_string(),
            is_folder: true,
            mime_type: None,
            is_text: false,
            size: 0,
            created_at: now,
            modified_at: now,
            is_version: false,
        }
    }

    /// A folder record not yet assigned an id
    pub fn folder(parent_id: DocumentId, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            parent_id: Some(parent_id),
            name: name.to_string(),
            is_folder: true,
            mime_type: None,
            is_text: false,
            size: 0,
            created_at: now,
            modified_at: now,
            is_version: false,
        }
    }

    /// A live file record not yet assigned an id
    pub fn file(
        parent_id: DocumentId,
        name: &str,
        mime_type: &str,
        is_text: bool,
        size: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            parent_id: Some(parent_id),
            name: name.to_string(),
            is_folder: false,
            mime_type: Some(mime_type.to_string()),
            is_text,
            size,
            created_at: now,
            modified_at: now,
            is_version: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }
}

/// Metadata store interface
///
/// `insert` ignores the id carried by the record and returns the id it
/// assigned. Listings are returned in ascending id order.
pub trait MetadataStore: Send + Sync {
    fn find_by_id(&self, id: DocumentId) -> Result<Option<DocumentRecord>, StorageError>;
    fn find_by_parent_id(
        &self,
        parent_id: Option<DocumentId>,
    ) -> Result<Vec<DocumentRecord>, StorageError>;
    fn insert(&self, record: &DocumentRecord) -> Result<DocumentId, StorageError>;
    fn update(&self, record: &DocumentRecord) -> Result<(), StorageError>;
    fn delete_by_id(&self, id: DocumentId) -> Result<(), StorageError>;
    fn find_all(&self) -> Result<Vec<DocumentRecord>, StorageError>;

    fn find_by_parent_id_and_name(
        &self,
        parent_id: DocumentId,
        name: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        Ok(self
            .find_by_parent_id(Some(parent_id))?
            .into_iter()
            .find(|record| record.name == name))
    }

    fn find_all_without_versions(&self) -> Result<Vec<DocumentRecord>, StorageError> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|record| !record.is_version)
            .collect())
    }

    /// Version records of `base_name` under `parent_id`, in ascending id order
    fn sibling_versions(
        &self,
        parent_id: DocumentId,
        base_name: &str,
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        Ok(self
            .find_by_parent_id(Some(parent_id))?
            .into_iter()
            .filter(|record| record.is_version && version_suffix(base_name, &record.name).is_some())
            .collect())
    }

    fn count_sibling_versions(
        &self,
        parent_id: DocumentId,
        base_name: &str,
    ) -> Result<u32, StorageError> {
        Ok(self.sibling_versions(parent_id, base_name)?.len() as u32)
    }

    /// Version record with the earliest `modified_at`; ties go to the first one scanned
    fn oldest_version_id(
        &self,
        parent_id: DocumentId,
        base_name: &str,
    ) -> Result<Option<DocumentId>, StorageError> {
        let mut oldest: Option<DocumentRecord> = None;
        for record in self.sibling_versions(parent_id, base_name)? {
            let replace = match &oldest {
                Some(current) => record.modified_at < current.modified_at,
                None => true,
            };
            if replace {
                oldest = Some(record);
            }
        }
        Ok(oldest.map(|record| record.id))
    }
}

/// Content store interface
pub trait ContentStore: Send + Sync {
    fn insert(&self, id: DocumentId, bytes: &[u8]) -> Result<(), StorageError>;
    fn update(&self, id: DocumentId, bytes: &[u8]) -> Result<(), StorageError>;
    fn load(&self, id: DocumentId) -> Result<Vec<u8>, StorageError>;
    fn delete(&self, id: DocumentId) -> Result<(), StorageError>;
}
