//! Sled-backed record and content stores.
//!
//! Layout inside one sled database:
//! - `documents`: big-endian id -> bincode `DocumentRecord`
//! - `children`: big-endian parent id ++ big-endian id -> empty (parent listing)
//! - `contents`: big-endian id -> raw bytes

use crate::error::StorageError;
use crate::store::{ContentStore, DocumentRecord, MetadataStore};
use crate::types::{DocumentId, ROOT_ID};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const DOCUMENTS_TREE: &str = "documents";
const CHILDREN_TREE: &str = "children";
const CONTENTS_TREE: &str = "contents";

/// Parent key used for records without a parent (the root)
const NO_PARENT: u64 = 0;

fn id_key(id: DocumentId) -> [u8; 8] {
    id.to_be_bytes()
}

fn child_key(parent_id: Option<DocumentId>, id: DocumentId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&parent_id.unwrap_or(NO_PARENT).to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> Result<DocumentId, StorageError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        StorageError::Unavailable(format!("malformed id key of {} bytes", bytes.len()))
    })?;
    Ok(u64::from_be_bytes(raw))
}

/// Both stores opened over the same sled database
pub struct SledStores {
    pub metadata: Arc<SledMetadataStore>,
    pub content: Arc<SledContentStore>,
}

impl SledStores {
    /// Open (or create) the stores at `path`
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        info!(path = %path.display(), "Opened document store");
        Self::from_db(db)
    }

    /// Open stores over a throwaway database removed on drop
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            metadata: Arc::new(SledMetadataStore::from_db(db.clone())?),
            content: Arc::new(SledContentStore::from_db(&db)?),
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.metadata.db.flush()?;
        Ok(())
    }
}

pub struct SledMetadataStore {
    db: sled::Db,
    documents: sled::Tree,
    children: sled::Tree,
}

impl SledMetadataStore {
    /// Open the metadata trees, seeding the root record on first use
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let store = Self {
            documents: db.open_tree(DOCUMENTS_TREE)?,
            children: db.open_tree(CHILDREN_TREE)?,
            db,
        };
        if store.documents.get(id_key(ROOT_ID))?.is_none() {
            debug!("Seeding root record");
            store.write_record(&DocumentRecord::root(Utc::now()))?;
        }
        Ok(store)
    }

    fn write_record(&self, record: &DocumentRecord) -> Result<(), StorageError> {
        let encoded = bincode::serialize(record)?;
        self.documents.insert(id_key(record.id), encoded)?;
        self.children
            .insert(child_key(record.parent_id, record.id), &[] as &[u8])?;
        Ok(())
    }

    fn read_record(&self, id: DocumentId) -> Result<Option<DocumentRecord>, StorageError> {
        match self.documents.get(id_key(id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn next_id(&self) -> Result<DocumentId, StorageError> {
        // generate_id starts at 0 and may skip values across restarts; both are fine
        Ok(self.db.generate_id()? + ROOT_ID + 1)
    }
}

impl MetadataStore for SledMetadataStore {
    fn find_by_id(&self, id: DocumentId) -> Result<Option<DocumentRecord>, StorageError> {
        self.read_record(id)
    }

    fn find_by_parent_id(
        &self,
        parent_id: Option<DocumentId>,
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        let prefix = parent_id.unwrap_or(NO_PARENT).to_be_bytes();
        let mut records = Vec::new();
        for entry in self.children.scan_prefix(prefix) {
            let (key, _) = entry?;
            let id = decode_id(&key[8..])?;
            // A listing entry without its record means a delete was interrupted
            if let Some(record) = self.read_record(id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn insert(&self, record: &DocumentRecord) -> Result<DocumentId, StorageError> {
        let mut stored = record.clone();
        stored.id = self.next_id()?;
        self.write_record(&stored)?;
        Ok(stored.id)
    }

    fn update(&self, record: &DocumentRecord) -> Result<(), StorageError> {
        let existing = self
            .read_record(record.id)?
            .ok_or(StorageError::MissingRecord(record.id))?;
        if existing.parent_id != record.parent_id {
            self.children
                .remove(child_key(existing.parent_id, existing.id))?;
        }
        self.write_record(record)
    }

    fn delete_by_id(&self, id: DocumentId) -> Result<(), StorageError> {
        if let Some(existing) = self.read_record(id)? {
            self.documents.remove(id_key(id))?;
            self.children.remove(child_key(existing.parent_id, id))?;
        }
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<DocumentRecord>, StorageError> {
        let mut records = Vec::with_capacity(self.documents.len());
        for entry in self.documents.iter() {
            let (_, value) = entry?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }
}

pub struct SledContentStore {
    contents: sled::Tree,
}

impl SledContentStore {
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            contents: db.open_tree(CONTENTS_TREE)?,
        })
    }
}

impl ContentStore for SledContentStore {
    fn insert(&self, id: DocumentId, bytes: &[u8]) -> Result<(), StorageError> {
        self.contents.insert(id_key(id), bytes)?;
        Ok(())
    }

    fn update(&self, id: DocumentId, bytes: &[u8]) -> Result<(), StorageError> {
        if !self.contents.contains_key(id_key(id))? {
            return Err(StorageError::MissingContent(id));
        }
        self.contents.insert(id_key(id), bytes)?;
        Ok(())
    }

    fn load(&self, id: DocumentId) -> Result<Vec<u8>, StorageError> {
        self.contents
            .get(id_key(id))?
            .map(|bytes| bytes.to_vec())
            .ok_or(StorageError::MissingContent(id))
    }

    fn delete(&self, id: DocumentId) -> Result<(), StorageError> {
        self.contents.remove(id_key(id))?;
        Ok(())
    }
}
