//! In-memory record and content stores.
//!
//! Used for ephemeral trees and tests. Both stores can be told to reject
//! writes so callers can exercise partial-failure paths.

use crate::error::StorageError;
use crate::store::{ContentStore, DocumentRecord, MetadataStore};
use crate::types::{DocumentId, ROOT_ID};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub struct MemoryMetadataStore {
    records: RwLock<BTreeMap<DocumentId, DocumentRecord>>,
    next_id: AtomicU64,
    reject_writes: AtomicBool,
}

impl MemoryMetadataStore {
    /// Create a store holding only the root folder record
    pub fn new() -> Self {
        let mut records = BTreeMap::new();
        records.insert(ROOT_ID, DocumentRecord::root(Utc::now()));
        Self {
            records: RwLock::new(records),
            next_id: AtomicU64::new(ROOT_ID + 1),
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Create a store from existing records, root included
    pub fn with_records(records: impl IntoIterator<Item = DocumentRecord>) -> Self {
        let records: BTreeMap<DocumentId, DocumentRecord> =
            records.into_iter().map(|r| (r.id, r)).collect();
        let next_id = records.keys().next_back().copied().unwrap_or(ROOT_ID) + 1;
        Self {
            records: RwLock::new(records),
            next_id: AtomicU64::new(next_id.max(ROOT_ID + 1)),
            reject_writes: AtomicBool::new(false),
        }
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "metadata store is rejecting writes".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn find_by_id(&self, id: DocumentId) -> Result<Option<DocumentRecord>, StorageError> {
        Ok(self.records.read().get(&id).cloned())
    }

    fn find_by_parent_id(
        &self,
        parent_id: Option<DocumentId>,
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| record.parent_id == parent_id)
            .cloned()
            .collect())
    }

    fn insert(&self, record: &DocumentRecord) -> Result<DocumentId, StorageError> {
        self.check_writable()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = record.clone();
        stored.id = id;
        self.records.write().insert(id, stored);
        Ok(id)
    }

    fn update(&self, record: &DocumentRecord) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut records = self.records.write();
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StorageError::MissingRecord(record.id)),
        }
    }

    fn delete_by_id(&self, id: DocumentId) -> Result<(), StorageError> {
        self.check_writable()?;
        self.records.write().remove(&id);
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<DocumentRecord>, StorageError> {
        Ok(self.records.read().values().cloned().collect())
    }
}

pub struct MemoryContentStore {
    blobs: RwLock<BTreeMap<DocumentId, Vec<u8>>>,
    reject_updates: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            reject_updates: AtomicBool::new(false),
        }
    }

    /// Make `update` fail while `insert` keeps working
    pub fn reject_updates(&self, reject: bool) {
        self.reject_updates.store(reject, Ordering::SeqCst);
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.blobs.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for MemoryContentStore {
    fn insert(&self, id: DocumentId, bytes: &[u8]) -> Result<(), StorageError> {
        self.blobs.write().insert(id, bytes.to_vec());
        Ok(())
    }

    fn update(&self, id: DocumentId, bytes: &[u8]) -> Result<(), StorageError> {
        if self.reject_updates.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "content store is rejecting updates".to_string(),
            ));
        }
        let mut blobs = self.blobs.write();
        match blobs.get_mut(&id) {
            Some(existing) => {
                *existing = bytes.to_vec();
                Ok(())
            }
            None => Err(StorageError::MissingContent(id)),
        }
    }

    fn load(&self, id: DocumentId) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .get(&id)
            .cloned()
            .ok_or(StorageError::MissingContent(id))
    }

    fn delete(&self, id: DocumentId) -> Result<(), StorageError> {
        self.blobs.write().remove(&id);
        Ok(())
    }
}
