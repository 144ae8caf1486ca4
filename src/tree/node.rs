//! In-memory document node

use crate::store::DocumentRecord;
use crate::types::{DocumentId, ROOT_ID};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One folder or file in the tree index
///
/// The parent is referenced by id and resolved through the index; `children`
/// lists child ids in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentNode {
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
    #[serde(skip)]
    pub children: Vec<DocumentId>,
}

impl DocumentNode {
    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }

    pub fn is_file(&self) -> bool {
        !self.is_folder
    }

    /// Overwrite the mirrored metadata, keeping identity and children
    pub fn apply_record(&mut self, record: &DocumentRecord) {
        self.parent_id = record.parent_id;
        self.name = record.name.clone();
        self.is_folder = record.is_folder;
        self.mime_type = record.mime_type.clone();
        self.is_text = record.is_text;
        self.size = record.size;
        self.created_at = record.created_at;
        self.modified_at = record.modified_at;
        self.is_version = record.is_version;
    }

    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            id: self.id,
            parent_id: self.parent_id,
            name: self.name.clone(),
            is_folder: self.is_folder,
            mime_type: self.mime_type.clone(),
            is_text: self.is_text,
            size: self.size,
            created_at: self.created_at,
            modified_at: self.modified_at,
            is_version: self.is_version,
        }
    }
}

impl From<DocumentRecord> for DocumentNode {
    fn from(record: DocumentRecord) -> Self {
        Self {
            id: record.id,
            parent_id: record.parent_id,
            name: record.name,
            is_folder: record.is_folder,
            mime_type: record.mime_type,
            is_text: record.is_text,
            size: record.size,
            created_at: record.created_at,
            modified_at: record.modified_at,
            is_version: record.is_version,
            children: Vec::new(),
        }
    }
}
