//! Error types
//!
//! `StorageError` covers the persistence backends, `DocumentError` is what the
//! document tree and archive codec report to callers, and `ApiError` covers the
//! configuration, logging, and CLI plumbing around them.

use crate::types::DocumentId;
use thiserror::Error;

/// Failure inside a metadata or content store backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record not found: {0}")]
    MissingRecord(DocumentId),

    #[error("content not found for document {0}")]
    MissingContent(DocumentId),

    #[error("record already exists: {0}")]
    DuplicateRecord(DocumentId),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by the document tree, the versioned store, and the archive codec.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("not a folder: {0}")]
    NotAFolder(String),

    #[error("is a folder: {0}")]
    IsAFolder(String),

    #[error("unsupported content type {mime_type} for {name}")]
    UnsupportedType { name: String, mime_type: String },

    #[error("name already in use under parent {parent_id}: {name}")]
    NameConflict { parent_id: DocumentId, name: String },

    #[error("invalid document name: {0:?}")]
    InvalidName(String),

    #[error("the root folder cannot be deleted")]
    CannotDeleteRoot,

    #[error("parent folder not found for archive entry {0}")]
    MissingParent(String),

    #[error("inconsistent document tree: {0}")]
    Corrupt(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("storage failure: {0}")]
    Store(#[from] StorageError),
}

impl DocumentError {
    pub fn not_found_id(id: DocumentId) -> Self {
        DocumentError::NotFound(format!("id {}", id))
    }

    pub fn archive(message: impl Into<String>) -> Self {
        DocumentError::Archive(message.into())
    }
}

/// Errors surfaced by configuration, logging, and command plumbing.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("invalid path: {0}")]
    PathError(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    StorageError(#[from] StorageError),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;
