//! Doctree: Hierarchical Document Store
//!
//! A tree of folders and files addressed by id or by `/`-separated path.
//! Overwriting a file keeps up to five earlier contents as sibling version
//! nodes, and any subtree can be exported to or imported from a compressed
//! archive.

pub mod archive;
pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;

pub use archive::{ArchiveCodec, ImportSummary};
pub use document::{VersionPolicy, VersionedDocumentStore};
pub use error::{ApiError, DocumentError, DocumentResult, StorageError};
pub use tree::{DocumentNode, TreeIndex};
pub use types::{DocumentId, MAX_VERSIONS, ROOT_ID};
