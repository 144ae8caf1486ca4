//! Core types for the document tree.

/// DocumentId: Store-assigned identifier of a folder or file record
pub type DocumentId = u64;

/// Reserved id of the root folder
pub const ROOT_ID: DocumentId = 1;

/// Name of the root folder record
pub const ROOT_NAME: &str = "";

/// Rotation cap: version nodes kept per live file
pub const MAX_VERSIONS: u32 = 5;

/// Separator between a live file's name and its version suffix
pub const VERSION_SEPARATOR: char = '_';

/// Path separator used by tree paths and archive entries
pub const PATH_SEPARATOR: char = '/';
