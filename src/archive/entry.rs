//! Archive entries and the order they are applied in on import.

use crate::error::{DocumentError, DocumentResult};
use crate::types::PATH_SEPARATOR;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

/// One folder or file read from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub kind: EntryKind,
    /// Parent path relative to the import target; `None` for top-level entries
    pub path: Option<String>,
    pub name: String,
    pub data: Vec<u8>,
    /// Exported from a version node rather than a live file
    pub is_version: bool,
}

impl ArchiveEntry {
    /// Split a raw archive path such as `docs/img/` or `./docs/readme.txt`
    pub fn from_archive_path(raw: &str, kind: EntryKind, data: Vec<u8>) -> DocumentResult<Self> {
        let trimmed = raw.trim_end_matches(PATH_SEPARATOR);
        let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
        if trimmed.is_empty() || trimmed.starts_with(PATH_SEPARATOR) {
            return Err(DocumentError::archive(format!("invalid entry path {:?}", raw)));
        }
        let unsafe_segment = trimmed
            .split(PATH_SEPARATOR)
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
        if unsafe_segment {
            return Err(DocumentError::archive(format!("invalid entry path {:?}", raw)));
        }

        let (path, name) = match trimmed.rsplit_once(PATH_SEPARATOR) {
            Some((path, name)) => (Some(path.to_string()), name.to_string()),
            None => (None, trimmed.to_string()),
        };
        Ok(Self {
            kind,
            path,
            name,
            data,
            is_version: false,
        })
    }

    /// Mark the entry as a version snapshot
    pub fn as_version(mut self) -> Self {
        self.is_version = true;
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    /// Number of parent path segments; 0 for top-level entries
    pub fn depth(&self) -> usize {
        self.path
            .as_deref()
            .map(|path| path.split(PATH_SEPARATOR).count())
            .unwrap_or(0)
    }

    /// Application order: folders, then live files, then versions; within
    /// each group shallow before deep, then by name
    ///
    /// Applying entries in this order guarantees every ancestor folder exists
    /// before anything is placed inside it, and every live file exists before
    /// its versions. The parent path is a final tie-break so the order is
    /// total.
    pub fn apply_order(a: &ArchiveEntry, b: &ArchiveEntry) -> Ordering {
        b.is_folder()
            .cmp(&a.is_folder())
            .then_with(|| a.is_version.cmp(&b.is_version))
            .then_with(|| a.depth().cmp(&b.depth()))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.path.cmp(&b.path))
    }
}

/// Sort entries into application order
pub fn sort_for_import(entries: &mut [ArchiveEntry]) {
    entries.sort_by(ArchiveEntry::apply_order);
}
