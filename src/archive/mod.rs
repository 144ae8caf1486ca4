//! Archive Codec
//!
//! Flattens a subtree into a zstd-compressed tar stream and applies an
//! archive back onto a target folder. The codec holds no tree state; it only
//! goes through the public surface of `VersionedDocumentStore`.

pub mod entry;

use crate::document::rotation::version_base;
use crate::document::VersionedDocumentStore;
use crate::error::{DocumentError, DocumentResult};
use crate::tree::DocumentNode;
use crate::types::{DocumentId, PATH_SEPARATOR};
use entry::{sort_for_import, ArchiveEntry, EntryKind};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use tar::{Archive, Builder, EntryType, Header};
use tracing::{debug, info, warn};

const FOLDER_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;
/// PAX extension key set on entries exported from version nodes
const VERSION_PAX_KEY: &str = "DOCTREE.version";

/// Archive settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// zstd compression level (1-21)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

fn default_compression_level() -> i32 {
    3
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
        }
    }
}

/// Counts of what an import did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub folders_created: usize,
    pub folders_existing: usize,
    pub files_stored: usize,
    pub versions_restored: usize,
    pub versions_skipped: usize,
}

pub struct ArchiveCodec<'a> {
    store: &'a VersionedDocumentStore,
    config: ArchiveConfig,
}

impl<'a> ArchiveCodec<'a> {
    pub fn new(store: &'a VersionedDocumentStore) -> Self {
        Self::with_config(store, ArchiveConfig::default())
    }

    pub fn with_config(store: &'a VersionedDocumentStore, config: ArchiveConfig) -> Self {
        Self { store, config }
    }

    /// Export the subtree rooted at `id`
    ///
    /// Entry paths are relative to the parent of the exported node (or to `/`
    /// when exporting the root), so the exported node's own name is the top
    /// level of the archive. The root folder itself is never an entry.
    pub fn to_archive(&self, id: DocumentId) -> DocumentResult<Vec<u8>> {
        let node = self
            .store
            .document_by_id(id)
            .ok_or_else(|| DocumentError::not_found_id(id))?;
        let root_path = match node.parent_id {
            Some(parent_id) if !node.is_root() => self.store.path_of(parent_id)?,
            _ => "/".to_string(),
        };

        let mut builder = Builder::new(Vec::new());
        let mut entries = 0usize;
        self.archive_node(&mut builder, &node, &root_path, &mut entries)?;
        let tar_bytes = builder
            .into_inner()
            .map_err(|e| DocumentError::archive(format!("finish tar: {}", e)))?;
        let compressed = zstd::encode_all(Cursor::new(tar_bytes), self.config.compression_level)
            .map_err(|e| DocumentError::archive(format!("zstd encode: {}", e)))?;

        info!(id, entries, bytes = compressed.len(), "Exported archive");
        Ok(compressed)
    }

    fn archive_node(
        &self,
        builder: &mut Builder<Vec<u8>>,
        node: &DocumentNode,
        root_path: &str,
        entries: &mut usize,
    ) -> DocumentResult<()> {
        let full_path = self.store.path_of(node.id)?;
        let relative = relative_path(&full_path, root_path);

        if node.is_folder {
            if !node.is_root() {
                let mut header = Header::new_gnu();
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                header.set_mode(FOLDER_MODE);
                header.set_mtime(node.modified_at.timestamp().max(0) as u64);
                builder
                    .append_data(&mut header, format!("{}/", relative), std::io::empty())
                    .map_err(|e| DocumentError::archive(format!("append {}: {}", relative, e)))?;
                *entries += 1;
            }
            let export_versions = self.store.policy().export_versions;
            for child in self.store.children(node.id)? {
                if child.is_version && !export_versions {
                    continue;
                }
                self.archive_node(builder, &child, root_path, entries)?;
            }
        } else {
            let bytes = self.store.content(node.id)?;
            if node.is_version {
                builder
                    .append_pax_extensions([(VERSION_PAX_KEY, b"1".as_slice())])
                    .map_err(|e| DocumentError::archive(format!("mark {}: {}", relative, e)))?;
            }
            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(bytes.len() as u64);
            header.set_mode(FILE_MODE);
            header.set_mtime(node.modified_at.timestamp().max(0) as u64);
            builder
                .append_data(&mut header, &relative, bytes.as_slice())
                .map_err(|e| DocumentError::archive(format!("append {}: {}", relative, e)))?;
            *entries += 1;
        }
        Ok(())
    }

    /// Import an archive into `target_folder`
    ///
    /// Entries are sorted before they are applied, so the order inside the
    /// archive does not matter. Existing folders are reused and existing
    /// files are overwritten (which archives their previous content). A
    /// failure stops the import without undoing entries already applied.
    pub fn from_archive(
        &self,
        target_folder: DocumentId,
        bytes: &[u8],
    ) -> DocumentResult<ImportSummary> {
        let target = self
            .store
            .document_by_id(target_folder)
            .ok_or_else(|| DocumentError::not_found_id(target_folder))?;
        if !target.is_folder {
            return Err(DocumentError::NotAFolder(target.name));
        }

        let entries = read_entries(bytes)?;
        self.apply_entries(&target, entries)
    }

    /// Apply already-parsed entries to `target`, in sorted order
    ///
    /// Entries marked as versions are restored as version nodes of their live
    /// file when the policy exports versions, and skipped otherwise. A marked
    /// entry whose live file is absent is stored as an ordinary file.
    pub fn apply_entries(
        &self,
        target: &DocumentNode,
        mut entries: Vec<ArchiveEntry>,
    ) -> DocumentResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        if !self.store.policy().export_versions {
            let before = entries.len();
            entries.retain(|entry| !entry.is_version);
            summary.versions_skipped = before - entries.len();
        }
        sort_for_import(&mut entries);
        let target_path = self.store.path_of(target.id)?;

        for entry in entries {
            let parent = self.resolve_parent(target, &target_path, &entry)?;
            match entry.kind {
                EntryKind::Folder => match self.store.child_by_name(parent.id, &entry.name) {
                    Some(existing) if existing.is_folder => summary.folders_existing += 1,
                    Some(existing) => {
                        return Err(DocumentError::NotAFolder(format!(
                            "archive folder {} collides with file {}",
                            entry.name, existing.name
                        )))
                    }
                    None => {
                        self.store.create_folder(parent.id, &entry.name)?;
                        summary.folders_created += 1;
                    }
                },
                EntryKind::File if entry.is_version && self.has_live_base(parent.id, &entry.name) => {
                    self.store.restore_version(parent.id, &entry.name, &entry.data)?;
                    summary.versions_restored += 1;
                }
                EntryKind::File => {
                    self.store.store_document(parent.id, &entry.name, &entry.data)?;
                    summary.files_stored += 1;
                }
            }
        }

        info!(
            folder = target.id,
            folders_created = summary.folders_created,
            folders_existing = summary.folders_existing,
            files_stored = summary.files_stored,
            versions_restored = summary.versions_restored,
            versions_skipped = summary.versions_skipped,
            "Imported archive"
        );
        Ok(summary)
    }

    fn has_live_base(&self, parent_id: DocumentId, name: &str) -> bool {
        version_base(name)
            .and_then(|base| self.store.child_by_name(parent_id, base))
            .map(|live| !live.is_folder && !live.is_version)
            .unwrap_or(false)
    }

    fn resolve_parent(
        &self,
        target: &DocumentNode,
        target_path: &str,
        entry: &ArchiveEntry,
    ) -> DocumentResult<DocumentNode> {
        let parent = match &entry.path {
            None => self.store.document_by_id(target.id),
            Some(path) => self.store.document_from_path(&join_path(target_path, path)),
        };
        match parent {
            Some(parent) if parent.is_folder => Ok(parent),
            _ => {
                let described = match &entry.path {
                    Some(path) => format!("{}/{}", path, entry.name),
                    None => entry.name.clone(),
                };
                Err(DocumentError::MissingParent(described))
            }
        }
    }
}

/// Decompress and list every folder and file entry of an archive
pub fn read_entries(bytes: &[u8]) -> DocumentResult<Vec<ArchiveEntry>> {
    let tar_bytes = zstd::decode_all(Cursor::new(bytes))
        .map_err(|e| DocumentError::archive(format!("zstd decode: {}", e)))?;
    let mut archive = Archive::new(Cursor::new(tar_bytes));
    let mut entries = Vec::new();

    for item in archive
        .entries()
        .map_err(|e| DocumentError::archive(e.to_string()))?
    {
        let mut item = item.map_err(|e| DocumentError::archive(e.to_string()))?;
        let raw_path = item
            .path()
            .map_err(|e| DocumentError::archive(e.to_string()))?
            .to_string_lossy()
            .to_string();
        let entry_type = item.header().entry_type();

        let entry = if entry_type.is_dir() {
            ArchiveEntry::from_archive_path(&raw_path, EntryKind::Folder, Vec::new())?
        } else if entry_type.is_file() {
            let is_version = has_version_mark(&mut item)?;
            let mut data = Vec::new();
            item.read_to_end(&mut data)
                .map_err(|e| DocumentError::archive(format!("read {}: {}", raw_path, e)))?;
            let entry = ArchiveEntry::from_archive_path(&raw_path, EntryKind::File, data)?;
            if is_version {
                entry.as_version()
            } else {
                entry
            }
        } else {
            warn!(path = %raw_path, "Skipping unsupported archive entry type");
            continue;
        };
        debug!(path = %raw_path, folder = entry.is_folder(), "Read archive entry");
        entries.push(entry);
    }
    Ok(entries)
}

fn has_version_mark<R: Read>(item: &mut tar::Entry<'_, R>) -> DocumentResult<bool> {
    let extensions = match item
        .pax_extensions()
        .map_err(|e| DocumentError::archive(format!("pax header: {}", e)))?
    {
        Some(extensions) => extensions,
        None => return Ok(false),
    };
    for extension in extensions {
        let extension = extension.map_err(|e| DocumentError::archive(format!("pax header: {}", e)))?;
        if extension.key() == Ok(VERSION_PAX_KEY) {
            return Ok(extension.value_bytes() == b"1");
        }
    }
    Ok(false)
}

/// Path of `full` relative to `root`, without a leading separator
fn relative_path(full: &str, root: &str) -> String {
    let root = root.trim_end_matches(PATH_SEPARATOR);
    full.strip_prefix(root)
        .unwrap_or(full)
        .trim_start_matches(PATH_SEPARATOR)
        .to_string()
}

fn join_path(base: &str, relative: &str) -> String {
    format!("{}/{}", base.trim_end_matches(PATH_SEPARATOR), relative)
}
