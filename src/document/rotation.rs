//! Version rotation policy
//!
//! Every overwrite of a live file first archives the previous content as a
//! sibling version node named `<name>_<n>`. Up to `MAX_VERSIONS` version nodes
//! are kept; once the cap is reached the least recently written one is
//! recycled in place.

use crate::error::StorageError;
use crate::store::MetadataStore;
use crate::types::{DocumentId, MAX_VERSIONS, VERSION_SEPARATOR};
use serde::{Deserialize, Serialize};

/// Where version nodes are visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPolicy {
    /// Mirror version records into the tree index
    #[serde(default = "default_true")]
    pub index_versions: bool,

    /// Include version nodes in fuzzy path search (needs `index_versions`)
    #[serde(default)]
    pub search_versions: bool,

    /// Include version nodes in archive exports (needs `index_versions`)
    #[serde(default)]
    pub export_versions: bool,
}

fn default_true() -> bool {
    true
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            index_versions: true,
            search_versions: false,
            export_versions: false,
        }
    }
}

impl VersionPolicy {
    /// Everything visible everywhere
    pub fn all_visible() -> Self {
        Self {
            index_versions: true,
            search_versions: true,
            export_versions: true,
        }
    }

    /// Version records stay out of the index entirely
    pub fn hidden() -> Self {
        Self {
            index_versions: false,
            search_versions: false,
            export_versions: false,
        }
    }
}

/// Name of the `suffix`-th version of `base_name`
pub fn version_name(base_name: &str, suffix: u32) -> String {
    format!("{}{}{}", base_name, VERSION_SEPARATOR, suffix)
}

/// Suffix of `name` if it names a version slot of `base_name`
pub fn version_suffix(base_name: &str, name: &str) -> Option<u32> {
    let rest = name.strip_prefix(base_name)?.strip_prefix(VERSION_SEPARATOR)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) || rest.starts_with('0') {
        return None;
    }
    let suffix: u32 = rest.parse().ok()?;
    (1..=MAX_VERSIONS).contains(&suffix).then_some(suffix)
}

/// How the previous content of a file gets archived
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationPlan {
    /// Below the cap: write a new version node with this suffix
    Append { suffix: u32, name: String },
    /// At the cap: overwrite this version node in place
    Recycle { id: DocumentId },
    /// Every slot name is held by a live sibling and no version exists to recycle
    NoFreeSlot,
}

/// Base name a version-slot name belongs to, if `name` has the `<base>_<n>` shape
pub fn version_base(name: &str) -> Option<&str> {
    let (base, _) = name.rsplit_once(VERSION_SEPARATOR)?;
    version_suffix(base, name).map(|_| base)
}

/// Decide how to archive the current content of `base_name` under `parent_id`
///
/// Below the cap the lowest suffix no sibling occupies is used. Live files
/// may hold slot names too, so the slot is picked from every sibling name,
/// not only from version records. When every slot name is taken the oldest
/// version is recycled.
pub fn plan_rotation(
    store: &dyn MetadataStore,
    parent_id: DocumentId,
    base_name: &str,
) -> Result<RotationPlan, StorageError> {
    let occupied: Vec<u32> = store
        .find_by_parent_id(Some(parent_id))?
        .iter()
        .filter_map(|record| version_suffix(base_name, &record.name))
        .collect();
    let count = store.count_sibling_versions(parent_id, base_name)?;
    if count < MAX_VERSIONS {
        if let Some(suffix) = (1..=MAX_VERSIONS).find(|n| !occupied.contains(n)) {
            return Ok(RotationPlan::Append {
                suffix,
                name: version_name(base_name, suffix),
            });
        }
    }

    match store.oldest_version_id(parent_id, base_name)? {
        Some(id) => Ok(RotationPlan::Recycle { id }),
        None => Ok(RotationPlan::NoFreeSlot),
    }
}
