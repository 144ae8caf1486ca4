//! Configuration
//!
//! Layered configuration built with the `config` crate: built-in defaults,
//! then the global TOML file, then an explicit file, then `DOCTREE__*`
//! environment variables.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod storage_paths;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use storage_paths::{StorageBackend, StorageConfig};

use crate::archive::ArchiveConfig;
use crate::document::VersionPolicy;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level doctree configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctreeConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Where version nodes show up (index, search, export)
    #[serde(default)]
    pub versions: VersionPolicy,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}
