//! MergeService: orchestrates sources, applies precedence, deserializes to DoctreeConfig.

use crate::config::merge::builder_with_defaults;
use crate::config::sources::{environment, file};
use crate::config::DoctreeConfig;
use config::ConfigError;
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from standard sources.
    /// Precedence: defaults (lowest) -> global file -> environment (highest).
    pub fn load() -> Result<DoctreeConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = file::add_global_to_builder(builder)?;
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }

    /// Load config from a specific file layered over the global file.
    /// The file must exist; environment variables still win.
    pub fn load_from_file(path: &Path) -> Result<DoctreeConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = file::add_global_to_builder(builder)?;
        let builder = file::add_file_to_builder(builder, path)?;
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }
}
