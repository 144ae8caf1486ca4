//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::DoctreeConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file and environment.
    pub fn load() -> Result<DoctreeConfig, ApiError> {
        Ok(MergeService::load()?)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<DoctreeConfig, ApiError> {
        Ok(MergeService::load_from_file(path)?)
    }

    /// Load from `path` when given, otherwise from the standard sources.
    pub fn load_optional(path: Option<&Path>) -> Result<DoctreeConfig, ApiError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    /// Render a configuration as TOML.
    pub fn to_toml(config: &DoctreeConfig) -> Result<String, ApiError> {
        toml::to_string_pretty(config)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e)))
    }
}
