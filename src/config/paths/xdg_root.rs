//! XDG Base Directory locations for doctree data and configuration.

use crate::error::ApiError;
use std::path::PathBuf;

const APP_DIR: &str = "doctree";

/// Get XDG data home directory
///
/// Returns `$XDG_DATA_HOME` if set, otherwise defaults to `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        if !xdg_data_home.is_empty() {
            return Some(PathBuf::from(xdg_data_home));
        }
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }

    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;

    Ok(PathBuf::from(home).join(".config"))
}

/// Default sled directory: `$XDG_DATA_HOME/doctree/store`
///
/// Falls back to the platform data directory when no XDG variables resolve.
pub fn default_store_dir() -> Result<PathBuf, ApiError> {
    if let Some(data_home) = data_home() {
        return Ok(data_home.join(APP_DIR).join("store"));
    }
    let project_dirs = directories::ProjectDirs::from("", APP_DIR, APP_DIR).ok_or_else(|| {
        ApiError::ConfigError("Could not determine platform data directory".to_string())
    })?;
    Ok(project_dirs.data_dir().join("store"))
}

/// Global configuration file: `$XDG_CONFIG_HOME/doctree/config.toml`
pub fn global_config_path() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join(APP_DIR).join("config.toml"))
}
