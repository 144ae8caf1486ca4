//! TOML file sources: the optional global file and an explicit file.

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;

/// Add `$XDG_CONFIG_HOME/doctree/config.toml` if it exists.
pub fn add_global_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match xdg::global_config_path() {
        Ok(path) if path.exists() => add_file_to_builder(builder, &path),
        _ => Ok(builder),
    }
}

/// Add a required TOML file.
pub fn add_file_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let name = path.to_str().ok_or_else(|| {
        ConfigError::Message(format!("config path is not valid UTF-8: {:?}", path))
    })?;
    Ok(builder.add_source(File::new(name, FileFormat::Toml).required(true)))
}
