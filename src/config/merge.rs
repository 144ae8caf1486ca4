//! Source merging for `DoctreeConfig`.

pub mod service;

use crate::config::DoctreeConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the serialized defaults, the lowest-precedence layer.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&DoctreeConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
