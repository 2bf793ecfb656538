//! CLI command implementations.

pub mod build;
pub mod index;

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use moodlesite_core::Config;

/// Load the configuration file if one was given, otherwise use the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_with_env(path)
            .wrap_err_with(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}
