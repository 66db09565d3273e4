//! CLI command implementations.

pub mod batch;
pub mod config;
pub mod process;

use std::path::Path;

use intake_core::IntakeConfig;

/// Load the configuration file if given, defaults otherwise.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<IntakeConfig> {
    match config_path {
        Some(path) => Ok(IntakeConfig::from_file(Path::new(path))?),
        None => Ok(IntakeConfig::default()),
    }
}
