// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Config, RawConfig};
use crate::errors::Result;

/// Load a configuration file and return the raw, unvalidated `RawConfig`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file and validate it.
///
/// - Reads TOML and applies defaults.
/// - Rejects an empty or non-table `[cases]` and malformed case
///   descriptors before anything is dispatched.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let raw = load_from_path(path)?;
    Config::try_from(raw)
}

/// The fixed configuration path used when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("configs/host.toml")
}
