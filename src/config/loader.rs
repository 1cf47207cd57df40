// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file and return the raw `RawConfigFile`.
///
/// Only TOML deserialization happens here; see [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Parse configuration from an in-memory TOML string and validate it.
pub fn parse_and_validate(contents: &str) -> Result<ConfigFile> {
    let raw: RawConfigFile = toml::from_str(contents)?;
    ConfigFile::try_from(raw)
}

/// Load a configuration file from path and validate it.
///
/// Checks, in order:
/// - at least one `[kind.<name>]` section,
/// - `max_concurrency >= 1`,
/// - retry bounds and duration syntax,
/// - per-kind commands and exit-code lists.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `Updatedag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Updatedag.toml")
}
