// src/config/mod.rs

//! Configuration loading and validation for updatedag.
//!
//! - `model.rs`: the TOML-backed data model and the validated `ConfigFile`.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: `RawConfigFile -> ConfigFile` checks.
//! - `duration.rs`: `"100ms"`-style duration strings.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, parse_and_validate};
pub use model::{ConfigFile, ConfigSection, KindConfig, RawConfigFile, RetrySection};
