// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::exec::{CommandSpec, RetryPolicy};
use crate::types::Kind;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// max_concurrency = 8
///
/// [retry]
/// max_attempts = 4
/// initial_backoff = "100ms"
/// max_backoff = "5s"
/// multiplier = 2.0
///
/// [kind.Customer]
/// cmd = "sqlcmd -b -Q \"exec dbo.UpdateCustomer\""
/// connectivity_exit_codes = [75]
/// timeout = "30s"
/// ```
///
/// `[config]` and `[retry]` are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub retry: RetrySection,

    /// All kinds from `[kind.<name>]`, keyed by kind name.
    #[serde(default)]
    pub kind: BTreeMap<String, KindConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Maximum number of writes in flight at once; should not exceed the
    /// connection-pool size of the store.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// `[retry]` section. Durations use the `<n>ms|s|m|h` syntax.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: String,

    #[serde(default = "default_max_backoff")]
    pub max_backoff: String,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff() -> String {
    "100ms".to_string()
}

fn default_max_backoff() -> String {
    "5s".to_string()
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            multiplier: default_multiplier(),
        }
    }
}

/// `[kind.<name>]` section: the persistence command for one kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindConfig {
    /// Shell command run once per entity of this kind.
    pub cmd: String,

    /// Exit codes meaning the store was unreachable (transient).
    #[serde(default = "default_connectivity_exit_codes")]
    pub connectivity_exit_codes: Vec<i32>,

    /// Exit codes meaning lock contention or deadlock (transient).
    #[serde(default)]
    pub lock_exit_codes: Vec<i32>,

    #[serde(default = "default_not_found_exit_codes")]
    pub not_found_exit_codes: Vec<i32>,

    #[serde(default = "default_validation_exit_codes")]
    pub validation_exit_codes: Vec<i32>,

    #[serde(default)]
    pub constraint_exit_codes: Vec<i32>,

    /// Optional per-call time limit, e.g. `"30s"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_connectivity_exit_codes() -> Vec<i32> {
    vec![75]
}

fn default_not_found_exit_codes() -> Vec<i32> {
    vec![66]
}

fn default_validation_exit_codes() -> Vec<i32> {
    vec![65]
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    max_concurrency: usize,
    retry: RetryPolicy,
    kinds: BTreeMap<Kind, CommandSpec>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        max_concurrency: usize,
        retry: RetryPolicy,
        kinds: BTreeMap<Kind, CommandSpec>,
    ) -> Self {
        Self {
            max_concurrency,
            retry,
            kinds,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Override `max_concurrency` (e.g. from the CLI). Values below 1 are
    /// raised to 1.
    pub fn set_max_concurrency(&mut self, value: usize) {
        self.max_concurrency = value.max(1);
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn kinds(&self) -> impl Iterator<Item = (&Kind, &CommandSpec)> {
        self.kinds.iter()
    }

    pub fn command_for(&self, kind: &Kind) -> Option<&CommandSpec> {
        self.kinds.get(kind)
    }
}
