// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet};

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, KindConfig, RawConfigFile, RetrySection};
use crate::errors::{Result, UpdateDagError};
use crate::exec::{CommandSpec, RetryPolicy};
use crate::types::Kind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::UpdateDagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_kinds(&raw)?;
        validate_global_config(&raw)?;
        let retry = build_retry_policy(&raw.retry)?;

        let mut kinds = BTreeMap::new();
        for (name, kind_cfg) in raw.kind.iter() {
            let kind: Kind = name.parse()?;
            let spec = build_command_spec(name, kind_cfg)?;
            kinds.insert(kind, spec);
        }

        Ok(ConfigFile::new_unchecked(
            raw.config.max_concurrency,
            retry,
            kinds,
        ))
    }
}

fn ensure_has_kinds(cfg: &RawConfigFile) -> Result<()> {
    if cfg.kind.is_empty() {
        return Err(UpdateDagError::ConfigError(
            "config must contain at least one [kind.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_concurrency == 0 {
        return Err(UpdateDagError::ConfigError(
            "[config].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn build_retry_policy(section: &RetrySection) -> Result<RetryPolicy> {
    if section.max_attempts == 0 {
        return Err(UpdateDagError::ConfigError(
            "[retry].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    if !section.multiplier.is_finite() || section.multiplier < 1.0 {
        return Err(UpdateDagError::ConfigError(format!(
            "[retry].multiplier must be a finite number >= 1.0 (got {})",
            section.multiplier
        )));
    }

    let initial_backoff = parse_duration(&section.initial_backoff).map_err(|e| {
        UpdateDagError::ConfigError(format!("[retry].initial_backoff: {e}"))
    })?;
    let max_backoff = parse_duration(&section.max_backoff)
        .map_err(|e| UpdateDagError::ConfigError(format!("[retry].max_backoff: {e}")))?;

    if max_backoff < initial_backoff {
        return Err(UpdateDagError::ConfigError(format!(
            "[retry].max_backoff ({}) must not be shorter than initial_backoff ({})",
            section.max_backoff, section.initial_backoff
        )));
    }

    Ok(RetryPolicy {
        max_attempts: section.max_attempts,
        initial_backoff,
        max_backoff,
        multiplier: section.multiplier,
    })
}

fn build_command_spec(name: &str, cfg: &KindConfig) -> Result<CommandSpec> {
    if cfg.cmd.trim().is_empty() {
        return Err(UpdateDagError::ConfigError(format!(
            "kind '{}' has an empty `cmd`",
            name
        )));
    }

    let lists: [(&str, &Vec<i32>); 5] = [
        ("connectivity_exit_codes", &cfg.connectivity_exit_codes),
        ("lock_exit_codes", &cfg.lock_exit_codes),
        ("not_found_exit_codes", &cfg.not_found_exit_codes),
        ("validation_exit_codes", &cfg.validation_exit_codes),
        ("constraint_exit_codes", &cfg.constraint_exit_codes),
    ];

    // A code belongs to at most one class; 0 is always success.
    let mut seen: BTreeMap<i32, &str> = BTreeMap::new();
    for (list_name, codes) in lists {
        for code in codes.iter() {
            if *code == 0 {
                return Err(UpdateDagError::ConfigError(format!(
                    "kind '{}': exit code 0 means success and cannot appear in `{}`",
                    name, list_name
                )));
            }
            if let Some(other) = seen.insert(*code, list_name) {
                if other != list_name {
                    return Err(UpdateDagError::ConfigError(format!(
                        "kind '{}': exit code {} appears in both `{}` and `{}`",
                        name, code, other, list_name
                    )));
                }
            }
        }
    }

    let timeout = match cfg.timeout.as_deref() {
        Some(raw) => Some(parse_duration(raw).map_err(|e| {
            UpdateDagError::ConfigError(format!("kind '{}': invalid timeout: {e}", name))
        })?),
        None => None,
    };

    Ok(CommandSpec {
        cmd: cfg.cmd.clone(),
        connectivity_exit_codes: to_set(&cfg.connectivity_exit_codes),
        lock_exit_codes: to_set(&cfg.lock_exit_codes),
        not_found_exit_codes: to_set(&cfg.not_found_exit_codes),
        validation_exit_codes: to_set(&cfg.validation_exit_codes),
        constraint_exit_codes: to_set(&cfg.constraint_exit_codes),
        timeout,
    })
}

fn to_set(codes: &[i32]) -> BTreeSet<i32> {
    codes.iter().copied().collect()
}
