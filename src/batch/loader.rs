// src/batch/loader.rs

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::errors::{Result, UpdateDagError};
use crate::types::{EntityId, Kind, PendingEntity};

/// On-disk file format of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFormat {
    Toml,
    Json,
}

impl BatchFormat {
    /// Pick the format from the file extension (`.toml` or `.json`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("toml") => Ok(BatchFormat::Toml),
            Some("json") => Ok(BatchFormat::Json),
            _ => Err(UpdateDagError::ConfigError(format!(
                "batch file '{}' must have a .toml or .json extension",
                path.display()
            ))),
        }
    }
}

/// One entity as written in a batch file, before id/kind validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEntity {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TryFrom<RawEntity> for PendingEntity {
    type Error = UpdateDagError;

    fn try_from(raw: RawEntity) -> std::result::Result<Self, Self::Error> {
        let id: EntityId = raw.id.parse()?;
        let kind: Kind = raw.kind.parse()?;
        let references = raw
            .references
            .iter()
            .map(|r| r.parse::<EntityId>())
            .collect::<Result<_>>()?;

        Ok(PendingEntity {
            id,
            kind,
            payload: raw.payload,
            references,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBatch {
    #[serde(default)]
    entity: Vec<RawEntity>,
}

/// Load a batch file. Entities are returned in file order; duplicate ids are
/// left for graph construction to reject.
pub fn load_batch(path: impl AsRef<Path>) -> Result<Vec<PendingEntity>> {
    let path = path.as_ref();
    let format = BatchFormat::from_path(path)?;
    let contents = fs::read_to_string(path)?;

    let entities = match format {
        BatchFormat::Toml => parse_toml_batch(&contents)?,
        BatchFormat::Json => parse_json_batch(&contents)?,
    };

    debug!(path = %path.display(), ?format, entities = entities.len(), "batch file loaded");
    Ok(entities)
}

pub fn parse_toml_batch(contents: &str) -> Result<Vec<PendingEntity>> {
    let raw: TomlBatch = toml::from_str(contents)?;
    into_entities(raw.entity)
}

pub fn parse_json_batch(contents: &str) -> Result<Vec<PendingEntity>> {
    let raw: Vec<RawEntity> = serde_json::from_str(contents)?;
    into_entities(raw)
}

fn into_entities(raw: Vec<RawEntity>) -> Result<Vec<PendingEntity>> {
    raw.into_iter().map(PendingEntity::try_from).collect()
}
