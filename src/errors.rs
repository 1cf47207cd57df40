// src/errors.rs

//! Crate-wide error type and result alias.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::dag::NodeState;
use crate::types::{EntityId, Kind};

#[derive(Error, Debug)]
pub enum UpdateDagError {
    /// Two pending entities in one batch share an identity.
    #[error("duplicate entity in batch: {id}")]
    DuplicateEntity { id: EntityId },

    /// The in-batch dependency graph has no topological order.
    ///
    /// `members` is every node that could not be levelled (cycle members and
    /// everything downstream of them); `cycles` isolates the actual loops.
    #[error("dependency cycle detected among {} entities: {}", members.len(), join_ids(members))]
    Cycle {
        members: BTreeSet<EntityId>,
        cycles: Vec<Vec<EntityId>>,
    },

    /// A batch entity has a kind no persister is registered for.
    #[error("no persister registered for kind '{kind}' ({} entities)", entities.len())]
    UnknownKind {
        kind: Kind,
        entities: BTreeSet<EntityId>,
    },

    #[error("invalid state transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: EntityId,
        from: NodeState,
        to: NodeState,
    },

    #[error("entity {0} is not part of this batch")]
    EntityNotFound(EntityId),

    #[error("invalid entity id '{value}': {reason}")]
    InvalidEntityId { value: String, reason: String },

    #[error("invalid kind '{value}': {reason}")]
    InvalidKind { value: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_ids(ids: &BTreeSet<EntityId>) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, UpdateDagError>;
