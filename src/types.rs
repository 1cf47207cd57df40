// src/types.rs

//! Entity identity and the pending-update record handed to the engine.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::UpdateDagError;

/// Globally unique identity of an entity.
///
/// Ordering follows the underlying UUID bytes and is used wherever the engine
/// needs a stable tie-break (level contents, logging, skip causes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Fresh random identity.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = UpdateDagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(EntityId)
            .map_err(|e| UpdateDagError::InvalidEntityId {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Category tag selecting which persistence operation applies to an entity.
///
/// The set of valid kinds is whatever the persister registry knows about;
/// a batch mentioning any other kind is rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Kind(String);

impl Kind {
    pub fn new(name: impl Into<String>) -> Result<Self, UpdateDagError> {
        let name = name.into();
        if name.is_empty() {
            return Err(UpdateDagError::InvalidKind {
                value: name,
                reason: "kind must not be empty".to_string(),
            });
        }
        if name.chars().any(char::is_whitespace) {
            return Err(UpdateDagError::InvalidKind {
                value: name,
                reason: "kind must not contain whitespace".to_string(),
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Kind {
    type Error = UpdateDagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Kind::new(value)
    }
}

impl From<Kind> for String {
    fn from(kind: Kind) -> Self {
        kind.0
    }
}

impl FromStr for Kind {
    type Err = UpdateDagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::new(s)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of pending work as supplied by the caller.
///
/// `payload` is opaque to the engine; only the persister for `kind` looks
/// inside it. `references` lists every entity this one points at, whether or
/// not those entities are part of the same batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntity {
    pub id: EntityId,
    pub kind: Kind,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub references: BTreeSet<EntityId>,
}

impl PendingEntity {
    pub fn new(id: EntityId, kind: Kind) -> Self {
        Self {
            id,
            kind,
            payload: serde_json::Value::Null,
            references: BTreeSet::new(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_reference(mut self, id: EntityId) -> Self {
        self.references.insert(id);
        self
    }

    pub fn with_references(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.references.extend(ids);
        self
    }
}
