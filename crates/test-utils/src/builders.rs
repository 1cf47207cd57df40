#![allow(dead_code)]

use serde_json::Value;
use updatedag::types::{EntityId, Kind, PendingEntity};
use uuid::Uuid;

/// Deterministic id for a short test name (at most 16 bytes).
///
/// The name's bytes are left-aligned into the UUID, so ids sort the same
/// way the names do: `id_for("A") < id_for("B")`.
pub fn id_for(name: &str) -> EntityId {
    let bytes = name.as_bytes();
    assert!(
        !bytes.is_empty() && bytes.len() <= 16,
        "test entity name must be 1..=16 bytes: {name:?}"
    );
    let mut buf = [0u8; 16];
    buf[..bytes.len()].copy_from_slice(bytes);
    EntityId::from_uuid(Uuid::from_bytes(buf))
}

pub fn kind(name: &str) -> Kind {
    Kind::new(name).expect("valid test kind")
}

/// Builder for a single `PendingEntity`, addressed by test name.
pub struct EntityBuilder {
    entity: PendingEntity,
}

impl EntityBuilder {
    pub fn new(name: &str, kind_name: &str) -> Self {
        Self {
            entity: PendingEntity::new(id_for(name), kind(kind_name)),
        }
    }

    pub fn references(mut self, name: &str) -> Self {
        self.entity.references.insert(id_for(name));
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.entity.payload = payload;
        self
    }

    pub fn build(self) -> PendingEntity {
        self.entity
    }
}

/// Builder for a whole batch.
///
/// ```ignore
/// let batch = BatchBuilder::new()
///     .entity("A", "Customer", &[])
///     .entity("B", "Order", &["A"])
///     .build();
/// ```
#[derive(Default)]
pub struct BatchBuilder {
    entities: Vec<PendingEntity>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name` of `kind_name` referencing every name in `refs`.
    pub fn entity(mut self, name: &str, kind_name: &str, refs: &[&str]) -> Self {
        let mut builder = EntityBuilder::new(name, kind_name);
        for r in refs {
            builder = builder.references(r);
        }
        self.entities.push(builder.build());
        self
    }

    pub fn push(mut self, entity: PendingEntity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn build(self) -> Vec<PendingEntity> {
        self.entities
    }
}
