// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::dag::node::{NodeState, UpdateNode};
use crate::errors::{Result, UpdateDagError};
use crate::types::{EntityId, Kind, PendingEntity};

/// In-memory dependency graph for one batch, keyed by entity id.
///
/// All nodes live in a single arena; edges are ids looked up in that arena.
/// Only references to other entities of the same batch become edges: the
/// batch orders the work it is responsible for and nothing else.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: BTreeMap<EntityId, UpdateNode>,
    external_references: usize,
}

impl DependencyGraph {
    /// Build the graph from the pending-update set.
    ///
    /// Fails with [`UpdateDagError::DuplicateEntity`] if two entities share an
    /// id, whether or not they are otherwise identical.
    pub fn build(entities: impl IntoIterator<Item = PendingEntity>) -> Result<Self> {
        let mut nodes: BTreeMap<EntityId, UpdateNode> = BTreeMap::new();

        // First pass: one node per entity.
        for entity in entities {
            let id = entity.id;
            if nodes.contains_key(&id) {
                return Err(UpdateDagError::DuplicateEntity { id });
            }
            nodes.insert(id, UpdateNode::new(entity));
        }

        // Second pass: resolve references against the arena.
        let mut edges: Vec<(EntityId, EntityId)> = Vec::new();
        let mut external_references = 0usize;
        for (id, node) in nodes.iter() {
            for reference in node.entity().references.iter() {
                if nodes.contains_key(reference) {
                    edges.push((*id, *reference));
                } else {
                    external_references += 1;
                }
            }
        }

        for (from, to) in edges {
            if let Some(node) = nodes.get_mut(&from) {
                node.deps.insert(to);
            }
            if let Some(dep) = nodes.get_mut(&to) {
                dep.dependents.insert(from);
            }
        }

        debug!(
            nodes = nodes.len(),
            external_references, "dependency graph built"
        );

        Ok(Self {
            nodes,
            external_references,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All entity ids, in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &UpdateNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: EntityId) -> Option<&UpdateNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: EntityId) -> Option<&mut UpdateNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// In-batch dependencies of `id` (empty for unknown ids).
    pub fn dependencies_of(&self, id: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|n| n.deps.iter().copied())
    }

    /// In-batch dependents of `id` (empty for unknown ids).
    pub fn dependents_of(&self, id: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|n| n.dependents.iter().copied())
    }

    pub fn state_of(&self, id: EntityId) -> Option<NodeState> {
        self.nodes.get(&id).map(|n| n.state)
    }

    /// Distinct kinds present in the batch.
    pub fn kinds(&self) -> BTreeSet<&Kind> {
        self.nodes.values().map(|n| n.kind()).collect()
    }

    pub fn ids_of_kind(&self, kind: &Kind) -> BTreeSet<EntityId> {
        self.nodes
            .values()
            .filter(|n| n.kind() == kind)
            .map(|n| n.id())
            .collect()
    }

    /// Number of references that pointed outside the batch and were dropped.
    pub fn external_references(&self) -> usize {
        self.external_references
    }

    /// Total number of in-batch dependency edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.deps.len()).sum()
    }
}
