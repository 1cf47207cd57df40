// src/dag/order.rs

//! Kahn-style levelling of the dependency graph.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::dag::graph::DependencyGraph;
use crate::errors::{Result, UpdateDagError};
use crate::types::EntityId;

/// Safe processing order for a batch.
///
/// Every node's dependencies sit in strictly earlier levels. Nodes inside a
/// level are mutually independent; each level is sorted by entity id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Levels {
    levels: Vec<Vec<EntityId>>,
    level_of: BTreeMap<EntityId, usize>,
}

impl Levels {
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[EntityId]> {
        self.levels.get(index).map(|l| l.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &[EntityId]> {
        self.levels.iter().map(|l| l.as_slice())
    }

    /// Index of the level containing `id`.
    pub fn level_of(&self, id: EntityId) -> Option<usize> {
        self.level_of.get(&id).copied()
    }

    pub fn total_nodes(&self) -> usize {
        self.level_of.len()
    }

    pub fn as_slices(&self) -> &[Vec<EntityId>] {
        &self.levels
    }
}

/// Compute the level partition of `graph`, or report the cycle.
///
/// Repeatedly takes every node whose in-batch dependencies have all been
/// levelled. If nodes remain but none is free, all remaining nodes are
/// reported as cycle-involved; the `cycles` field of the error isolates the
/// strongly connected components that actually loop.
pub fn order(graph: &DependencyGraph) -> Result<Levels> {
    let mut remaining: BTreeMap<EntityId, usize> = graph
        .nodes()
        .map(|n| (n.id(), n.dependencies().len()))
        .collect();

    let mut levels: Vec<Vec<EntityId>> = Vec::new();
    let mut level_of: BTreeMap<EntityId, usize> = BTreeMap::new();

    while !remaining.is_empty() {
        let level: Vec<EntityId> = remaining
            .iter()
            .filter(|(_, in_degree)| **in_degree == 0)
            .map(|(id, _)| *id)
            .collect();

        if level.is_empty() {
            let members: BTreeSet<EntityId> = remaining.keys().copied().collect();
            let cycles = find_cycles(graph, &members);
            warn!(
                remaining = members.len(),
                cycles = cycles.len(),
                "no node is free of dependencies; batch has a dependency cycle"
            );
            return Err(UpdateDagError::Cycle { members, cycles });
        }

        let index = levels.len();
        for id in level.iter() {
            remaining.remove(id);
            level_of.insert(*id, index);
            for dependent in graph.dependents_of(*id) {
                if let Some(in_degree) = remaining.get_mut(&dependent) {
                    *in_degree = in_degree.saturating_sub(1);
                }
            }
        }

        debug!(level = index, size = level.len(), "level computed");
        levels.push(level);
    }

    Ok(Levels { levels, level_of })
}

/// Strongly connected components of the subgraph induced by `members` that
/// form real loops (more than one node, or a node referencing itself).
fn find_cycles(graph: &DependencyGraph, members: &BTreeSet<EntityId>) -> Vec<Vec<EntityId>> {
    // Edge direction: dependency -> dependent.
    let mut sub: DiGraphMap<EntityId, ()> = DiGraphMap::new();
    for id in members.iter() {
        sub.add_node(*id);
    }
    for id in members.iter() {
        for dep in graph.dependencies_of(*id) {
            if members.contains(&dep) {
                sub.add_edge(dep, *id, ());
            }
        }
    }

    let mut cycles: Vec<Vec<EntityId>> = tarjan_scc(&sub)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || component.iter().any(|n| sub.contains_edge(*n, *n))
        })
        .map(|mut component| {
            component.sort();
            component
        })
        .collect();
    cycles.sort();
    cycles
}
