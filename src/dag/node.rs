// src/dag/node.rs

//! Per-entity node state and the dispatch record handed to the executor.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::errors::{Result, UpdateDagError};
use crate::types::{EntityId, Kind, PendingEntity};

/// Lifecycle state of one node within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Waiting for its level to begin.
    Pending,
    /// All dependencies succeeded; waiting for a worker.
    Ready,
    /// Owned by exactly one in-flight executor call.
    InProgress,
    Succeeded,
    Failed,
    /// Never executed: a dependency did not succeed, or the batch was cancelled.
    Skipped,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Succeeded | NodeState::Failed | NodeState::Skipped
        )
    }

    /// Whether the scheduler may move a node from `self` to `to`.
    ///
    /// `Ready -> Skipped` only happens when a cancellation arrives before the
    /// node was handed to a worker.
    pub fn can_transition_to(self, to: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, to),
            (Pending, Ready)
                | (Pending, Skipped)
                | (Ready, InProgress)
                | (Ready, Skipped)
                | (InProgress, Succeeded)
                | (InProgress, Failed)
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Pending => "pending",
            NodeState::Ready => "ready",
            NodeState::InProgress => "in-progress",
            NodeState::Succeeded => "succeeded",
            NodeState::Failed => "failed",
            NodeState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Working representation of one pending entity inside the graph arena.
///
/// Edges are entity ids resolved against the same arena; nodes never hold
/// references to each other.
#[derive(Debug, Clone)]
pub struct UpdateNode {
    entity: Arc<PendingEntity>,
    /// In-batch entities this node must wait for.
    pub(crate) deps: BTreeSet<EntityId>,
    /// In-batch entities waiting for this node.
    pub(crate) dependents: BTreeSet<EntityId>,
    pub(crate) state: NodeState,
}

impl UpdateNode {
    pub(crate) fn new(entity: PendingEntity) -> Self {
        Self {
            entity: Arc::new(entity),
            deps: BTreeSet::new(),
            dependents: BTreeSet::new(),
            state: NodeState::Pending,
        }
    }

    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    pub fn kind(&self) -> &Kind {
        &self.entity.kind
    }

    pub fn entity(&self) -> &Arc<PendingEntity> {
        &self.entity
    }

    pub fn dependencies(&self) -> &BTreeSet<EntityId> {
        &self.deps
    }

    pub fn dependents(&self) -> &BTreeSet<EntityId> {
        &self.dependents
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Move to `to`, returning the previous state.
    pub(crate) fn transition(&mut self, to: NodeState) -> Result<NodeState> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(UpdateDagError::InvalidTransition {
                id: self.id(),
                from,
                to,
            });
        }
        self.state = to;
        Ok(from)
    }
}

/// A node the scheduler wants the executor to write now.
///
/// Carries a shared, read-only handle to the entity so workers never touch
/// the graph itself.
#[derive(Debug, Clone)]
pub struct DispatchedNode {
    pub id: EntityId,
    pub kind: Kind,
    pub entity: Arc<PendingEntity>,
    /// Index of the level this node belongs to.
    pub level: usize,
}

impl DispatchedNode {
    pub fn from_node(node: &UpdateNode, level: usize) -> Self {
        Self {
            id: node.id(),
            kind: node.kind().clone(),
            entity: Arc::clone(node.entity()),
            level,
        }
    }
}
