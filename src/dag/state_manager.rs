// src/dag/state_manager.rs

//! Node state transitions for the scheduler.

use tracing::{debug, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::node::{DispatchedNode, NodeState};
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::errors::{Result, UpdateDagError};
use crate::types::EntityId;

/// What the dependencies of a node say about whether it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepsVerdict {
    /// Every in-batch dependency succeeded (or there are none).
    Satisfied,
    /// This dependency ended Failed or Skipped.
    Blocked(EntityId),
    /// This dependency has not reached a terminal state yet.
    Waiting(EntityId),
}

/// Applies state transitions to graph nodes and reports each one to the
/// diagnostics sink.
pub struct StateManager<'a> {
    graph: &'a mut DependencyGraph,
    sink: &'a dyn DiagnosticsSink,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a mut DependencyGraph, sink: &'a dyn DiagnosticsSink) -> Self {
        Self { graph, sink }
    }

    /// Move `id` to `to`, rejecting transitions the state machine forbids.
    pub fn transition(&mut self, id: EntityId, to: NodeState) -> Result<()> {
        let node = self
            .graph
            .node_mut(id)
            .ok_or(UpdateDagError::EntityNotFound(id))?;
        let from = node.transition(to)?;
        let kind = node.kind().clone();

        debug!(entity = %id, kind = %kind, %from, %to, "node state changed");
        self.sink
            .emit(DiagnosticEvent::NodeStateChanged { id, kind, from, to });
        Ok(())
    }

    /// Inspect the dependencies of `id` in ascending id order.
    ///
    /// The first dependency that failed or was skipped wins over one that is
    /// merely unfinished, so a blocked node is reported as blocked even if
    /// another of its dependencies is still running.
    pub fn deps_verdict(&self, id: EntityId) -> DepsVerdict {
        deps_verdict(&*self.graph, id)
    }

    pub fn state_of(&self, id: EntityId) -> Option<NodeState> {
        self.graph.state_of(id)
    }

    /// Dispatch record for a node about to be handed to a worker.
    pub fn dispatch_record(&self, id: EntityId, level: usize) -> Option<DispatchedNode> {
        self.graph
            .node(id)
            .map(|node| DispatchedNode::from_node(node, level))
    }

    /// Ids of every node still `Pending` or `Ready`.
    pub fn undispatched(&self) -> Vec<EntityId> {
        self.graph
            .nodes()
            .filter(|n| matches!(n.state(), NodeState::Pending | NodeState::Ready))
            .map(|n| n.id())
            .collect()
    }
}

/// Read-only dependency check shared with callers that only hold `&DependencyGraph`.
pub fn deps_verdict(graph: &DependencyGraph, id: EntityId) -> DepsVerdict {
    let mut waiting = None;
    for dep in graph.dependencies_of(id) {
        match graph.state_of(dep) {
            Some(NodeState::Succeeded) => {}
            Some(NodeState::Failed) | Some(NodeState::Skipped) => {
                return DepsVerdict::Blocked(dep);
            }
            Some(_) => {
                waiting.get_or_insert(dep);
            }
            None => {
                // Edges only point inside the arena; keep going if one doesn't.
                warn!(entity = %id, dependency = %dep, "dependency missing from graph");
            }
        }
    }

    match waiting {
        Some(dep) => DepsVerdict::Waiting(dep),
        None => DepsVerdict::Satisfied,
    }
}
