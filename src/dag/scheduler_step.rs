// src/dag/scheduler_step.rs

//! Step-by-step result types for the scheduler.

use crate::dag::node::{DispatchedNode, NodeState};
use crate::dag::result::SkipReason;
use crate::types::EntityId;

/// Structured result of beginning a level.
#[derive(Debug, Clone)]
pub struct LevelStep {
    /// Index of the level that was started.
    pub index: usize,
    /// Nodes that became `Ready` and should be dispatched.
    pub ready: Vec<DispatchedNode>,
    /// Nodes that went straight to `Skipped`.
    pub skipped: Vec<(EntityId, SkipReason)>,
}

impl LevelStep {
    pub fn ready_ids(&self) -> Vec<EntityId> {
        self.ready.iter().map(|n| n.id).collect()
    }
}

/// Structured result of recording one executor outcome.
///
/// Useful for tests that step the scheduler by hand.
#[derive(Debug, Clone, Copy)]
pub struct CompletionStep {
    pub id: EntityId,
    /// Terminal state the node ended in.
    pub state: NodeState,
    /// Whether this completion made every node of its level terminal.
    pub level_finished: bool,
}
