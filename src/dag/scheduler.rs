use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::node::{DispatchedNode, NodeState};
use crate::dag::order::{order, Levels};
use crate::dag::result::{BatchResult, SkipReason};
use crate::dag::scheduler_step::{CompletionStep, LevelStep};
use crate::dag::state_manager::{DepsVerdict, StateManager};
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::errors::{Result, UpdateDagError};
use crate::exec::{ApplyOutcome, FailureCause};
use crate::types::EntityId;

/// Scheduler owns the batch graph plus its level plan and drives the
/// per-node state machine.
///
/// It is responsible for:
/// - starting levels in order and deciding which nodes are ready
/// - skipping nodes whose dependencies did not succeed
/// - recording executor outcomes
/// - skipping everything undispatched when the batch is cancelled
///
/// It performs no IO and holds no async types; the async driver in
/// [`crate::engine::Runtime`] is its only writer.
pub struct Scheduler {
    graph: DependencyGraph,
    levels: Levels,
    next_level: usize,
    failures: BTreeMap<EntityId, FailureCause>,
    skips: BTreeMap<EntityId, SkipReason>,
    cancelled: bool,
    sink: Arc<dyn DiagnosticsSink>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("graph", &self.graph)
            .field("levels", &self.levels)
            .field("next_level", &self.next_level)
            .field("cancelled", &self.cancelled)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Construct a scheduler from a graph and the levels computed for it.
    pub fn new(
        graph: DependencyGraph,
        levels: Levels,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self> {
        if levels.total_nodes() != graph.len() || graph.ids().any(|id| levels.level_of(id).is_none())
        {
            return Err(UpdateDagError::Other(anyhow!(
                "level plan covers {} nodes but the graph has {}",
                levels.total_nodes(),
                graph.len()
            )));
        }

        Ok(Self {
            graph,
            levels,
            next_level: 0,
            failures: BTreeMap::new(),
            skips: BTreeMap::new(),
            cancelled: false,
            sink,
        })
    }

    /// Order `graph` and construct a scheduler for it in one go.
    pub fn plan(graph: DependencyGraph, sink: Arc<dyn DiagnosticsSink>) -> Result<Self> {
        let levels = order(&graph)?;
        Self::new(graph, levels, sink)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn levels(&self) -> &Levels {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn state_of(&self, id: EntityId) -> Option<NodeState> {
        self.graph.state_of(id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether every node has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.graph.nodes().all(|n| n.state().is_terminal())
    }

    /// Whether every node of level `index` is terminal.
    pub fn level_complete(&self, index: usize) -> bool {
        self.levels
            .get(index)
            .map(|ids| {
                ids.iter()
                    .all(|id| self.state_of(*id).is_some_and(NodeState::is_terminal))
            })
            .unwrap_or(true)
    }

    /// `(succeeded, failed, skipped)` counts for level `index`.
    pub fn level_counts(&self, index: usize) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for id in self.levels.get(index).unwrap_or(&[]) {
            match self.state_of(*id) {
                Some(NodeState::Succeeded) => counts.0 += 1,
                Some(NodeState::Failed) => counts.1 += 1,
                Some(NodeState::Skipped) => counts.2 += 1,
                _ => {}
            }
        }
        counts
    }

    /// Begin the next level, if any.
    ///
    /// Every `Pending` node of the level becomes `Ready` when all of its
    /// dependencies succeeded, and `Skipped` when any of them failed or was
    /// skipped. After a cancellation every remaining node is skipped.
    pub fn begin_next_level(&mut self) -> Result<Option<LevelStep>> {
        let index = self.next_level;
        let ids = match self.levels.get(index) {
            Some(ids) => ids.to_vec(),
            None => return Ok(None),
        };
        self.next_level += 1;

        let mut ready = Vec::new();
        let mut skipped = Vec::new();
        let mut manager = StateManager::new(&mut self.graph, self.sink.as_ref());

        for id in ids {
            if manager.state_of(id) != Some(NodeState::Pending) {
                // Already settled by a cancellation.
                continue;
            }

            if self.cancelled {
                manager.transition(id, NodeState::Skipped)?;
                self.skips.insert(id, SkipReason::Cancelled);
                skipped.push((id, SkipReason::Cancelled));
                continue;
            }

            match manager.deps_verdict(id) {
                DepsVerdict::Satisfied => {
                    manager.transition(id, NodeState::Ready)?;
                    if let Some(record) = manager.dispatch_record(id, index) {
                        ready.push(record);
                    }
                }
                DepsVerdict::Blocked(dependency) => {
                    info!(
                        entity = %id,
                        dependency = %dependency,
                        "dependency did not succeed; skipping node"
                    );
                    manager.transition(id, NodeState::Skipped)?;
                    let reason = SkipReason::UpstreamFailed { dependency };
                    self.skips.insert(id, reason.clone());
                    skipped.push((id, reason));
                }
                DepsVerdict::Waiting(dependency) => {
                    return Err(UpdateDagError::Other(anyhow!(
                        "dependency {dependency} of {id} is not terminal at the start of level {index}"
                    )));
                }
            }
        }

        debug!(
            level = index,
            ready = ready.len(),
            skipped = skipped.len(),
            "level started"
        );
        self.sink.emit(DiagnosticEvent::LevelStarted {
            index,
            ready: ready.len(),
            skipped: skipped.len(),
        });

        Ok(Some(LevelStep {
            index,
            ready,
            skipped,
        }))
    }

    /// Record that `id` was handed to a worker.
    pub fn mark_in_progress(&mut self, id: EntityId) -> Result<()> {
        StateManager::new(&mut self.graph, self.sink.as_ref())
            .transition(id, NodeState::InProgress)
    }

    /// Record the executor's outcome for an in-progress node.
    ///
    /// A `TransientError` reaching the scheduler means the executor applied
    /// no retry policy; it is recorded as a failure like a permanent one.
    pub fn complete(&mut self, id: EntityId, outcome: ApplyOutcome) -> Result<CompletionStep> {
        let mut manager = StateManager::new(&mut self.graph, self.sink.as_ref());

        let state = match outcome {
            ApplyOutcome::Success { attempts } => {
                manager.transition(id, NodeState::Succeeded)?;
                debug!(entity = %id, attempts, "node write committed");
                NodeState::Succeeded
            }
            ApplyOutcome::PermanentError(cause) | ApplyOutcome::TransientError(cause) => {
                manager.transition(id, NodeState::Failed)?;
                warn!(
                    entity = %id,
                    class = %cause.class,
                    attempts = cause.attempts,
                    error = %cause.message,
                    dependents = self.graph.dependents_of(id).count(),
                    "node write failed; dependents will be skipped"
                );
                self.failures.insert(id, cause);
                NodeState::Failed
            }
        };

        let level_finished = self
            .levels
            .level_of(id)
            .is_some_and(|index| self.level_complete(index));

        Ok(CompletionStep {
            id,
            state,
            level_finished,
        })
    }

    /// Stop the batch: every node not yet handed to a worker becomes
    /// `Skipped` with a cancellation cause. In-progress and terminal nodes
    /// are left alone.
    ///
    /// Returns the ids that were skipped by this call.
    pub fn cancel_undispatched(&mut self) -> Result<Vec<EntityId>> {
        self.cancelled = true;

        let mut manager = StateManager::new(&mut self.graph, self.sink.as_ref());
        let undispatched = manager.undispatched();
        for id in undispatched.iter() {
            manager.transition(*id, NodeState::Skipped)?;
            self.skips.insert(*id, SkipReason::Cancelled);
        }

        if !undispatched.is_empty() {
            info!(
                undispatched = undispatched.len(),
                "batch cancelled; remaining nodes skipped"
            );
        }
        self.sink.emit(DiagnosticEvent::BatchCancelled {
            undispatched: undispatched.len(),
        });

        Ok(undispatched)
    }

    /// Consume the scheduler and produce the itemized batch result.
    pub fn into_result(self) -> BatchResult {
        let succeeded = self
            .graph
            .nodes()
            .filter(|n| n.state() == NodeState::Succeeded)
            .map(|n| n.id())
            .collect();

        BatchResult {
            succeeded,
            failed: self.failures,
            skipped: self.skips,
            cancelled: self.cancelled,
        }
    }
}
