// src/engine/plan.rs

use std::sync::Arc;

use tracing::info;

use crate::dag::{order, DependencyGraph, Levels, Scheduler};
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::engine::{BatchOptions, CancelSignal, Runtime};
use crate::errors::{Result, UpdateDagError};
use crate::exec::{PersisterRegistry, ResolvedPersisters, UpdateExecutor};
use crate::types::PendingEntity;

/// A batch that passed every construction-time check and is safe to run.
///
/// Preparation never writes anything: a duplicate id, a dependency cycle or
/// a kind without a persister all abort here.
#[derive(Debug)]
pub struct BatchPlan {
    graph: DependencyGraph,
    levels: Levels,
    persisters: ResolvedPersisters,
}

impl BatchPlan {
    pub fn prepare(
        entities: impl IntoIterator<Item = PendingEntity>,
        registry: &PersisterRegistry,
        sink: &dyn DiagnosticsSink,
    ) -> Result<Self> {
        let graph = DependencyGraph::build(entities)?;

        let levels = match order(&graph) {
            Ok(levels) => levels,
            Err(UpdateDagError::Cycle { members, cycles }) => {
                sink.emit(DiagnosticEvent::CycleDetected {
                    members: members.clone(),
                    cycles: cycles.clone(),
                });
                return Err(UpdateDagError::Cycle { members, cycles });
            }
            Err(e) => return Err(e),
        };

        let persisters = registry.resolve(&graph)?;

        info!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            levels = levels.len(),
            external_references = graph.external_references(),
            "batch plan prepared"
        );

        Ok(Self {
            graph,
            levels,
            persisters,
        })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn levels(&self) -> &Levels {
        &self.levels
    }

    /// Hand the plan to a runtime that will execute it.
    pub fn into_runtime(
        self,
        options: BatchOptions,
        cancel: CancelSignal,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Runtime> {
        let scheduler = Scheduler::new(self.graph, self.levels, Arc::clone(&sink))?;
        let executor = UpdateExecutor::new(
            self.persisters,
            options.retry,
            Arc::clone(&sink),
            cancel.clone(),
        );
        Ok(Runtime::new(scheduler, executor, options, cancel, sink))
    }
}
