// src/engine/mod.rs

//! Orchestration engine for updatedag.
//!
//! This module ties together:
//! - batch preparation (graph, level plan, persister resolution)
//! - the async runtime that walks the levels, dispatches ready nodes to a
//!   bounded pool of workers and feeds their completions back into the
//!   scheduler
//! - batch cancellation
//!
//! The pure state machine lives in [`crate::dag::Scheduler`]; the async/IO
//! shell is implemented in [`runtime`].

use std::sync::Arc;

use crate::config::ConfigFile;
use crate::dag::BatchResult;
use crate::diagnostics::DiagnosticsSink;
use crate::errors::Result;
use crate::exec::{ApplyOutcome, PersisterRegistry, RetryPolicy};
use crate::types::{EntityId, PendingEntity};

pub mod cancel;
pub mod plan;
pub mod runtime;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use plan::BatchPlan;
pub use runtime::Runtime;

/// Options for running one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchOptions {
    /// Maximum number of in-flight writes, usually the connection-pool size.
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

impl BatchOptions {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            max_concurrency: cfg.max_concurrency(),
            retry: *cfg.retry(),
        }
    }
}

/// Events flowing from executor workers back into the runtime.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A worker finished applying a node.
    NodeCompleted { id: EntityId, outcome: ApplyOutcome },
}

/// Prepare and run a batch in one call.
///
/// Construction errors (duplicate ids, cycles, kinds without a persister)
/// are returned before anything is written. Once writes begin the batch
/// always runs to completion and every node's outcome is itemized in the
/// returned [`BatchResult`].
pub async fn apply_batch(
    entities: impl IntoIterator<Item = PendingEntity>,
    registry: &PersisterRegistry,
    options: BatchOptions,
    cancel: CancelSignal,
    sink: Arc<dyn DiagnosticsSink>,
) -> Result<BatchResult> {
    let plan = BatchPlan::prepare(entities, registry, sink.as_ref())?;
    plan.into_runtime(options, cancel, sink)?.run().await
}
