// src/diagnostics.rs

//! Structured diagnostics emitted by the engine.
//!
//! The engine never formats log text for its collaborators. It hands
//! [`DiagnosticEvent`]s to a [`DiagnosticsSink`]; what happens to them is up
//! to the sink. [`TracingSink`] forwards them to `tracing` with structured
//! fields, [`NullSink`] drops them.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::dag::{BatchSummary, NodeState};
use crate::exec::ErrorClass;
use crate::types::{EntityId, Kind};

/// One structured event from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    NodeStateChanged {
        id: EntityId,
        kind: Kind,
        from: NodeState,
        to: NodeState,
    },
    /// A transient failure will be retried after `delay`.
    RetryScheduled {
        id: EntityId,
        kind: Kind,
        /// The attempt that just failed (1-based).
        attempt: u32,
        delay: Duration,
        class: ErrorClass,
        message: String,
    },
    CycleDetected {
        members: BTreeSet<EntityId>,
        cycles: Vec<Vec<EntityId>>,
    },
    LevelStarted {
        index: usize,
        ready: usize,
        skipped: usize,
    },
    LevelFinished {
        index: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
    BatchCancelled {
        undispatched: usize,
    },
    BatchFinished {
        summary: BatchSummary,
    },
}

/// Receiver of engine diagnostics.
///
/// Called from the scheduler loop and from executor workers, so
/// implementations must be cheap and thread-safe.
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn emit(&self, _event: DiagnosticEvent) {}
}

/// Forwards events to `tracing` as structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::NodeStateChanged { id, kind, from, to } => match to {
                NodeState::Failed => {
                    warn!(target: "updatedag::diagnostics", entity = %id, kind = %kind, %from, %to, "node state changed")
                }
                _ => {
                    debug!(target: "updatedag::diagnostics", entity = %id, kind = %kind, %from, %to, "node state changed")
                }
            },
            DiagnosticEvent::RetryScheduled {
                id,
                kind,
                attempt,
                delay,
                class,
                message,
            } => {
                warn!(
                    target: "updatedag::diagnostics",
                    entity = %id,
                    kind = %kind,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    class = %class,
                    error = %message,
                    "transient failure; retrying"
                );
            }
            DiagnosticEvent::CycleDetected { members, cycles } => {
                error!(
                    target: "updatedag::diagnostics",
                    members = ?members,
                    cycles = ?cycles,
                    "dependency cycle detected; batch aborted before any write"
                );
            }
            DiagnosticEvent::LevelStarted {
                index,
                ready,
                skipped,
            } => {
                info!(target: "updatedag::diagnostics", level = index, ready, skipped, "level started");
            }
            DiagnosticEvent::LevelFinished {
                index,
                succeeded,
                failed,
                skipped,
            } => {
                info!(
                    target: "updatedag::diagnostics",
                    level = index,
                    succeeded,
                    failed,
                    skipped,
                    "level finished"
                );
            }
            DiagnosticEvent::BatchCancelled { undispatched } => {
                warn!(target: "updatedag::diagnostics", undispatched, "batch cancelled");
            }
            DiagnosticEvent::BatchFinished { summary } => {
                info!(
                    target: "updatedag::diagnostics",
                    total = summary.total,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    cancelled = summary.cancelled,
                    "batch finished"
                );
            }
        }
    }
}
