// src/dag/mod.rs

//! Dependency graph, ordering and scheduling.
//!
//! - [`graph`] holds the per-batch arena of update nodes.
//! - [`order`] computes the level partition or reports a cycle.
//! - [`scheduler`] contains the per-batch state machine that decides
//!   which nodes are ready, records outcomes and skips dependents.
//! - [`node`] provides node state and the dispatch record.
//! - [`scheduler_step`] defines the result types for scheduler steps.
//! - [`state_manager`] applies individual state transitions.
//! - [`result`] holds the itemized batch outcome.

pub mod graph;
pub mod node;
pub mod order;
pub mod result;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use graph::DependencyGraph;
pub use node::{DispatchedNode, NodeState, UpdateNode};
pub use order::{order, Levels};
pub use result::{BatchResult, BatchSummary, NodeOutcome, SkipReason};
pub use scheduler::Scheduler;
pub use scheduler_step::{CompletionStep, LevelStep};
