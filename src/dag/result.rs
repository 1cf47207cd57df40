// src/dag/result.rs

//! Itemized outcome of a batch.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::exec::FailureCause;
use crate::types::EntityId;

/// Why a node was never executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A dependency ended Failed or Skipped. `dependency` is the lowest such
    /// id among the node's direct dependencies.
    UpstreamFailed { dependency: EntityId },
    /// The batch was cancelled before the node was dispatched.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpstreamFailed { dependency } => {
                write!(f, "dependency {dependency} did not succeed")
            }
            SkipReason::Cancelled => f.write_str("batch cancelled before dispatch"),
        }
    }
}

/// Terminal outcome of a single node, borrowed from a [`BatchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome<'a> {
    Succeeded,
    Failed(&'a FailureCause),
    Skipped(&'a SkipReason),
}

/// Result of running one batch to completion.
///
/// Every node of the batch appears in exactly one of the three collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub succeeded: BTreeSet<EntityId>,
    pub failed: BTreeMap<EntityId, FailureCause>,
    pub skipped: BTreeMap<EntityId, SkipReason>,
    /// Whether a cancellation signal stopped dispatching.
    pub cancelled: bool,
}

impl BatchResult {
    /// True when every node succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn skipped_ids(&self) -> BTreeSet<EntityId> {
        self.skipped.keys().copied().collect()
    }

    pub fn failed_ids(&self) -> BTreeSet<EntityId> {
        self.failed.keys().copied().collect()
    }

    pub fn outcome_of(&self, id: EntityId) -> Option<NodeOutcome<'_>> {
        if self.succeeded.contains(&id) {
            return Some(NodeOutcome::Succeeded);
        }
        if let Some(cause) = self.failed.get(&id) {
            return Some(NodeOutcome::Failed(cause));
        }
        self.skipped.get(&id).map(NodeOutcome::Skipped)
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.total(),
            succeeded: self.succeeded.len(),
            failed: self.failed.len(),
            skipped: self.skipped.len(),
            cancelled: self.cancelled,
        }
    }
}

/// Counts-only view of a [`BatchResult`], used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}
