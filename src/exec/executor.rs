// src/exec/executor.rs

//! Applies one node through its kind's persister.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::DispatchedNode;
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::engine::CancelSignal;
use crate::exec::backend::{ErrorClass, ResolvedPersisters};
use crate::exec::outcome::{ApplyOutcome, FailureCause};
use crate::exec::retry::RetryPolicy;

/// Writes single nodes, classifying outcomes and retrying transient ones.
///
/// Cheap to clone; every worker gets its own handle.
#[derive(Clone)]
pub struct UpdateExecutor {
    persisters: ResolvedPersisters,
    retry: RetryPolicy,
    sink: Arc<dyn DiagnosticsSink>,
    cancel: CancelSignal,
}

impl fmt::Debug for UpdateExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateExecutor")
            .field("persisters", &self.persisters)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl UpdateExecutor {
    pub fn new(
        persisters: ResolvedPersisters,
        retry: RetryPolicy,
        sink: Arc<dyn DiagnosticsSink>,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            persisters,
            retry,
            sink,
            cancel,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Apply `node`, retrying transient failures per the retry policy.
    ///
    /// Never returns [`ApplyOutcome::TransientError`]: a transient failure
    /// that survives every attempt is reported as permanent with
    /// `retries_exhausted` set. A cancellation arriving while waiting for the
    /// next attempt ends the retries early.
    pub async fn apply(&self, node: &DispatchedNode) -> ApplyOutcome {
        let mut attempt = 1;
        loop {
            match self.attempt(node, attempt).await {
                ApplyOutcome::TransientError(cause) => {
                    if !self.retry.should_retry(attempt) {
                        warn!(
                            entity = %node.id,
                            kind = %node.kind,
                            attempts = attempt,
                            error = %cause.message,
                            "transient failure persisted through every attempt"
                        );
                        return ApplyOutcome::PermanentError(cause.exhausted());
                    }

                    let delay = self.retry.delay_for(attempt);
                    self.sink.emit(DiagnosticEvent::RetryScheduled {
                        id: node.id,
                        kind: node.kind.clone(),
                        attempt,
                        delay,
                        class: cause.class,
                        message: cause.message.clone(),
                    });

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {
                            info!(
                                entity = %node.id,
                                attempts = attempt,
                                "batch cancelled while waiting to retry; giving up on node"
                            );
                            return ApplyOutcome::PermanentError(cause.interrupted());
                        }
                    }

                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Apply `node` exactly once and classify the result.
    pub async fn apply_once(&self, node: &DispatchedNode) -> ApplyOutcome {
        self.attempt(node, 1).await
    }

    async fn attempt(&self, node: &DispatchedNode, attempt: u32) -> ApplyOutcome {
        let persister = match self.persisters.get(&node.kind) {
            Some(p) => p,
            None => {
                return ApplyOutcome::PermanentError(FailureCause::new(
                    ErrorClass::Other,
                    format!("no persister resolved for kind '{}'", node.kind),
                    attempt,
                ));
            }
        };

        debug!(entity = %node.id, kind = %node.kind, attempt, "persisting entity");

        match persister.persist(&node.entity).await {
            Ok(receipt) if receipt.rows_affected == Some(0) => {
                ApplyOutcome::PermanentError(FailureCause::new(
                    ErrorClass::NotFound,
                    "write affected no rows",
                    attempt,
                ))
            }
            Ok(_) => ApplyOutcome::Success { attempts: attempt },
            Err(err) if err.class.is_transient() => {
                ApplyOutcome::TransientError(FailureCause::from_persist_error(err, attempt))
            }
            Err(err) => ApplyOutcome::PermanentError(FailureCause::from_persist_error(err, attempt)),
        }
    }
}
