// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

use crate::dag::{BatchResult, DispatchedNode, Scheduler};
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::errors::{Result, UpdateDagError};
use crate::exec::{ApplyOutcome, ErrorClass, FailureCause, UpdateExecutor};

use super::{BatchOptions, CancelSignal, RuntimeEvent};

/// Drives the scheduler level by level and delegates the actual writes to
/// an [`UpdateExecutor`] running on a bounded pool of Tokio tasks.
///
/// This is the IO shell around [`Scheduler`], which holds all the state
/// machine semantics. Workers never touch the scheduler: they report back
/// over a completion channel and this loop is the only writer.
pub struct Runtime {
    scheduler: Scheduler,
    executor: UpdateExecutor,
    options: BatchOptions,
    cancel: CancelSignal,
    sink: Arc<dyn DiagnosticsSink>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        scheduler: Scheduler,
        executor: UpdateExecutor,
        options: BatchOptions,
        cancel: CancelSignal,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            scheduler,
            executor,
            options,
            cancel,
            sink,
        }
    }

    /// Main loop.
    ///
    /// - Begins each level once the previous one is fully terminal.
    /// - Dispatches the level's ready nodes, at most `max_concurrency` at a
    ///   time.
    /// - Feeds worker completions into the scheduler.
    /// - On cancellation stops dispatching, lets in-flight writes finish and
    ///   skips everything else.
    pub async fn run(mut self) -> Result<BatchResult> {
        let max_concurrency = self.options.max_concurrency.max(1);
        info!(
            levels = self.scheduler.level_count(),
            nodes = self.scheduler.graph().len(),
            max_concurrency,
            "updatedag runtime started"
        );

        let limiter = Arc::new(Semaphore::new(max_concurrency));
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RuntimeEvent>();

        loop {
            if self.cancel.is_cancelled() && !self.scheduler.is_cancelled() {
                self.scheduler.cancel_undispatched()?;
            }

            let step = match self.scheduler.begin_next_level()? {
                Some(step) => step,
                None => break,
            };
            let index = step.index;
            let mut queue: VecDeque<DispatchedNode> = step.ready.into();
            let mut in_flight = 0usize;

            loop {
                if queue.is_empty() && in_flight == 0 {
                    break;
                }

                if !queue.is_empty() && self.cancel.is_cancelled() && !self.scheduler.is_cancelled() {
                    self.scheduler.cancel_undispatched()?;
                    queue.clear();
                    continue;
                }

                tokio::select! {
                    biased;

                    Some(event) = event_rx.recv(), if in_flight > 0 => {
                        in_flight -= 1;
                        self.handle_event(event)?;
                    }

                    _ = self.cancel.cancelled(), if !queue.is_empty() => {
                        // Picked up at the top of the loop.
                    }

                    permit = Arc::clone(&limiter).acquire_owned(), if !queue.is_empty() => {
                        let permit = permit.map_err(|e| UpdateDagError::Other(anyhow!(e)))?;
                        if let Some(node) = queue.pop_front() {
                            self.dispatch(node, permit, event_tx.clone())?;
                            in_flight += 1;
                        }
                    }
                }
            }

            let (succeeded, failed, skipped) = self.scheduler.level_counts(index);
            debug!(level = index, succeeded, failed, skipped, "level finished");
            self.sink.emit(DiagnosticEvent::LevelFinished {
                index,
                succeeded,
                failed,
                skipped,
            });
        }

        let result = self.scheduler.into_result();
        self.sink.emit(DiagnosticEvent::BatchFinished {
            summary: result.summary(),
        });
        info!("runtime exiting");
        Ok(result)
    }

    fn handle_event(&mut self, event: RuntimeEvent) -> Result<()> {
        match event {
            RuntimeEvent::NodeCompleted { id, outcome } => {
                let step = self.scheduler.complete(id, outcome)?;
                debug!(entity = %id, state = %step.state, level_finished = step.level_finished, "completion recorded");
            }
        }
        Ok(())
    }

    /// Hand `node` to a worker task. The permit is released when the worker
    /// finishes, before it reports back.
    fn dispatch(
        &mut self,
        node: DispatchedNode,
        permit: OwnedSemaphorePermit,
        event_tx: mpsc::UnboundedSender<RuntimeEvent>,
    ) -> Result<()> {
        self.scheduler.mark_in_progress(node.id)?;

        let id = node.id;
        let level = node.level;
        let executor = self.executor.clone();
        debug!(entity = %id, kind = %node.kind, level, "dispatching node");

        tokio::spawn(async move {
            let worker = tokio::spawn(async move { executor.apply(&node).await });

            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    error!(entity = %id, error = %join_err, "executor task panicked");
                    ApplyOutcome::PermanentError(FailureCause::new(
                        ErrorClass::Other,
                        format!("executor task panicked: {join_err}"),
                        1,
                    ))
                }
            };

            drop(permit);
            if event_tx
                .send(RuntimeEvent::NodeCompleted { id, outcome })
                .is_err()
            {
                debug!(entity = %id, "runtime gone before completion could be reported");
            }
        });

        Ok(())
    }
}
