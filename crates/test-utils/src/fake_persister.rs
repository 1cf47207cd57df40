use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use updatedag::exec::{ErrorClass, PersistError, PersistFuture, PersistReceipt, Persister};
use updatedag::types::{EntityId, PendingEntity};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    /// Succeed reporting this many affected rows.
    Rows(u64),
    Fail(ErrorClass),
    /// Wait until the gate is notified, then succeed. Holds a node in
    /// flight for as long as the test needs.
    Gate(Arc<Notify>),
    /// Panic inside the persister future.
    Panic,
}

#[derive(Default)]
struct Inner {
    scripts: HashMap<EntityId, VecDeque<Step>>,
    calls: Vec<EntityId>,
    in_flight: usize,
    peak: usize,
}

/// A fake persister that:
/// - plays back a per-entity script of responses (default: succeed),
/// - records every call in order,
/// - tracks the peak number of concurrent calls.
///
/// Clones share state, so one instance can be registered for several kinds.
#[derive(Clone, Default)]
pub struct ScriptedPersister {
    inner: Arc<Mutex<Inner>>,
    delay: Duration,
}

impl ScriptedPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Append responses for `id`; once exhausted the entity succeeds.
    pub fn script(&self, id: EntityId, steps: impl IntoIterator<Item = Step>) -> &Self {
        let mut inner = self.inner.lock().unwrap();
        inner.scripts.entry(id).or_default().extend(steps);
        self
    }

    /// Resolve once `id` has been called at least once.
    pub async fn wait_for_call(&self, id: EntityId) {
        while self.calls_for(id) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub fn calls(&self) -> Vec<EntityId> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, id: EntityId) -> usize {
        self.inner.lock().unwrap().calls.iter().filter(|c| **c == id).count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.inner.lock().unwrap().peak
    }

    /// Position of the first call for `id`, if any.
    pub fn first_call_index(&self, id: EntityId) -> Option<usize> {
        self.inner.lock().unwrap().calls.iter().position(|c| *c == id)
    }

    fn begin(&self, id: EntityId) -> Step {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(id);
        inner.in_flight += 1;
        inner.peak = inner.peak.max(inner.in_flight);
        inner
            .scripts
            .get_mut(&id)
            .and_then(|q| q.pop_front())
            .unwrap_or(Step::Succeed)
    }

    fn end(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.in_flight -= 1;
    }
}

impl Persister for ScriptedPersister {
    fn persist<'a>(&'a self, entity: &'a PendingEntity) -> PersistFuture<'a> {
        Box::pin(async move {
            let step = self.begin(entity.id);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let result = match step {
                Step::Succeed => Ok(PersistReceipt::default()),
                Step::Rows(n) => Ok(PersistReceipt::rows(n)),
                Step::Fail(class) => Err(PersistError::new(
                    class,
                    format!("scripted {class} failure for {}", entity.id),
                )),
                Step::Gate(gate) => {
                    gate.notified().await;
                    Ok(PersistReceipt::default())
                }
                Step::Panic => panic!("scripted panic for {}", entity.id),
            };

            self.end();
            result
        })
    }
}
