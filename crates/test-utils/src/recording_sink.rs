use std::sync::{Arc, Mutex};

use updatedag::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use updatedag::dag::NodeState;
use updatedag::types::EntityId;

/// Diagnostics sink that keeps every event for later assertions.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Every state `id` moved into, in order.
    pub fn transitions_of(&self, id: EntityId) -> Vec<NodeState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::NodeStateChanged { id: eid, to, .. } if eid == id => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn retries_of(&self, id: EntityId) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, DiagnosticEvent::RetryScheduled { id: eid, .. } if *eid == id))
            .count()
    }

    pub fn count(&self, pred: impl Fn(&DiagnosticEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}
