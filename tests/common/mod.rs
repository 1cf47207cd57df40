#![allow(dead_code)]

pub use updatedag_test_utils::{
    id_for, init_tracing, with_timeout, BatchBuilder, EntityBuilder, RecordingSink,
    ScriptedPersister, Step,
};

use std::sync::Arc;
use std::time::Duration;

use updatedag::diagnostics::DiagnosticsSink;
use updatedag::engine::BatchOptions;
use updatedag::exec::{PersisterRegistry, RetryPolicy};
use updatedag::types::Kind;

pub fn kind(name: &str) -> Kind {
    Kind::new(name).expect("valid kind")
}

/// Registry mapping each of `kinds` to the same scripted persister.
pub fn registry_for(persister: &ScriptedPersister, kinds: &[&str]) -> PersisterRegistry {
    let mut registry = PersisterRegistry::new();
    for k in kinds {
        registry.register(kind(k), persister.clone());
    }
    registry
}

/// Fast retries so tests never wait on real backoff.
pub fn fast_options(max_concurrency: usize) -> BatchOptions {
    BatchOptions {
        max_concurrency,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
        },
    }
}

pub fn sink_of(recording: &RecordingSink) -> Arc<dyn DiagnosticsSink> {
    Arc::new(recording.clone())
}
