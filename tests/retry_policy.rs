// tests/retry_policy.rs

mod common;
use crate::common::{
    id_for, init_tracing, registry_for, sink_of, with_timeout, BatchBuilder, RecordingSink,
    ScriptedPersister, Step,
};

use std::time::Duration;

use updatedag::engine::{apply_batch, BatchOptions, CancelSignal};
use updatedag::exec::{ErrorClass, RetryPolicy};

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        multiplier: 2.0,
    }
}

fn options(retry: RetryPolicy) -> BatchOptions {
    BatchOptions {
        max_concurrency: 2,
        retry,
    }
}

#[test]
fn backoff_grows_geometrically_and_is_capped() {
    let p = RetryPolicy {
        max_attempts: 10,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(500),
        multiplier: 2.0,
    };

    assert_eq!(p.delay_for(1), Duration::from_millis(100));
    assert_eq!(p.delay_for(2), Duration::from_millis(200));
    assert_eq!(p.delay_for(3), Duration::from_millis(400));
    assert_eq!(p.delay_for(4), Duration::from_millis(500));
    assert_eq!(p.delay_for(60), Duration::from_millis(500));
}

#[test]
fn should_retry_counts_the_first_attempt() {
    let p = policy(3);
    assert!(p.should_retry(1));
    assert!(p.should_retry(2));
    assert!(!p.should_retry(3));
    assert!(!RetryPolicy::no_retry().should_retry(1));
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    init_tracing();
    let persister = ScriptedPersister::new();
    persister.script(
        id_for("A"),
        [
            Step::Fail(ErrorClass::LockContention),
            Step::Fail(ErrorClass::Connectivity),
        ],
    );
    let registry = registry_for(&persister, &["K"]);
    let sink = RecordingSink::new();

    let result = with_timeout(apply_batch(
        BatchBuilder::new()
            .entity("A", "K", &[])
            .entity("B", "K", &["A"])
            .build(),
        &registry,
        options(policy(3)),
        CancelSignal::never(),
        sink_of(&sink),
    ))
    .await
    .unwrap();

    assert!(result.is_success());
    assert_eq!(persister.calls_for(id_for("A")), 3);
    assert_eq!(persister.calls_for(id_for("B")), 1);
    assert_eq!(sink.retries_of(id_for("A")), 2);
}

#[tokio::test]
async fn exhausted_retries_fail_the_node_and_skip_dependents() {
    init_tracing();
    let persister = ScriptedPersister::new();
    persister.script(id_for("A"), std::iter::repeat(Step::Fail(ErrorClass::Timeout)).take(5));
    let registry = registry_for(&persister, &["K"]);

    let result = with_timeout(apply_batch(
        BatchBuilder::new()
            .entity("A", "K", &[])
            .entity("B", "K", &["A"])
            .build(),
        &registry,
        options(policy(3)),
        CancelSignal::never(),
        sink_of(&RecordingSink::new()),
    ))
    .await
    .unwrap();

    let cause = &result.failed[&id_for("A")];
    assert_eq!(cause.class, ErrorClass::Timeout);
    assert_eq!(cause.attempts, 3);
    assert!(cause.retries_exhausted);
    assert_eq!(persister.calls_for(id_for("A")), 3);
    assert!(result.skipped.contains_key(&id_for("B")));
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    init_tracing();
    let persister = ScriptedPersister::new();
    persister.script(id_for("A"), [Step::Fail(ErrorClass::Validation)]);
    let registry = registry_for(&persister, &["K"]);
    let sink = RecordingSink::new();

    let result = with_timeout(apply_batch(
        BatchBuilder::new().entity("A", "K", &[]).build(),
        &registry,
        options(policy(5)),
        CancelSignal::never(),
        sink_of(&sink),
    ))
    .await
    .unwrap();

    let cause = &result.failed[&id_for("A")];
    assert_eq!(cause.class, ErrorClass::Validation);
    assert!(!cause.retries_exhausted);
    assert_eq!(persister.calls_for(id_for("A")), 1);
    assert_eq!(sink.retries_of(id_for("A")), 0);
}

#[tokio::test]
async fn no_retry_policy_fails_on_first_transient_error() {
    init_tracing();
    let persister = ScriptedPersister::new();
    persister.script(id_for("A"), [Step::Fail(ErrorClass::Connectivity)]);
    let registry = registry_for(&persister, &["K"]);

    let result = with_timeout(apply_batch(
        BatchBuilder::new().entity("A", "K", &[]).build(),
        &registry,
        options(RetryPolicy::no_retry()),
        CancelSignal::never(),
        sink_of(&RecordingSink::new()),
    ))
    .await
    .unwrap();

    let cause = &result.failed[&id_for("A")];
    assert_eq!(cause.attempts, 1);
    assert!(cause.retries_exhausted);
}
