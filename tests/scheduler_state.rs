// tests/scheduler_state.rs

mod common;
use crate::common::{id_for, sink_of, BatchBuilder, RecordingSink};

use updatedag::dag::{DependencyGraph, NodeState, Scheduler, SkipReason};
use updatedag::errors::UpdateDagError;
use updatedag::exec::{ApplyOutcome, ErrorClass, FailureCause};

fn scheduler(builder: BatchBuilder, sink: &RecordingSink) -> Scheduler {
    let graph = DependencyGraph::build(builder.build()).unwrap();
    Scheduler::plan(graph, sink_of(sink)).unwrap()
}

fn failure(class: ErrorClass) -> ApplyOutcome {
    ApplyOutcome::PermanentError(FailureCause::new(class, "boom", 1))
}

#[test]
fn transition_table_matches_lifecycle() {
    use NodeState::*;

    assert!(Pending.can_transition_to(Ready));
    assert!(Pending.can_transition_to(Skipped));
    assert!(Ready.can_transition_to(InProgress));
    assert!(InProgress.can_transition_to(Succeeded));
    assert!(InProgress.can_transition_to(Failed));

    assert!(!Pending.can_transition_to(InProgress));
    assert!(!Ready.can_transition_to(Succeeded));
    assert!(!InProgress.can_transition_to(Skipped));
    for terminal in [Succeeded, Failed, Skipped] {
        assert!(terminal.is_terminal());
        for to in [Pending, Ready, InProgress, Succeeded, Failed, Skipped] {
            assert!(!terminal.can_transition_to(to), "{terminal} -> {to}");
        }
    }
}

#[test]
fn successful_chain_walks_every_state() {
    let sink = RecordingSink::new();
    let mut sched = scheduler(
        BatchBuilder::new()
            .entity("A", "K", &[])
            .entity("B", "K", &["A"]),
        &sink,
    );

    let step = sched.begin_next_level().unwrap().unwrap();
    assert_eq!(step.index, 0);
    assert_eq!(step.ready_ids(), vec![id_for("A")]);
    assert_eq!(sched.state_of(id_for("B")), Some(NodeState::Pending));

    sched.mark_in_progress(id_for("A")).unwrap();
    let done = sched
        .complete(id_for("A"), ApplyOutcome::Success { attempts: 1 })
        .unwrap();
    assert_eq!(done.state, NodeState::Succeeded);
    assert!(done.level_finished);

    let step = sched.begin_next_level().unwrap().unwrap();
    assert_eq!(step.ready_ids(), vec![id_for("B")]);
    sched.mark_in_progress(id_for("B")).unwrap();
    sched
        .complete(id_for("B"), ApplyOutcome::Success { attempts: 2 })
        .unwrap();

    assert!(sched.begin_next_level().unwrap().is_none());
    assert!(sched.is_finished());

    assert_eq!(
        sink.transitions_of(id_for("A")),
        vec![NodeState::Ready, NodeState::InProgress, NodeState::Succeeded]
    );

    let result = sched.into_result();
    assert!(result.is_success());
    assert_eq!(result.succeeded.len(), 2);
}

#[test]
fn failure_skips_transitive_dependents_with_cause() {
    let sink = RecordingSink::new();
    let mut sched = scheduler(
        BatchBuilder::new()
            .entity("A", "K", &[])
            .entity("B", "K", &["A"])
            .entity("C", "K", &["B"])
            .entity("D", "K", &[]),
        &sink,
    );

    let step = sched.begin_next_level().unwrap().unwrap();
    assert_eq!(step.ready_ids(), vec![id_for("A"), id_for("D")]);
    for id in step.ready_ids() {
        sched.mark_in_progress(id).unwrap();
    }
    sched
        .complete(id_for("A"), failure(ErrorClass::ConstraintViolation))
        .unwrap();
    sched
        .complete(id_for("D"), ApplyOutcome::Success { attempts: 1 })
        .unwrap();

    let step = sched.begin_next_level().unwrap().unwrap();
    assert!(step.ready.is_empty());
    assert_eq!(
        step.skipped,
        vec![(
            id_for("B"),
            SkipReason::UpstreamFailed {
                dependency: id_for("A")
            }
        )]
    );

    let step = sched.begin_next_level().unwrap().unwrap();
    assert_eq!(
        step.skipped,
        vec![(
            id_for("C"),
            SkipReason::UpstreamFailed {
                dependency: id_for("B")
            }
        )]
    );

    let result = sched.into_result();
    assert!(!result.is_success());
    assert!(result.succeeded.contains(&id_for("D")));
    assert_eq!(result.failed[&id_for("A")].class, ErrorClass::ConstraintViolation);
    assert_eq!(result.skipped.len(), 2);
    assert_eq!(result.total(), 4);
}

#[test]
fn skip_cause_names_lowest_failed_dependency() {
    let sink = RecordingSink::new();
    let mut sched = scheduler(
        BatchBuilder::new()
            .entity("A", "K", &[])
            .entity("B", "K", &[])
            .entity("C", "K", &["A", "B"]),
        &sink,
    );

    sched.begin_next_level().unwrap();
    for name in ["A", "B"] {
        sched.mark_in_progress(id_for(name)).unwrap();
        sched
            .complete(id_for(name), failure(ErrorClass::Validation))
            .unwrap();
    }

    let step = sched.begin_next_level().unwrap().unwrap();
    assert_eq!(
        step.skipped[0].1,
        SkipReason::UpstreamFailed {
            dependency: id_for("A")
        }
    );
}

#[test]
fn transient_outcome_reaching_scheduler_counts_as_failure() {
    let sink = RecordingSink::new();
    let mut sched = scheduler(BatchBuilder::new().entity("A", "K", &[]), &sink);

    sched.begin_next_level().unwrap();
    sched.mark_in_progress(id_for("A")).unwrap();
    let step = sched
        .complete(
            id_for("A"),
            ApplyOutcome::TransientError(FailureCause::new(ErrorClass::Timeout, "slow", 1)),
        )
        .unwrap();

    assert_eq!(step.state, NodeState::Failed);
}

#[test]
fn completing_a_node_that_is_not_in_progress_is_rejected() {
    let sink = RecordingSink::new();
    let mut sched = scheduler(BatchBuilder::new().entity("A", "K", &[]), &sink);

    sched.begin_next_level().unwrap();
    let err = sched
        .complete(id_for("A"), ApplyOutcome::Success { attempts: 1 })
        .unwrap_err();

    assert!(matches!(
        err,
        UpdateDagError::InvalidTransition {
            from: NodeState::Ready,
            to: NodeState::Succeeded,
            ..
        }
    ));
}

#[test]
fn unknown_entity_is_reported() {
    let sink = RecordingSink::new();
    let mut sched = scheduler(BatchBuilder::new().entity("A", "K", &[]), &sink);

    let err = sched.mark_in_progress(id_for("nope")).unwrap_err();
    assert!(matches!(err, UpdateDagError::EntityNotFound(id) if id == id_for("nope")));
}

#[test]
fn cancel_skips_undispatched_but_leaves_in_flight_alone() {
    let sink = RecordingSink::new();
    let mut sched = scheduler(
        BatchBuilder::new()
            .entity("A", "K", &[])
            .entity("B", "K", &[])
            .entity("C", "K", &["A"]),
        &sink,
    );

    sched.begin_next_level().unwrap();
    sched.mark_in_progress(id_for("A")).unwrap();

    let skipped = sched.cancel_undispatched().unwrap();
    assert_eq!(skipped, vec![id_for("B"), id_for("C")]);
    assert!(sched.is_cancelled());
    assert_eq!(sched.state_of(id_for("A")), Some(NodeState::InProgress));

    sched
        .complete(id_for("A"), ApplyOutcome::Success { attempts: 1 })
        .unwrap();

    // Level 1 holds only C, already settled by the cancellation.
    let step = sched.begin_next_level().unwrap().unwrap();
    assert!(step.ready.is_empty());
    assert!(sched.begin_next_level().unwrap().is_none());

    let result = sched.into_result();
    assert!(result.cancelled);
    assert!(result.succeeded.contains(&id_for("A")));
    assert_eq!(result.skipped[&id_for("B")], SkipReason::Cancelled);
    assert_eq!(result.skipped[&id_for("C")], SkipReason::Cancelled);
}

#[test]
fn level_counts_reflect_terminal_states() {
    let sink = RecordingSink::new();
    let mut sched = scheduler(
        BatchBuilder::new()
            .entity("A", "K", &[])
            .entity("B", "K", &[])
            .entity("C", "K", &[]),
        &sink,
    );

    sched.begin_next_level().unwrap();
    sched.mark_in_progress(id_for("A")).unwrap();
    sched.mark_in_progress(id_for("B")).unwrap();
    sched
        .complete(id_for("A"), ApplyOutcome::Success { attempts: 1 })
        .unwrap();
    assert!(!sched.level_complete(0));

    sched
        .complete(id_for("B"), failure(ErrorClass::NotFound))
        .unwrap();
    sched.mark_in_progress(id_for("C")).unwrap();
    sched
        .complete(id_for("C"), ApplyOutcome::Success { attempts: 1 })
        .unwrap();

    assert!(sched.level_complete(0));
    assert_eq!(sched.level_counts(0), (2, 1, 0));
}
