// tests/property_ordering.rs

mod common;
use crate::common::{fast_options, id_for, registry_for, sink_of, BatchBuilder, RecordingSink, ScriptedPersister, Step};

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use updatedag::dag::{order, DependencyGraph};
use updatedag::engine::{apply_batch, CancelSignal};
use updatedag::exec::ErrorClass;

fn name(i: usize) -> String {
    format!("p{i}")
}

// Acyclic by construction: node i may only reference nodes 0..i.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_nodes).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let deps: BTreeSet<usize> = if i == 0 {
                            BTreeSet::new()
                        } else {
                            picks.into_iter().map(|p| p % i).collect()
                        };
                        deps.into_iter().collect()
                    })
                    .collect()
            },
        )
    })
}

fn build(deps: &[Vec<usize>]) -> DependencyGraph {
    let mut builder = BatchBuilder::new();
    for (i, ds) in deps.iter().enumerate() {
        let names: Vec<String> = ds.iter().map(|d| name(*d)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        builder = builder.entity(&name(i), "K", &refs);
    }
    DependencyGraph::build(builder.build()).unwrap()
}

proptest! {
    #[test]
    fn every_dependency_lands_in_an_earlier_level(deps in dag_strategy(16)) {
        let graph = build(&deps);
        let levels = order(&graph).unwrap();

        prop_assert_eq!(levels.total_nodes(), deps.len());
        for (i, ds) in deps.iter().enumerate() {
            let own = levels.level_of(id_for(&name(i))).unwrap();
            let deepest = ds
                .iter()
                .map(|d| levels.level_of(id_for(&name(*d))).unwrap())
                .max();
            match deepest {
                Some(level) => prop_assert_eq!(own, level + 1),
                None => prop_assert_eq!(own, 0),
            }
        }
    }

    #[test]
    fn ordering_is_deterministic(deps in dag_strategy(16)) {
        let graph = build(&deps);
        let first = order(&graph).unwrap();
        let second = order(&graph).unwrap();
        prop_assert_eq!(first.as_slices(), second.as_slices());
    }

    #[test]
    fn adding_a_back_edge_creates_a_cycle(deps in dag_strategy(12)) {
        // Make node 0 reference the last node, which transitively may or
        // may not reach it; a self-loop guarantees a cycle when n == 1.
        let mut deps = deps;
        let last = deps.len() - 1;
        deps[0].push(last);
        let graph = build(&deps);

        let reaches_zero = {
            let mut seen = BTreeSet::new();
            let mut stack = vec![last];
            while let Some(i) = stack.pop() {
                if seen.insert(i) {
                    stack.extend(deps[i].iter().copied());
                }
            }
            seen.contains(&0)
        };

        prop_assert_eq!(order(&graph).is_err(), reaches_zero);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn failures_skip_exactly_their_downstream(
        deps in dag_strategy(10),
        fail_mask in proptest::collection::vec(any::<bool>(), 10),
    ) {
        let persister = ScriptedPersister::new();
        let mut failing = BTreeSet::new();
        for i in 0..deps.len() {
            if fail_mask[i] {
                persister.script(id_for(&name(i)), [Step::Fail(ErrorClass::Validation)]);
                failing.insert(i);
            }
        }
        let registry = registry_for(&persister, &["K"]);

        let mut builder = BatchBuilder::new();
        for (i, ds) in deps.iter().enumerate() {
            let names: Vec<String> = ds.iter().map(|d| name(*d)).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            builder = builder.entity(&name(i), "K", &refs);
        }

        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt
            .block_on(apply_batch(
                builder.build(),
                &registry,
                fast_options(3),
                CancelSignal::never(),
                sink_of(&RecordingSink::new()),
            ))
            .unwrap();

        // Expected outcome per node, in index order (dependencies first).
        let mut expected: BTreeMap<usize, &str> = BTreeMap::new();
        for (i, ds) in deps.iter().enumerate() {
            let blocked = ds.iter().any(|d| expected[d] != "succeeded");
            let outcome = if blocked {
                "skipped"
            } else if failing.contains(&i) {
                "failed"
            } else {
                "succeeded"
            };
            expected.insert(i, outcome);
        }

        prop_assert_eq!(result.total(), deps.len());
        for (i, outcome) in expected {
            let id = id_for(&name(i));
            match outcome {
                "succeeded" => prop_assert!(result.succeeded.contains(&id)),
                "failed" => prop_assert!(result.failed.contains_key(&id)),
                _ => {
                    prop_assert!(result.skipped.contains_key(&id));
                    prop_assert_eq!(persister.calls_for(id), 0);
                }
            }
        }
    }
}
