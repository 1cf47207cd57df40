// src/lib.rs

pub mod batch;
pub mod cli;
pub mod config;
pub mod dag;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::batch::load_batch;
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::dag::{BatchResult, DependencyGraph, Levels};
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::engine::{cancel_pair, BatchOptions, BatchPlan};
use crate::exec::command_registry;

/// High-level entry point used by `main.rs`.
///
/// Wires together config loading, batch loading, plan preparation, the
/// runtime with command persisters, and Ctrl-C cancellation. Returns
/// `Ok(true)` when every entity was written.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    if let Some(n) = args.max_concurrency {
        cfg.set_max_concurrency(n);
    }

    let entities = load_batch(&args.batch)?;
    info!(batch = %args.batch, entities = entities.len(), "batch loaded");

    let sink: Arc<dyn DiagnosticsSink> = Arc::new(TracingSink);
    let registry = command_registry(&cfg);
    let plan = BatchPlan::prepare(entities, &registry, sink.as_ref())?;

    if args.dry_run {
        print_plan(plan.graph(), plan.levels());
        return Ok(true);
    }

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("Ctrl+C received; no further entities will be dispatched");
        handle.cancel();
    });

    let options = BatchOptions::from_config(&cfg);
    let result = plan.into_runtime(options, signal, sink)?.run().await?;

    print_report(&result);
    Ok(result.is_success())
}

/// Dry-run output: one block per level, one line per entity.
fn print_plan(graph: &DependencyGraph, levels: &Levels) {
    println!("updatedag dry-run");
    println!(
        "  {} entities, {} in-batch references, {} external references",
        graph.len(),
        graph.edge_count(),
        graph.external_references()
    );
    println!();

    for (index, level) in levels.iter().enumerate() {
        println!("level {index} ({} entities):", level.len());
        for id in level {
            let Some(node) = graph.node(*id) else {
                continue;
            };
            let deps: Vec<String> = node.dependencies().iter().map(|d| d.to_string()).collect();
            if deps.is_empty() {
                println!("  - {id} [{}]", node.kind());
            } else {
                println!("  - {id} [{}] after {}", node.kind(), deps.join(", "));
            }
        }
    }

    debug!("dry-run complete (nothing written)");
}

fn print_report(result: &BatchResult) {
    let summary = result.summary();
    println!(
        "updatedag: {} succeeded, {} failed, {} skipped{}",
        summary.succeeded,
        summary.failed,
        summary.skipped,
        if summary.cancelled { " (cancelled)" } else { "" }
    );

    for (id, cause) in result.failed.iter() {
        println!("  failed  {id}: {cause}");
    }
    for (id, reason) in result.skipped.iter() {
        println!("  skipped {id}: {reason}");
    }
}
