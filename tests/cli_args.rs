// tests/cli_args.rs

use clap::Parser;
use updatedag::cli::{CliArgs, LogLevel};
use updatedag::logging::resolve_level;

#[test]
fn defaults_apply_when_only_batch_is_given() {
    let args = CliArgs::try_parse_from(["updatedag", "--batch", "batch.toml"]).unwrap();
    assert_eq!(args.config, "Updatedag.toml");
    assert_eq!(args.batch, "batch.toml");
    assert_eq!(args.max_concurrency, None);
    assert!(!args.dry_run);
    assert!(args.log_level.is_none());
}

#[test]
fn all_flags_parse() {
    let args = CliArgs::try_parse_from([
        "updatedag",
        "--config",
        "conf/prod.toml",
        "--batch",
        "b.json",
        "--max-concurrency",
        "12",
        "--log-level",
        "debug",
        "--dry-run",
    ])
    .unwrap();

    assert_eq!(args.config, "conf/prod.toml");
    assert_eq!(args.max_concurrency, Some(12));
    assert!(args.dry_run);
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
}

#[test]
fn batch_is_required() {
    assert!(CliArgs::try_parse_from(["updatedag"]).is_err());
}

#[test]
fn cli_level_beats_environment() {
    assert_eq!(
        resolve_level(Some(LogLevel::Warn), Some("trace")),
        tracing::Level::WARN
    );
    assert_eq!(resolve_level(None, Some(" Debug ")), tracing::Level::DEBUG);
    assert_eq!(resolve_level(None, Some("loud")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}
