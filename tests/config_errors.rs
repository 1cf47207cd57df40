// tests/config_errors.rs

use std::fs;
use std::time::Duration;

use tempfile::tempdir;
use updatedag::config::{load_and_validate, parse_and_validate, parse_duration};
use updatedag::errors::UpdateDagError;
use updatedag::exec::ErrorClass;
use updatedag::types::Kind;

fn config_error(toml: &str) -> String {
    match parse_and_validate(toml) {
        Err(UpdateDagError::ConfigError(msg)) => msg,
        Err(other) => panic!("expected ConfigError, got {other:?}"),
        Ok(cfg) => panic!("expected ConfigError, got {cfg:?}"),
    }
}

#[test]
fn full_config_round_trips_into_validated_values() {
    let cfg = parse_and_validate(
        r#"
[config]
max_concurrency = 8

[retry]
max_attempts = 5
initial_backoff = "250ms"
max_backoff = "2s"
multiplier = 1.5

[kind.Customer]
cmd = "run-proc UpdateCustomer"
connectivity_exit_codes = [75, 76]
lock_exit_codes = [40]
constraint_exit_codes = [41]
timeout = "30s"
"#,
    )
    .unwrap();

    assert_eq!(cfg.max_concurrency(), 8);
    let retry = cfg.retry();
    assert_eq!(retry.max_attempts, 5);
    assert_eq!(retry.initial_backoff, Duration::from_millis(250));
    assert_eq!(retry.max_backoff, Duration::from_secs(2));
    assert_eq!(retry.multiplier, 1.5);

    let spec = cfg.command_for(&Kind::new("Customer").unwrap()).unwrap();
    assert_eq!(spec.timeout, Some(Duration::from_secs(30)));
    assert_eq!(spec.classify_exit(76), ErrorClass::Connectivity);
    assert_eq!(spec.classify_exit(40), ErrorClass::LockContention);
    assert_eq!(spec.classify_exit(41), ErrorClass::ConstraintViolation);
    // Untouched lists keep their defaults.
    assert_eq!(spec.classify_exit(65), ErrorClass::Validation);
    assert_eq!(spec.classify_exit(66), ErrorClass::NotFound);
}

#[test]
fn config_and_retry_sections_are_optional() {
    let cfg = parse_and_validate("[kind.Order]\ncmd = \"true\"\n").unwrap();
    assert_eq!(cfg.max_concurrency(), 4);
    assert_eq!(cfg.retry().max_attempts, 4);
    assert_eq!(cfg.kinds().count(), 1);
}

#[test]
fn config_without_kinds_is_rejected() {
    let msg = config_error("[config]\nmax_concurrency = 2\n");
    assert!(msg.contains("[kind.<name>]"), "{msg}");
}

#[test]
fn zero_concurrency_is_rejected() {
    let msg = config_error("[config]\nmax_concurrency = 0\n[kind.A]\ncmd = \"true\"\n");
    assert!(msg.contains("max_concurrency"), "{msg}");
}

#[test]
fn zero_attempts_is_rejected() {
    let msg = config_error("[retry]\nmax_attempts = 0\n[kind.A]\ncmd = \"true\"\n");
    assert!(msg.contains("max_attempts"), "{msg}");
}

#[test]
fn shrinking_multiplier_is_rejected() {
    let msg = config_error("[retry]\nmultiplier = 0.5\n[kind.A]\ncmd = \"true\"\n");
    assert!(msg.contains("multiplier"), "{msg}");
}

#[test]
fn max_backoff_below_initial_is_rejected() {
    let msg = config_error(
        "[retry]\ninitial_backoff = \"2s\"\nmax_backoff = \"1s\"\n[kind.A]\ncmd = \"true\"\n",
    );
    assert!(msg.contains("max_backoff"), "{msg}");
}

#[test]
fn bad_duration_names_the_key() {
    let msg = config_error("[retry]\ninitial_backoff = \"fast\"\n[kind.A]\ncmd = \"true\"\n");
    assert!(msg.contains("initial_backoff"), "{msg}");

    let msg = config_error("[kind.A]\ncmd = \"true\"\ntimeout = \"10 parsecs\"\n");
    assert!(msg.contains("timeout"), "{msg}");
}

#[test]
fn empty_command_is_rejected() {
    let msg = config_error("[kind.A]\ncmd = \"  \"\n");
    assert!(msg.contains("empty `cmd`"), "{msg}");
}

#[test]
fn exit_code_in_two_lists_is_rejected() {
    let msg = config_error("[kind.A]\ncmd = \"true\"\nlock_exit_codes = [65]\n");
    assert!(msg.contains("65"), "{msg}");
    assert!(msg.contains("validation_exit_codes"), "{msg}");
}

#[test]
fn exit_code_zero_is_rejected() {
    let msg = config_error("[kind.A]\ncmd = \"true\"\nconstraint_exit_codes = [0]\n");
    assert!(msg.contains("exit code 0"), "{msg}");
}

#[test]
fn kind_name_with_whitespace_is_rejected() {
    let err = parse_and_validate("[kind.\"Sales Order\"]\ncmd = \"true\"\n").unwrap_err();
    assert!(matches!(err, UpdateDagError::InvalidKind { .. }), "{err:?}");
}

#[test]
fn unknown_keys_are_toml_errors() {
    let err = parse_and_validate("[kind.A]\ncmd = \"true\"\nafter = [\"B\"]\n").unwrap_err();
    assert!(matches!(err, UpdateDagError::TomlError(_)), "{err:?}");
}

#[test]
fn loads_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Updatedag.toml");
    fs::write(&path, "[kind.Customer]\ncmd = \"true\"\n").unwrap();

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.kinds().count(), 1);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, UpdateDagError::IoError(_)), "{err:?}");
}

#[test]
fn duration_syntax() {
    assert_eq!(parse_duration("100ms"), Ok(Duration::from_millis(100)));
    assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("15").is_err());
    assert!(parse_duration("5d").is_err());
    assert!(parse_duration("999999999999999999h").is_err());
    assert!(parse_duration("999999999999999999m").is_err());
    assert_eq!(
        parse_duration("18446744073709551615s"),
        Ok(Duration::from_secs(u64::MAX))
    );
}

#[test]
fn oversized_timeout_is_a_config_error() {
    let msg = config_error("[kind.K]\ncmd = \"true\"\ntimeout = \"999999999999999999h\"\n");
    assert!(msg.contains("timeout"), "{msg}");
    assert!(msg.contains("too large"), "{msg}");
}
