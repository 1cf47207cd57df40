// src/exec/command.rs

//! Shell-command persister: one command per entity kind.
//!
//! The entity is written to the command's stdin as JSON and its id and kind
//! are exported as `UPDATEDAG_ENTITY_ID` / `UPDATEDAG_KIND`. Exit status 0
//! means the write was applied; if the last non-empty stdout line is an
//! integer it is taken as the affected-row count. Non-zero exit codes are
//! classified through the per-kind code lists.

use std::collections::BTreeSet;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::exec::backend::{
    ErrorClass, PersistError, PersistFuture, PersistReceipt, Persister, PersisterRegistry,
};
use crate::types::{EntityId, PendingEntity};

/// Validated per-kind command settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub cmd: String,
    pub connectivity_exit_codes: BTreeSet<i32>,
    pub lock_exit_codes: BTreeSet<i32>,
    pub not_found_exit_codes: BTreeSet<i32>,
    pub validation_exit_codes: BTreeSet<i32>,
    pub constraint_exit_codes: BTreeSet<i32>,
    /// Kill the command and report a timeout after this long.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Settings with the default exit-code mapping: 75 (EX_TEMPFAIL) is a
    /// connectivity failure, 65 (EX_DATAERR) a validation failure and
    /// 66 (EX_NOINPUT) not-found.
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            connectivity_exit_codes: BTreeSet::from([75]),
            lock_exit_codes: BTreeSet::new(),
            not_found_exit_codes: BTreeSet::from([66]),
            validation_exit_codes: BTreeSet::from([65]),
            constraint_exit_codes: BTreeSet::new(),
            timeout: None,
        }
    }

    /// Map a non-zero exit code to an error class.
    pub fn classify_exit(&self, code: i32) -> ErrorClass {
        if self.connectivity_exit_codes.contains(&code) {
            ErrorClass::Connectivity
        } else if self.lock_exit_codes.contains(&code) {
            ErrorClass::LockContention
        } else if self.not_found_exit_codes.contains(&code) {
            ErrorClass::NotFound
        } else if self.validation_exit_codes.contains(&code) {
            ErrorClass::Validation
        } else if self.constraint_exit_codes.contains(&code) {
            ErrorClass::ConstraintViolation
        } else {
            ErrorClass::Other
        }
    }
}

/// JSON document written to the command's stdin.
#[derive(Debug, Serialize)]
struct StdinDocument<'a> {
    id: EntityId,
    kind: &'a str,
    payload: &'a serde_json::Value,
    references: &'a BTreeSet<EntityId>,
}

/// Persister that runs a shell command per entity.
#[derive(Debug, Clone)]
pub struct CommandPersister {
    spec: CommandSpec,
}

impl CommandPersister {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn run(&self, entity: &PendingEntity) -> Result<PersistReceipt, PersistError> {
        let body = serde_json::to_vec(&StdinDocument {
            id: entity.id,
            kind: entity.kind.as_str(),
            payload: &entity.payload,
            references: &entity.references,
        })
        .map_err(|e| {
            PersistError::new(
                ErrorClass::Validation,
                format!("serializing entity {}: {e}", entity.id),
            )
        })?;

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.spec.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.spec.cmd);
            c
        };

        cmd.env("UPDATEDAG_ENTITY_ID", entity.id.to_string())
            .env("UPDATEDAG_KIND", entity.kind.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(entity = %entity.id, kind = %entity.kind, cmd = %self.spec.cmd, "starting persistence command");

        let mut child = cmd.spawn().map_err(|e| {
            PersistError::new(
                ErrorClass::Connectivity,
                format!("spawning command for kind '{}': {e}", entity.kind),
            )
        })?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A command that exits without reading its input is fine.
                if let Err(e) = stdin.write_all(&body).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                }
            }
            Ok(())
        };
        // Output is drained while stdin is written; a command may fill its
        // stdout pipe before reading any input.
        let run = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output
        };

        let output = match self.spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(res) => res,
                Err(_) => {
                    // Dropping the future drops the child, which kills it.
                    info!(
                        entity = %entity.id,
                        timeout_ms = limit.as_millis() as u64,
                        "persistence command timed out; killed"
                    );
                    return Err(PersistError::new(
                        ErrorClass::Timeout,
                        format!("command exceeded {}ms", limit.as_millis()),
                    ));
                }
            },
            None => run.await,
        }
        .map_err(|e| {
            PersistError::new(
                ErrorClass::Connectivity,
                format!("waiting for command of kind '{}': {e}", entity.kind),
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            debug!(entity = %entity.id, "stderr: {}", line);
        }

        if output.status.success() {
            let rows_affected = last_line(&stdout).and_then(|l| l.parse::<u64>().ok());
            debug!(entity = %entity.id, ?rows_affected, "persistence command succeeded");
            return Ok(PersistReceipt { rows_affected });
        }

        let (class, code_text) = match output.status.code() {
            Some(code) => (self.spec.classify_exit(code), code.to_string()),
            None => (ErrorClass::Other, "signal".to_string()),
        };
        let detail = last_line(&stderr)
            .or_else(|| last_line(&stdout))
            .unwrap_or("no output");

        warn!(
            entity = %entity.id,
            kind = %entity.kind,
            exit = %code_text,
            class = %class,
            "persistence command failed"
        );

        Err(PersistError::new(
            class,
            format!("command exited with {code_text}: {detail}"),
        ))
    }
}

impl Persister for CommandPersister {
    fn persist<'a>(&'a self, entity: &'a PendingEntity) -> PersistFuture<'a> {
        Box::pin(self.run(entity))
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// Registry with one [`CommandPersister`] per configured kind.
pub fn command_registry(cfg: &ConfigFile) -> PersisterRegistry {
    let mut registry = PersisterRegistry::new();
    for (kind, spec) in cfg.kinds() {
        registry.register(kind.clone(), CommandPersister::new(spec.clone()));
    }
    registry
}
