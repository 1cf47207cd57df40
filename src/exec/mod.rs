// src/exec/mod.rs

//! Persistence execution layer.
//!
//! This module is responsible for actually writing entities through the
//! per-kind persistence operations, and for classifying and retrying what
//! comes back.
//!
//! - [`backend`] provides the `Persister` trait, error classes and the
//!   kind -> persister registry.
//! - [`executor`] owns `UpdateExecutor`, which applies one node with the
//!   retry policy.
//! - [`retry`] holds the bounded exponential backoff policy.
//! - [`outcome`] defines the classified outcome reported to the scheduler.
//! - [`command`] is the shell-command persister used by the CLI.

pub mod backend;
pub mod command;
pub mod executor;
pub mod outcome;
pub mod retry;

pub use backend::{
    ErrorClass, PersistError, PersistFuture, PersistReceipt, Persister, PersisterRegistry,
    ResolvedPersisters,
};
pub use command::{command_registry, CommandPersister, CommandSpec};
pub use executor::UpdateExecutor;
pub use outcome::{ApplyOutcome, FailureCause};
pub use retry::RetryPolicy;
