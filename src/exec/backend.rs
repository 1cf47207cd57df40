// src/exec/backend.rs

//! Pluggable persistence backend abstraction.
//!
//! The executor talks to a [`Persister`] per entity kind instead of a
//! concrete data-access layer. This keeps the write mechanism (stored
//! procedure, HTTP call, shell command) outside the engine and makes it easy
//! to swap in a scripted fake in tests.
//!
//! - [`PersisterRegistry`] maps kinds to persisters; it is resolved once per
//!   batch into [`ResolvedPersisters`] before anything is written.
//! - [`crate::exec::CommandPersister`] is the implementation the CLI uses.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::DependencyGraph;
use crate::errors::{Result, UpdateDagError};
use crate::types::{Kind, PendingEntity};

/// Failure category reported by a persister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The store could not be reached.
    Connectivity,
    Timeout,
    /// Deadlock victim, lock wait exceeded, and similar.
    LockContention,
    ConstraintViolation,
    Validation,
    /// The row to update does not exist.
    NotFound,
    Other,
}

impl ErrorClass {
    /// Transient failures are expected to go away when retried unchanged.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorClass::Connectivity | ErrorClass::Timeout | ErrorClass::LockContention
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Connectivity => "connectivity",
            ErrorClass::Timeout => "timeout",
            ErrorClass::LockContention => "lock-contention",
            ErrorClass::ConstraintViolation => "constraint-violation",
            ErrorClass::Validation => "validation",
            ErrorClass::NotFound => "not-found",
            ErrorClass::Other => "other",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful persistence call reports back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReceipt {
    /// Rows touched by the write, when the backend knows. `Some(0)` means the
    /// target row was not there and is treated as a not-found failure.
    pub rows_affected: Option<u64>,
}

impl PersistReceipt {
    pub fn rows(rows: u64) -> Self {
        Self {
            rows_affected: Some(rows),
        }
    }
}

/// Error returned by a persister, already classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class}: {message}")]
pub struct PersistError {
    pub class: ErrorClass,
    pub message: String,
}

impl PersistError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

pub type PersistFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<PersistReceipt, PersistError>> + Send + 'a>>;

/// Persistence operation for one entity kind.
///
/// Each call must commit exactly one write or none; the engine never wraps
/// several calls in a shared transaction.
pub trait Persister: Send + Sync {
    fn persist<'a>(&'a self, entity: &'a PendingEntity) -> PersistFuture<'a>;
}

/// Kind -> persister lookup table.
#[derive(Clone, Default)]
pub struct PersisterRegistry {
    persisters: BTreeMap<Kind, Arc<dyn Persister>>,
}

impl fmt::Debug for PersisterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersisterRegistry")
            .field("kinds", &self.persisters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PersisterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `persister` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: Kind, persister: impl Persister + 'static) -> &mut Self {
        self.persisters.insert(kind, Arc::new(persister));
        self
    }

    pub fn register_arc(&mut self, kind: Kind, persister: Arc<dyn Persister>) -> &mut Self {
        self.persisters.insert(kind, persister);
        self
    }

    pub fn with(mut self, kind: Kind, persister: impl Persister + 'static) -> Self {
        self.register(kind, persister);
        self
    }

    pub fn contains(&self, kind: &Kind) -> bool {
        self.persisters.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &Kind> {
        self.persisters.keys()
    }

    /// Look up a persister for every kind present in `graph`.
    ///
    /// Fails with [`UpdateDagError::UnknownKind`] for the first kind (in
    /// ascending order) that has no persister.
    pub fn resolve(&self, graph: &DependencyGraph) -> Result<ResolvedPersisters> {
        let mut resolved = HashMap::new();
        for kind in graph.kinds() {
            match self.persisters.get(kind) {
                Some(persister) => {
                    resolved.insert(kind.clone(), Arc::clone(persister));
                }
                None => {
                    return Err(UpdateDagError::UnknownKind {
                        kind: kind.clone(),
                        entities: graph.ids_of_kind(kind),
                    });
                }
            }
        }
        Ok(ResolvedPersisters {
            by_kind: Arc::new(resolved),
        })
    }
}

/// Persisters for exactly the kinds of one batch. Cheap to clone.
#[derive(Clone, Default)]
pub struct ResolvedPersisters {
    by_kind: Arc<HashMap<Kind, Arc<dyn Persister>>>,
}

impl ResolvedPersisters {
    pub fn get(&self, kind: &Kind) -> Option<&Arc<dyn Persister>> {
        self.by_kind.get(kind)
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

impl fmt::Debug for ResolvedPersisters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPersisters")
            .field("kinds", &self.by_kind.keys().collect::<Vec<_>>())
            .finish()
    }
}
