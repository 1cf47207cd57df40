// src/exec/outcome.rs

use std::fmt;

use crate::exec::backend::{ErrorClass, PersistError};

/// Recorded cause of a node failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCause {
    pub class: ErrorClass,
    pub message: String,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// The failure was transient but the retry budget ran out.
    pub retries_exhausted: bool,
    /// The failure was transient but the batch was cancelled while waiting
    /// to retry.
    pub cancelled_during_retry: bool,
}

impl FailureCause {
    pub fn new(class: ErrorClass, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            class,
            message: message.into(),
            attempts,
            retries_exhausted: false,
            cancelled_during_retry: false,
        }
    }

    pub fn from_persist_error(err: PersistError, attempts: u32) -> Self {
        Self::new(err.class, err.message, attempts)
    }

    pub fn is_transient(&self) -> bool {
        self.class.is_transient()
    }

    pub(crate) fn exhausted(mut self) -> Self {
        self.retries_exhausted = true;
        self
    }

    pub(crate) fn interrupted(mut self) -> Self {
        self.cancelled_during_retry = true;
        self
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (after {} attempt{})",
            self.class,
            self.message,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )?;
        if self.retries_exhausted {
            f.write_str(", retries exhausted")?;
        }
        if self.cancelled_during_retry {
            f.write_str(", cancelled while waiting to retry")?;
        }
        Ok(())
    }
}

/// Classified result of applying one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Success { attempts: u32 },
    /// Worth retrying unchanged. Only returned by single-attempt calls.
    TransientError(FailureCause),
    PermanentError(FailureCause),
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ApplyOutcome::Success { .. })
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            ApplyOutcome::Success { .. } => None,
            ApplyOutcome::TransientError(cause) | ApplyOutcome::PermanentError(cause) => {
                Some(cause)
            }
        }
    }
}
