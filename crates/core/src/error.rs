//! Error taxonomy. Handlers and repository implementations return
//! `RunnerError`; the Processor maps each variant onto the terminal-failure
//! path without needing to inspect collaborator-specific error types.

use thiserror::Error;

/// Four error categories as a flat enum rather than a trait hierarchy —
/// this core has one error boundary (the Processor), so there is no need
/// for a `Categorizable`/`SafeErrorCategory`-style classification
/// machinery built for many independent subscribers to classify errors
/// without shared code.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection loss, lock wait, or other store-level failure that is not
    /// retried within a single operation.
    #[error("store error: {0}")]
    Store(String),

    /// A required payload field was missing or malformed.
    #[error("payload validation error: {0}")]
    Validation(String),

    /// A collaborator (object store, media toolchain, speech-to-text,
    /// text-generation client) failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

impl RunnerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RunnerError::Config(_) => ErrorCategory::Config,
            RunnerError::Store(_) => ErrorCategory::Store,
            RunnerError::Validation(_) => ErrorCategory::Validation,
            RunnerError::Collaborator(_) => ErrorCategory::Collaborator,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        RunnerError::Validation(msg.into())
    }

    pub fn collaborator(msg: impl Into<String>) -> Self {
        RunnerError::Collaborator(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        RunnerError::Store(msg.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Store,
    Validation,
    Collaborator,
}

pub type RunnerResult<T> = Result<T, RunnerError>;
