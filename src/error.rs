//! Public error type for the facade.
//!
//! Wraps the internal persistence-layer errors into a stable surface. The
//! classification helpers mirror the internal ones so callers can route
//! confinement violations to their crash path without matching variants.

use thiserror::Error;

/// All loam errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A context was entered from the wrong lane. Programming error;
    /// surface it, never swallow it.
    #[error("confinement violation: {0}")]
    Confinement(String),

    /// A reference to a deleted entity was used. Re-fetch and retry.
    #[error("stale reference: {0}")]
    StaleReference(String),

    /// A retired context was used again.
    #[error("context retired: {0}")]
    ContextRetired(String),

    /// The durable store rejected a commit; the staged changes are gone.
    #[error("commit failed: {0}")]
    CommitFailed(String),

    /// Storage-layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Bug or broken invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for loam operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors that indicate a programming error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Confinement(_) | Error::Internal(_))
    }

    /// True for errors where retrying with fresh data may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StaleReference(_))
    }

    /// True if a commit was rejected by the durable store.
    pub fn is_commit_failure(&self) -> bool {
        matches!(self, Error::CommitFailed(_))
    }
}

impl From<loam_core::Error> for Error {
    fn from(e: loam_core::Error) -> Self {
        use loam_core::Error as CoreError;
        match e {
            CoreError::ConfinementViolation { .. } => Error::Confinement(e.to_string()),
            CoreError::StaleReference(id) => Error::StaleReference(id.to_string()),
            CoreError::ContextRetired(id) => Error::ContextRetired(id.to_string()),
            CoreError::CommitFailure(msg) => Error::CommitFailed(msg),
            CoreError::Store(msg) => Error::Storage(msg),
            CoreError::Io(io) => Error::Io(io),
            CoreError::Serialization(msg) => Error::Serialization(msg),
            CoreError::Internal(msg) => Error::Internal(msg),
        }
    }
}
