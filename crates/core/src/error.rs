//! Canonical error type for the persistence layer
//!
//! One enum covers the whole taxonomy. The important distinction is
//! between fatal programming errors (confinement violations, which callers
//! must never swallow) and recoverable operational errors (stale
//! references, commit failures).

use crate::types::{ContextId, EntityId, LaneId};
use thiserror::Error;

/// All persistence-layer errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A context was entered from a lane other than its owning lane.
    ///
    /// This is a programming error. It aborts the operation and must be
    /// surfaced to the host's diagnostic path, never caught-and-ignored:
    /// continuing would risk silent graph corruption.
    #[error("confinement violation: context {context} is owned by {owner}, entered from {caller}")]
    ConfinementViolation {
        /// The violated context.
        context: ContextId,
        /// The lane the context is confined to.
        owner: LaneId,
        /// Description of the offending caller (lane id or "unmanaged thread").
        caller: String,
    },

    /// Mutation attempted through a reference invalidated by a delete in
    /// the same context or an ancestor. Recoverable: re-fetch and retry,
    /// or drop the operation.
    #[error("stale reference: {0} was deleted")]
    StaleReference(EntityId),

    /// A retired (committed or failed) context was used again.
    #[error("context {0} is retired and cannot be reused")]
    ContextRetired(ContextId),

    /// The durable store rejected a commit. The originating context's
    /// staged changes have been discarded; the caller decides whether to
    /// rebuild and retry.
    #[error("commit failed: {0}")]
    CommitFailure(String),

    /// Error from the durable store collaborator.
    #[error("store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Bug or broken invariant inside the engine.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for persistence-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors that indicate a programming error and must reach
    /// the host's crash/diagnostic path.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfinementViolation { .. } | Error::Internal(_)
        )
    }

    /// True for errors where retrying with fresh data may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StaleReference(_))
    }

    /// True if this is a commit failure.
    pub fn is_commit_failure(&self) -> bool {
        matches!(self, Error::CommitFailure(_))
    }
}
