//! Core types for the Loam persistence layer
//!
//! This crate defines the vocabulary shared by every other Loam crate:
//! entity identities and values, staged mutations, typed change diffs,
//! predicates and sort orders, and the canonical error type. It has no
//! concurrency and no I/O of its own.

#![warn(missing_docs)]

pub mod change;
pub mod entity;
pub mod error;
pub mod mutation;
pub mod query;
pub mod types;
pub mod value;

pub use change::ChangeDiff;
pub use entity::{Entity, EntityRef, Graph};
pub use error::{Error, Result};
pub use mutation::{CommitBatch, Mutation, PropertyChange};
pub use query::{Predicate, SortKey, SortOrder};
pub use types::{ContextId, EntityId, EntityKind, LaneId};
pub use value::Value;
