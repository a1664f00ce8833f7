//! Convenient imports for loam.
//!
//! Re-exports the most commonly used types so you can get started with a
//! single import:
//!
//! ```ignore
//! use loamdb::prelude::*;
//!
//! let db = Loam::ephemeral()?;
//! db.counters.add().wait()?;
//! ```

// Main entry point
pub use crate::database::{CommitReceipt, Loam, LoamBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Counter collection facade
pub use crate::counters::Counters;

// Model types
pub use loam_core::{
    ChangeDiff, Entity, EntityId, EntityKind, EntityRef, Predicate, SortOrder, Value,
};

// Engine handles
pub use loam_engine::{CommitOutcome, ReactiveQuery, Subscription};

// Stores
pub use loam_storage::{DurableStore, FileStore, MemoryStore};
