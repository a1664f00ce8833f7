//! # Loam
//!
//! An embedded object-persistence layer with thread-confined contexts,
//! merge-policy conflict resolution, and reactive queries.
//!
//! Loam keeps the object graph in a root context owned by a dedicated
//! execution lane. Writes happen in short-lived child contexts on worker
//! lanes: each unit of work snapshots the published graph, stages its
//! mutations privately, and commits them upward as one batch. The root
//! resolves conflicts property by property (the committing side wins),
//! publishes one typed change diff per commit, flushes to the durable
//! store, and refreshes open reactive queries.
//!
//! ## Quick Start
//!
//! ```ignore
//! use loamdb::prelude::*;
//!
//! let db = Loam::open("./counters.json")?;
//!
//! // Add a counter and bump everything, each as one commit.
//! db.counters.add().wait()?;
//! db.counters.increment_all().wait()?;
//!
//! // The reactive view is already current.
//! for counter in db.counters.all().iter() {
//!     println!("{}", counter.property("name"));
//! }
//!
//! db.close();
//! ```
//!
//! ## Guarantees
//!
//! - A context is only ever touched from its owning lane; violations are
//!   surfaced as fatal errors, never silently tolerated.
//! - Commits from concurrent units of work serialize through the root;
//!   each publishes exactly one diff, in apply order, and no-op commits
//!   publish nothing.
//! - Query snapshots are immutable: readers see a pre- or post-commit
//!   sequence wholesale, never a partially updated one.
//! - A commit the durable store rejects is rolled back and surfaced on
//!   the originating receipt; nothing is silently retried.

#![warn(missing_docs)]

mod counters;
mod database;
mod error;

pub mod prelude;

// Re-export main entry points
pub use counters::{Counters, COUNTER_KIND, COUNT, NAME};
pub use database::{CommitReceipt, DatabaseMetrics, Loam, LoamBuilder};
pub use error::{Error, Result};

// Re-export the model and engine types the public surface speaks in
pub use loam_concurrency::Context;
pub use loam_core::{
    ChangeDiff, Entity, EntityId, EntityKind, EntityRef, Predicate, SortKey, SortOrder, Value,
};
pub use loam_engine::{
    ChangeNotifier, CommitOutcome, DiffHandler, ReactiveQuery, Subscription, WillChangeObserver,
};
pub use loam_storage::{DurableStore, FileStore, MemoryStore, StoreWrite};
