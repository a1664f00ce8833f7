//! Main database entry point.
//!
//! This module provides the [`Loam`] struct, the primary entry point for
//! the persistence layer, plus the builder used to configure it.

use crate::counters::Counters;
use crate::error::{Error, Result};
use loam_concurrency::Context;
use loam_core::{Entity, Predicate, SortOrder};
use loam_engine::{CommitOutcome, DiffHandler, ReactiveQuery, Subscription};
use loam_storage::{DurableStore, FileStore, MemoryStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The loam database.
///
/// Owns the durable store, the root context on its dedicated lane, and a
/// bounded pool of worker lanes. All writes go through [`Loam::perform`]:
/// the closure runs against a private child context on a worker lane and
/// its staged changes commit upward into the root as one batch.
///
/// # Example
///
/// ```ignore
/// use loamdb::prelude::*;
///
/// let db = Loam::open("./counters.json")?;
/// db.counters.add().wait()?;
/// db.counters.increment_all().wait()?;
/// db.close();
/// ```
pub struct Loam {
    pub(crate) inner: Arc<loam_engine::Database>,

    /// Counter collection operations.
    pub counters: Counters,
}

impl Loam {
    /// Open a database persisted to a JSON snapshot at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(path).open()
    }

    /// Create an in-memory database with no disk I/O.
    ///
    /// All data is lost when the database is dropped. Useful for tests
    /// and temporary computations.
    pub fn ephemeral() -> Result<Self> {
        Self::builder().open()
    }

    /// Create a builder for database configuration.
    pub fn builder() -> LoamBuilder {
        LoamBuilder::new()
    }

    /// Run a unit of work against a fresh child context and commit it.
    ///
    /// The closure stages mutations on a worker lane; returning `Err`
    /// aborts the unit of work. A unit of work that stages nothing
    /// commits as a no-op and publishes no diff.
    pub fn perform<F>(&self, work: F) -> CommitReceipt
    where
        F: FnOnce(&mut Context) -> loam_core::Result<()> + Send + 'static,
    {
        CommitReceipt {
            inner: self.inner.perform(work),
        }
    }

    /// Open a reactive query that stays current across commits.
    pub fn query(&self, predicate: Predicate, order: SortOrder) -> Result<Arc<ReactiveQuery>> {
        self.inner.query(predicate, order).map_err(Error::from)
    }

    /// Subscribe to the root context's change diffs.
    pub fn subscribe(&self, handler: DiffHandler) -> Subscription {
        self.inner.subscribe(handler)
    }

    /// One-off ordered fetch straight from the durable store.
    pub fn fetch(&self, predicate: &Predicate, order: &SortOrder) -> Result<Vec<Entity>> {
        self.inner.fetch(predicate, order).map_err(Error::from)
    }

    /// Get database metrics.
    pub fn metrics(&self) -> DatabaseMetrics {
        let m = self.inner.metrics();
        DatabaseMetrics {
            commits: m.committed,
            aborts: m.aborted,
        }
    }

    /// Gracefully shut down: drain worker lanes, then the root lane.
    ///
    /// Every commit dispatched before `close` is applied and flushed
    /// before this returns.
    pub fn close(&self) {
        self.inner.shutdown();
    }

    fn from_engine(db: Arc<loam_engine::Database>) -> Result<Self> {
        Ok(Self {
            counters: Counters::attach(db.clone())?,
            inner: db,
        })
    }
}

/// Handle to a dispatched unit of work.
#[must_use = "dropping the receipt discards the commit outcome"]
pub struct CommitReceipt {
    pub(crate) inner: loam_engine::CommitReceipt,
}

impl CommitReceipt {
    /// Block until the commit settles, surfacing flush rejections.
    pub fn wait(self) -> Result<CommitOutcome> {
        self.inner.wait().map_err(Error::from)
    }
}

/// Database metrics.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseMetrics {
    /// Units of work that committed.
    pub commits: u64,
    /// Units of work that failed or were rejected by the store.
    pub aborts: u64,
}

/// Builder for database configuration.
///
/// ```ignore
/// // Disk-backed:
/// let db = Loam::builder().path("./counters.json").open()?;
///
/// // In-memory with a bigger worker pool:
/// let db = Loam::builder().workers(8).open()?;
/// ```
pub struct LoamBuilder {
    path: Option<PathBuf>,
    store: Option<Arc<dyn DurableStore>>,
    workers: usize,
}

impl LoamBuilder {
    /// Create a builder with default settings (in-memory store).
    pub fn new() -> Self {
        LoamBuilder {
            path: None,
            store: None,
            workers: loam_engine::DEFAULT_WORKERS,
        }
    }

    /// Persist to a JSON snapshot at `path`.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use a caller-provided store. Overrides `path`.
    pub fn store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Number of worker lanes (at least one).
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Open the database.
    pub fn open(self) -> Result<Loam> {
        let store: Arc<dyn DurableStore> = match (self.store, self.path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FileStore::open(path)?),
            (None, None) => Arc::new(MemoryStore::new()),
        };
        let db = Arc::new(loam_engine::Database::with_workers(store, self.workers)?);
        Loam::from_engine(db)
    }
}

impl Default for LoamBuilder {
    fn default() -> Self {
        Self::new()
    }
}
