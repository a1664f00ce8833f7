//! Loam engine
//!
//! Wires the pieces into a running database: the durable store, the root
//! lane that owns the root context, a bounded worker-lane pool for units
//! of work, the change notifier, and the synchronization coordinator.
//!
//! The one supported write path mirrors a root-parented private child
//! context: [`Database::perform`] runs the caller's closure against a
//! fresh child context on a worker lane, seals the staged mutations, and
//! hands the batch to the root lane. The root applies it through the
//! merge policy, publishes one typed diff, the coordinator flushes to the
//! store, and open queries recompute. The worker never blocks on the
//! flush; callers that care hold the [`CommitReceipt`].

#![warn(missing_docs)]

mod coordinator;
mod notifier;
mod query;
mod root;

pub use notifier::{ChangeNotifier, DiffHandler, Subscription};
pub use query::{ReactiveQuery, WillChangeObserver};
pub use root::RootContext;

use coordinator::SyncCoordinator;
use loam_concurrency::{Context, Lane, LanePool};
use loam_core::{CommitBatch, Entity, EntityId, Error, Graph, Predicate, Result, SortOrder};
use loam_storage::DurableStore;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

/// Default number of worker lanes.
pub const DEFAULT_WORKERS: usize = 4;

/// Root context plus everything that must be reachable from its lane.
pub(crate) struct RootShared {
    pub(crate) lane: Arc<Lane>,
    pub(crate) inner: Mutex<RootContext>,
    pub(crate) notifier: Arc<ChangeNotifier>,
    /// Immutable snapshot of the root graph, readable from any lane.
    /// Replaced wholesale after each apply/flush cycle.
    published: RwLock<Arc<Graph>>,
}

impl RootShared {
    pub(crate) fn published(&self) -> Arc<Graph> {
        self.published.read().clone()
    }

    fn publish_snapshot(&self, inner: &RootContext) {
        *self.published.write() = Arc::new(inner.graph_clone());
    }

    /// Apply a sealed batch and run the full publish cycle. Root lane only.
    fn apply_and_publish(&self, batch: CommitBatch) -> Result<CommitOutcome> {
        let applied = self.inner.lock().apply_batch(batch);
        let (diff, inserted) = match applied {
            Ok(applied) => applied,
            Err(e) => {
                let mut inner = self.inner.lock();
                inner.discard_unflushed();
                self.publish_snapshot(&inner);
                return Err(e);
            }
        };

        let diff = match diff {
            Some(diff) => diff,
            // Net no-op: nothing published, nothing flushed.
            None => return Ok(CommitOutcome { inserted }),
        };

        // Delivery order: coordinator (flush) first, then queries, all on
        // this lane. The diff therefore reaches queries only after the
        // store has either accepted or rejected the commit.
        self.notifier.publish(&diff);

        let mut inner = self.inner.lock();
        let failure = inner.take_flush_failure();
        self.publish_snapshot(&inner);
        drop(inner);

        match failure {
            Some(e) => Err(e),
            None => Ok(CommitOutcome { inserted }),
        }
    }
}

/// What a successful commit produced.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    /// Durable ids assigned to the batch's inserts, in staging order.
    pub inserted: Vec<EntityId>,
}

/// Handle to a dispatched unit of work.
///
/// Dropping the receipt gives fire-and-forget semantics; the commit still
/// runs and failures are still logged. Waiting surfaces the outcome,
/// including flush rejections from the durable store.
#[must_use = "dropping the receipt discards the commit outcome"]
pub struct CommitReceipt {
    rx: Receiver<Result<CommitOutcome>>,
}

impl CommitReceipt {
    /// Block until the commit settles.
    pub fn wait(self) -> Result<CommitOutcome> {
        self.rx
            .recv()
            .map_err(|_| Error::Internal("commit outcome channel closed".to_string()))?
    }
}

struct Metrics {
    committed: AtomicU64,
    aborted: AtomicU64,
}

/// Commit statistics.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseMetrics {
    /// Units of work that committed (including no-op commits).
    pub committed: u64,
    /// Units of work that failed or were rejected by the store.
    pub aborted: u64,
}

/// The running engine.
pub struct Database {
    store: Arc<dyn DurableStore>,
    root: Arc<RootShared>,
    workers: LanePool,
    metrics: Arc<Metrics>,
    _coordinator: SyncCoordinator,
}

impl Database {
    /// Open a database over a store, with the default worker pool.
    pub fn open(store: Arc<dyn DurableStore>) -> Result<Database> {
        Self::with_workers(store, DEFAULT_WORKERS)
    }

    /// Open a database over a store with `workers` worker lanes.
    ///
    /// Loads the whole graph eagerly; fails if the store cannot serve the
    /// initial load, so a constructed database always has a usable root.
    pub fn with_workers(store: Arc<dyn DurableStore>, workers: usize) -> Result<Database> {
        let mut graph = Graph::new();
        for entity in store.load()? {
            graph.insert(entity.id, entity);
        }

        let lane = Lane::spawn("loam-root");
        let root_context = RootContext::new(lane.id(), store.clone(), graph.clone());
        let notifier = ChangeNotifier::new();
        let root = Arc::new(RootShared {
            lane,
            inner: Mutex::new(root_context),
            notifier: notifier.clone(),
            published: RwLock::new(Arc::new(graph)),
        });
        // Registered before any query so flushes precede query refreshes.
        let coordinator = SyncCoordinator::attach(&root);

        tracing::info!(
            entities = root.published().len(),
            workers = workers.max(1),
            "database open"
        );
        Ok(Database {
            store,
            root,
            workers: LanePool::new(workers),
            metrics: Arc::new(Metrics {
                committed: AtomicU64::new(0),
                aborted: AtomicU64::new(0),
            }),
            _coordinator: coordinator,
        })
    }

    /// Run a unit of work against a fresh child context on a worker lane
    /// and commit it.
    ///
    /// The closure stages mutations; returning `Err` aborts the unit of
    /// work and nothing reaches the root. The returned receipt settles
    /// once the root has applied the batch and the store has accepted (or
    /// rejected) the flush.
    pub fn perform<F>(&self, work: F) -> CommitReceipt
    where
        F: FnOnce(&mut Context) -> Result<()> + Send + 'static,
    {
        let (tx, rx) = channel();
        let root = self.root.clone();
        let metrics = self.metrics.clone();
        let outer_tx = tx.clone();

        let dispatched = self.workers.checkout().dispatch(Box::new(move || {
            let staged = (|| {
                let mut context = Context::new(root.published())?;
                work(&mut context)?;
                context.into_commit_batch()
            })();

            match staged {
                Err(e) => {
                    metrics.aborted.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("unit of work aborted before commit: {}", e);
                    let _ = tx.send(Err(e));
                }
                Ok(batch) if batch.is_empty() => {
                    // Nothing staged: no diff, no flush (a no-op save).
                    metrics.committed.fetch_add(1, Ordering::Relaxed);
                    let _ = tx.send(Ok(CommitOutcome::default()));
                }
                Ok(batch) => {
                    // Hand off to the root lane; this worker returns
                    // without waiting for the root's flush.
                    let root_for_apply = root.clone();
                    let apply_tx = tx.clone();
                    let apply_metrics = metrics.clone();
                    let handed_off = root.lane.dispatch(Box::new(move || {
                        let outcome = root_for_apply.apply_and_publish(batch);
                        match &outcome {
                            Ok(_) => apply_metrics.committed.fetch_add(1, Ordering::Relaxed),
                            Err(e) => {
                                tracing::error!("commit rejected: {}", e);
                                apply_metrics.aborted.fetch_add(1, Ordering::Relaxed)
                            }
                        };
                        let _ = apply_tx.send(outcome);
                    }));
                    if let Err(e) = handed_off {
                        metrics.aborted.fetch_add(1, Ordering::Relaxed);
                        let _ = tx.send(Err(e));
                    }
                }
            }
        }));

        if let Err(e) = dispatched {
            let _ = outer_tx.send(Err(e));
        }
        CommitReceipt { rx }
    }

    /// Open a reactive query over the root context.
    pub fn query(&self, predicate: Predicate, order: SortOrder) -> Result<Arc<ReactiveQuery>> {
        ReactiveQuery::open(self.store.clone(), &self.root.notifier, predicate, order)
    }

    /// Subscribe to the root context's change diffs.
    pub fn subscribe(&self, handler: DiffHandler) -> Subscription {
        self.root.notifier.subscribe(handler)
    }

    /// One-off ordered fetch straight from the durable store.
    pub fn fetch(&self, predicate: &Predicate, order: &SortOrder) -> Result<Vec<Entity>> {
        self.store.fetch(predicate, order)
    }

    /// The current published snapshot of the root graph.
    pub fn snapshot(&self) -> Arc<Graph> {
        self.root.published()
    }

    /// Commit statistics.
    pub fn metrics(&self) -> DatabaseMetrics {
        DatabaseMetrics {
            committed: self.metrics.committed.load(Ordering::Relaxed),
            aborted: self.metrics.aborted.load(Ordering::Relaxed),
        }
    }

    /// Drain worker lanes, then the root lane, and stop their threads.
    pub fn shutdown(&self) {
        self.workers.shutdown();
        self.root.lane.shutdown();
        tracing::debug!("database shut down");
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.shutdown();
    }
}
