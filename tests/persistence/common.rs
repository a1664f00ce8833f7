//! Shared helpers for the persistence suite.

use loam_core::Result as CoreResult;
use loamdb::{DurableStore, Entity, Loam, MemoryStore, Predicate, SortOrder, StoreWrite};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Install a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Open an in-memory database with two worker lanes.
pub fn ephemeral_db() -> Loam {
    init_tracing();
    Loam::builder().workers(2).open().unwrap()
}

/// Name-ordered `(name, count)` pairs from the live counter view.
pub fn name_counts(db: &Loam) -> Vec<(String, i64)> {
    db.counters
        .all()
        .iter()
        .map(|counter| {
            (
                counter.property("name").as_str().unwrap_or("").to_string(),
                counter.property("count").as_int().unwrap_or(-1),
            )
        })
        .collect()
}

/// Store wrapper whose `save_batch` can be made to fail on demand.
///
/// Everything else passes through to the wrapped [`MemoryStore`], so a
/// rejected batch leaves the underlying store byte-for-byte unchanged.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl DurableStore for FlakyStore {
    fn load(&self) -> CoreResult<Vec<Entity>> {
        self.inner.load()
    }

    fn allocate_id(&self) -> CoreResult<u64> {
        self.inner.allocate_id()
    }

    fn save_batch(&self, batch: &[StoreWrite]) -> CoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(loam_core::Error::Store("injected write failure".into()));
        }
        self.inner.save_batch(batch)
    }

    fn fetch(&self, predicate: &Predicate, order: &SortOrder) -> CoreResult<Vec<Entity>> {
        self.inner.fetch(predicate, order)
    }
}
