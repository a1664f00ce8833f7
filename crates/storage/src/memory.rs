//! In-memory store
//!
//! Backs ephemeral databases and most of the test suite. A single RwLock
//! around an ordered map keeps save batches all-or-nothing with respect to
//! concurrent fetches (a fetch sees the graph either before or after a
//! whole batch, never mid-batch).

use crate::{DurableStore, StoreWrite};
use loam_core::{Entity, EntityId, Error, Predicate, Result, SortOrder};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory durable store.
///
/// "Durable" only within the process lifetime: all data is lost on drop.
pub struct MemoryStore {
    entities: RwLock<BTreeMap<u64, Entity>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryStore {
            entities: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// True if the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn durable_key(id: EntityId) -> Result<u64> {
    match id {
        EntityId::Durable(n) => Ok(n),
        EntityId::Pending(_) => Err(Error::Store(format!(
            "store rejects non-durable id {}",
            id
        ))),
    }
}

impl DurableStore for MemoryStore {
    fn load(&self) -> Result<Vec<Entity>> {
        Ok(self.entities.read().values().cloned().collect())
    }

    fn allocate_id(&self) -> Result<u64> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn save_batch(&self, batch: &[StoreWrite]) -> Result<()> {
        // Validate before touching the map so a bad write aborts the
        // whole batch.
        for write in batch {
            durable_key(write.target())?;
        }
        let mut entities = self.entities.write();
        for write in batch {
            match write {
                StoreWrite::Put(entity) => {
                    entities.insert(durable_key(entity.id)?, entity.clone());
                }
                StoreWrite::Remove(id) => {
                    entities.remove(&durable_key(*id)?);
                }
            }
        }
        Ok(())
    }

    fn fetch(&self, predicate: &Predicate, order: &SortOrder) -> Result<Vec<Entity>> {
        let mut matched: Vec<Entity> = self
            .entities
            .read()
            .values()
            .filter(|e| predicate.matches(e))
            .cloned()
            .collect();
        order.sort(&mut matched);
        Ok(matched)
    }
}
