//! File-backed store
//!
//! Persists the graph as a single JSON snapshot. Each acknowledged batch
//! rewrites the snapshot through a temp file and an atomic rename, so a
//! crash mid-save leaves the previous snapshot intact and `save_batch`
//! keeps its all-or-nothing contract.

use crate::{DurableStore, StoreWrite};
use loam_core::{Entity, EntityId, Error, Predicate, Result, SortOrder};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// On-disk snapshot layout.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    entities: Vec<Entity>,
}

/// JSON-snapshot durable store.
pub struct FileStore {
    path: PathBuf,
    entities: Mutex<BTreeMap<u64, Entity>>,
    next_id: AtomicU64,
}

impl FileStore {
    /// Open (or create) a store at `path`.
    ///
    /// Fails explicitly if the file exists but cannot be read or parsed;
    /// a database is never constructed over a store that did not open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (entities, next_id) = if path.exists() {
            let bytes = fs::read(&path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            let mut map = BTreeMap::new();
            for entity in snapshot.entities {
                match entity.id {
                    EntityId::Durable(n) => {
                        map.insert(n, entity);
                    }
                    EntityId::Pending(_) => {
                        return Err(Error::Store(format!(
                            "snapshot {} contains non-durable id {}",
                            path.display(),
                            entity.id
                        )));
                    }
                }
            }
            (map, snapshot.next_id)
        } else {
            (BTreeMap::new(), 1)
        };
        tracing::debug!(path = %path.display(), entities = entities.len(), "opened file store");
        Ok(FileStore {
            path,
            entities: Mutex::new(entities),
            next_id: AtomicU64::new(next_id),
        })
    }

    /// The snapshot path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entities: &BTreeMap<u64, Entity>) -> Result<()> {
        let snapshot = Snapshot {
            next_id: self.next_id.load(Ordering::SeqCst),
            entities: entities.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DurableStore for FileStore {
    fn load(&self) -> Result<Vec<Entity>> {
        Ok(self.entities.lock().values().cloned().collect())
    }

    fn allocate_id(&self) -> Result<u64> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn save_batch(&self, batch: &[StoreWrite]) -> Result<()> {
        let mut entities = self.entities.lock();
        // Apply to a scratch copy first; the in-memory map only advances
        // once the snapshot rename succeeded.
        let mut updated = entities.clone();
        for write in batch {
            match write {
                StoreWrite::Put(entity) => match entity.id {
                    EntityId::Durable(n) => {
                        updated.insert(n, entity.clone());
                    }
                    EntityId::Pending(_) => {
                        return Err(Error::Store(format!(
                            "store rejects non-durable id {}",
                            entity.id
                        )));
                    }
                },
                StoreWrite::Remove(id) => match id {
                    EntityId::Durable(n) => {
                        updated.remove(n);
                    }
                    EntityId::Pending(_) => {
                        return Err(Error::Store(format!(
                            "store rejects non-durable id {}",
                            id
                        )));
                    }
                },
            }
        }
        self.persist(&updated)?;
        *entities = updated;
        Ok(())
    }

    fn fetch(&self, predicate: &Predicate, order: &SortOrder) -> Result<Vec<Entity>> {
        let mut matched: Vec<Entity> = self
            .entities
            .lock()
            .values()
            .filter(|e| predicate.matches(e))
            .cloned()
            .collect();
        order.sort(&mut matched);
        Ok(matched)
    }
}
