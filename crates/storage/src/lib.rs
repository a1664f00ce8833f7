//! Durable store for the Loam persistence layer
//!
//! The store is an opaque key-object collaborator behind the
//! [`DurableStore`] trait: load the whole graph at open, save mutation
//! batches atomically, and serve ordered predicate fetches. The engine
//! treats every implementation identically; tests inject failing wrappers
//! through the same trait.
//!
//! Two implementations ship here:
//! - [`MemoryStore`]: in-memory, for ephemeral databases and tests
//! - [`FileStore`]: JSON snapshot on disk, rewritten atomically per batch

#![warn(missing_docs)]

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use loam_core::{Entity, EntityId, Predicate, Result, SortOrder};

/// One write in a save batch.
#[derive(Debug, Clone)]
pub enum StoreWrite {
    /// Insert or overwrite an entity (id must be durable).
    Put(Entity),
    /// Remove an entity.
    Remove(EntityId),
}

impl StoreWrite {
    /// The id this write targets.
    pub fn target(&self) -> EntityId {
        match self {
            StoreWrite::Put(entity) => entity.id,
            StoreWrite::Remove(id) => *id,
        }
    }
}

/// The durable backing store.
///
/// ## Contract
///
/// - `save_batch` is atomic: once it returns `Ok`, every write in the
///   batch is durable; on `Err`, none is.
/// - `allocate_id` never returns the same id twice for the lifetime of
///   the store, including across reopen for persistent implementations.
/// - `fetch` results are ordered per the given [`SortOrder`].
///
/// Implementations must be safe to share across lanes; the engine
/// serializes writes but issues fetches from the root lane while readers
/// may still be draining earlier snapshots.
pub trait DurableStore: Send + Sync + 'static {
    /// Load the entire graph. Called once at database open.
    fn load(&self) -> Result<Vec<Entity>>;

    /// Allocate the next durable entity id.
    fn allocate_id(&self) -> Result<u64>;

    /// Apply a batch of writes atomically.
    fn save_batch(&self, batch: &[StoreWrite]) -> Result<()>;

    /// Fetch entities matching `predicate`, ordered by `order`.
    fn fetch(&self, predicate: &Predicate, order: &SortOrder) -> Result<Vec<Entity>>;
}
