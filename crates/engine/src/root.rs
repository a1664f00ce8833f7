//! Root context
//!
//! The root context is the long-lived context whose parent is the durable
//! store. It receives commit batches from child contexts on its owning
//! lane, resolves conflicts through the merge policy, tracks
//! applied-but-unflushed entries with pre-images so a failed flush can be
//! rolled back, and cycles `Open → Committing → Open` for the lifetime of
//! the database.

use loam_concurrency::merge;
use loam_concurrency::{ContextState, Lane};
use loam_core::{
    ChangeDiff, CommitBatch, ContextId, Entity, EntityId, Error, Graph, LaneId, Mutation, Result,
};
use loam_storage::{DurableStore, StoreWrite};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Unflushed entry with enough state to undo it.
#[derive(Debug, Clone)]
enum DirtyEntry {
    /// Entity written; `previous` is its pre-image (None for fresh inserts).
    Put { previous: Option<Entity> },
    /// Entity removed; `previous` is the removed record.
    Remove { previous: Entity },
}

/// The store-parented root context.
pub struct RootContext {
    id: ContextId,
    lane: LaneId,
    store: Arc<dyn DurableStore>,
    graph: Graph,
    dirty: BTreeMap<EntityId, DirtyEntry>,
    state: ContextState,
    flush_failure: Option<Error>,
}

impl RootContext {
    /// Create the root context over an already-loaded graph, confined to
    /// the given lane.
    pub fn new(lane: LaneId, store: Arc<dyn DurableStore>, graph: Graph) -> Self {
        RootContext {
            id: ContextId::new(),
            lane,
            store,
            graph,
            dirty: BTreeMap::new(),
            state: ContextState::Open,
            flush_failure: None,
        }
    }

    /// This context's id.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// True if entries were applied in memory but not yet flushed.
    pub fn has_unflushed(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Clone of the current graph, for publishing snapshots.
    pub fn graph_clone(&self) -> Graph {
        self.graph.clone()
    }

    fn guard(&self) -> Result<()> {
        if Lane::current() != Some(self.lane) {
            let err = Error::ConfinementViolation {
                context: self.id,
                owner: self.lane,
                caller: Lane::caller_description(),
            };
            tracing::error!(context = %self.id, owner = %self.lane, "{}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Apply a child context's commit batch.
    ///
    /// Inserts get durable ids allocated from the store; updates go through
    /// the merge policy property by property; an update whose target the
    /// root deleted since the child's snapshot re-inserts it from the
    /// child's observed copy. Returns the canonical diff (None when the
    /// batch had no net effect) and the durable ids assigned to the batch's
    /// inserts, in staging order.
    pub fn apply_batch(
        &mut self,
        batch: CommitBatch,
    ) -> Result<(Option<ChangeDiff>, Vec<EntityId>)> {
        self.guard()?;
        self.state = ContextState::Committing;

        let mut inserted = BTreeSet::new();
        let mut deleted = BTreeSet::new();
        let mut updated = BTreeSet::new();
        let mut assigned = Vec::new();

        for mutation in batch.mutations {
            match mutation {
                Mutation::Insert {
                    kind, properties, ..
                } => {
                    let raw = match self.store.allocate_id() {
                        Ok(raw) => raw,
                        Err(e) => {
                            self.state = ContextState::Open;
                            return Err(e);
                        }
                    };
                    let id = EntityId::Durable(raw);
                    let mut entity = Entity::new(id, kind);
                    entity.properties = properties;
                    self.graph.insert(id, entity);
                    self.mark_put(id, None);
                    inserted.insert(id);
                    assigned.push(id);
                }
                Mutation::Update {
                    id,
                    observed,
                    changes,
                } => match self.graph.get(&id) {
                    Some(current) => {
                        let previous = current.clone();
                        let mut merged = previous.clone();
                        if merge::apply_changes(&mut merged, &changes) {
                            self.graph.insert(id, merged);
                            self.mark_put(id, Some(previous));
                            updated.insert(id);
                        }
                    }
                    None => {
                        // Deleted here after the child's snapshot; the
                        // committing side wins and the record reappears.
                        let rebuilt = merge::rebuild_from_observed(&observed, &changes);
                        self.graph.insert(id, rebuilt);
                        self.mark_put(id, None);
                        inserted.insert(id);
                    }
                },
                Mutation::Delete { id } => {
                    if let Some(previous) = self.graph.remove(&id) {
                        self.mark_remove(id, previous);
                        deleted.insert(id);
                    }
                }
            }
        }

        self.state = ContextState::Open;
        tracing::debug!(
            source = %batch.source,
            inserted = inserted.len(),
            deleted = deleted.len(),
            updated = updated.len(),
            "applied commit batch"
        );
        Ok((ChangeDiff::new(inserted, deleted, updated), assigned))
    }

    fn mark_put(&mut self, id: EntityId, previous: Option<Entity>) {
        // Keep the oldest pre-image so a revert lands on flushed state.
        self.dirty
            .entry(id)
            .or_insert(DirtyEntry::Put { previous });
    }

    fn mark_remove(&mut self, id: EntityId, previous: Entity) {
        match self.dirty.remove(&id) {
            // Inserted and deleted since the last flush: net nothing.
            Some(DirtyEntry::Put { previous: None }) => {}
            Some(DirtyEntry::Put {
                previous: Some(flushed),
            }) => {
                self.dirty
                    .insert(id, DirtyEntry::Remove { previous: flushed });
            }
            Some(entry @ DirtyEntry::Remove { .. }) => {
                self.dirty.insert(id, entry);
            }
            None => {
                self.dirty.insert(id, DirtyEntry::Remove { previous });
            }
        }
    }

    /// Flush applied-but-unflushed entries to the durable store.
    ///
    /// No-op (returns false) when nothing is unflushed. On store failure
    /// the dirty entries are rolled back from their pre-images and the
    /// staged changes are gone: surface-and-discard, never silent retry.
    pub fn flush(&mut self) -> Result<bool> {
        self.guard()?;
        if self.dirty.is_empty() {
            return Ok(false);
        }

        let mut writes = Vec::with_capacity(self.dirty.len());
        for (id, entry) in &self.dirty {
            match entry {
                DirtyEntry::Put { .. } => {
                    let entity = self.graph.get(id).ok_or_else(|| {
                        Error::Internal(format!("dirty entry {} missing from graph", id))
                    })?;
                    writes.push(StoreWrite::Put(entity.clone()));
                }
                DirtyEntry::Remove { .. } => writes.push(StoreWrite::Remove(*id)),
            }
        }

        match self.store.save_batch(&writes) {
            Ok(()) => {
                self.dirty.clear();
                tracing::debug!(writes = writes.len(), "flushed to durable store");
                Ok(true)
            }
            Err(e) => {
                self.discard_unflushed();
                let failure = Error::CommitFailure(e.to_string());
                tracing::error!("flush rejected by store, staged changes discarded: {}", e);
                Err(failure)
            }
        }
    }

    /// Roll applied-but-unflushed entries back to their pre-images.
    pub fn discard_unflushed(&mut self) {
        for (id, entry) in std::mem::take(&mut self.dirty) {
            match entry {
                DirtyEntry::Put { previous: None } => {
                    self.graph.remove(&id);
                }
                DirtyEntry::Put {
                    previous: Some(entity),
                }
                | DirtyEntry::Remove { previous: entity } => {
                    self.graph.insert(id, entity);
                }
            }
        }
    }

    /// Record a flush failure for the commit currently being applied.
    pub fn note_flush_failure(&mut self, error: Error) {
        self.flush_failure = Some(error);
    }

    /// Take the flush failure recorded during the current publish, if any.
    pub fn take_flush_failure(&mut self) -> Option<Error> {
        self.flush_failure.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::{ContextId, EntityKind, PropertyChange, Value};
    use loam_storage::MemoryStore;

    fn on_root_lane<R: Send + 'static>(f: impl FnOnce(LaneId) -> R + Send + 'static) -> R {
        let lane = Lane::spawn("root-test");
        let id = lane.id();
        lane.run_sync(move || f(id)).unwrap()
    }

    fn insert_batch(name: &str) -> CommitBatch {
        let mut properties = BTreeMap::new();
        properties.insert("name".to_string(), Value::Text(name.into()));
        properties.insert("count".to_string(), Value::Int(0));
        CommitBatch {
            source: ContextId::new(),
            mutations: vec![Mutation::Insert {
                placeholder: EntityId::Pending(0),
                kind: EntityKind::new("Counter"),
                properties,
            }],
        }
    }

    fn update_batch(id: EntityId, observed: Entity, prop: &str, was: Value, now: Value) -> CommitBatch {
        let mut changes = BTreeMap::new();
        changes.insert(
            prop.to_string(),
            PropertyChange {
                observed: was,
                new: now,
            },
        );
        CommitBatch {
            source: ContextId::new(),
            mutations: vec![Mutation::Update {
                id,
                observed,
                changes,
            }],
        }
    }

    #[test]
    fn insert_assigns_durable_id_and_diff() {
        on_root_lane(|lane| {
            let store = Arc::new(MemoryStore::new());
            let mut root = RootContext::new(lane, store, Graph::new());

            let (diff, assigned) = root.apply_batch(insert_batch("Counter #1")).unwrap();
            let diff = diff.unwrap();
            assert_eq!(assigned.len(), 1);
            assert!(assigned[0].is_durable());
            assert!(diff.inserted().contains(&assigned[0]));
            assert!(root.has_unflushed());
        });
    }

    #[test]
    fn empty_batch_yields_no_diff() {
        on_root_lane(|lane| {
            let store = Arc::new(MemoryStore::new());
            let mut root = RootContext::new(lane, store, Graph::new());
            let (diff, assigned) = root
                .apply_batch(CommitBatch::empty(ContextId::new()))
                .unwrap();
            assert!(diff.is_none());
            assert!(assigned.is_empty());
            assert!(!root.has_unflushed());
        });
    }

    #[test]
    fn identical_update_yields_no_diff() {
        on_root_lane(|lane| {
            let store = Arc::new(MemoryStore::new());
            let mut root = RootContext::new(lane, store.clone(), Graph::new());
            let (_, assigned) = root.apply_batch(insert_batch("Counter #1")).unwrap();
            root.flush().unwrap();

            let id = assigned[0];
            let observed = root.graph_clone()[&id].clone();
            let (diff, _) = root
                .apply_batch(update_batch(id, observed, "count", Value::Int(0), Value::Int(0)))
                .unwrap();
            assert!(diff.is_none());
            assert!(!root.has_unflushed());
        });
    }

    #[test]
    fn flush_with_nothing_staged_is_noop() {
        on_root_lane(|lane| {
            let store = Arc::new(MemoryStore::new());
            let mut root = RootContext::new(lane, store, Graph::new());
            assert!(!root.flush().unwrap());
        });
    }

    #[test]
    fn flush_persists_and_clears_dirty() {
        on_root_lane(|lane| {
            let store = Arc::new(MemoryStore::new());
            let mut root = RootContext::new(lane, store.clone(), Graph::new());
            root.apply_batch(insert_batch("Counter #1")).unwrap();

            assert!(root.flush().unwrap());
            assert!(!root.has_unflushed());
            assert_eq!(store.len(), 1);
        });
    }

    #[test]
    fn update_racing_delete_reinserts() {
        on_root_lane(|lane| {
            let store = Arc::new(MemoryStore::new());
            let mut root = RootContext::new(lane, store, Graph::new());
            let (_, assigned) = root.apply_batch(insert_batch("Counter #1")).unwrap();
            root.flush().unwrap();
            let id = assigned[0];
            let observed = root.graph_clone()[&id].clone();

            // Root-side delete lands first.
            let delete = CommitBatch {
                source: ContextId::new(),
                mutations: vec![Mutation::Delete { id }],
            };
            root.apply_batch(delete).unwrap();
            root.flush().unwrap();

            // A stale child's update wins and brings the record back.
            let (diff, _) = root
                .apply_batch(update_batch(
                    id,
                    observed,
                    "count",
                    Value::Int(0),
                    Value::Int(1),
                ))
                .unwrap();
            let diff = diff.unwrap();
            assert!(diff.inserted().contains(&id));
            assert_eq!(root.graph_clone()[&id].property("count"), Value::Int(1));
            assert_eq!(
                root.graph_clone()[&id].property("name"),
                Value::Text("Counter #1".into())
            );
        });
    }

    #[test]
    fn cross_lane_apply_is_a_confinement_violation() {
        let lane = Lane::spawn("root-owner");
        let store = Arc::new(MemoryStore::new());
        let mut root = RootContext::new(lane.id(), store, Graph::new());
        // Applied from the test thread, not the owning lane.
        let err = root.apply_batch(insert_batch("Counter #1")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn failed_flush_rolls_back_graph() {
        struct RejectingStore(MemoryStore);
        impl DurableStore for RejectingStore {
            fn load(&self) -> Result<Vec<Entity>> {
                self.0.load()
            }
            fn allocate_id(&self) -> Result<u64> {
                self.0.allocate_id()
            }
            fn save_batch(&self, _batch: &[StoreWrite]) -> Result<()> {
                Err(Error::Store("disk full".to_string()))
            }
            fn fetch(
                &self,
                predicate: &loam_core::Predicate,
                order: &loam_core::SortOrder,
            ) -> Result<Vec<Entity>> {
                self.0.fetch(predicate, order)
            }
        }

        on_root_lane(|lane| {
            let store = Arc::new(RejectingStore(MemoryStore::new()));
            let mut root = RootContext::new(lane, store, Graph::new());
            root.apply_batch(insert_batch("Counter #1")).unwrap();
            assert!(root.has_unflushed());

            let err = root.flush().unwrap_err();
            assert!(err.is_commit_failure());
            // The applied insert is rolled back, not retried.
            assert!(!root.has_unflushed());
            assert!(root.graph_clone().is_empty());
        });
    }
}
