//! Mutation contexts
//!
//! A [`Context`] is a thread-confined staging area over the object graph.
//! It captures an immutable snapshot of its parent's published graph at
//! creation, stages inserts/updates/deletes privately, and packages the net
//! staged set into a [`CommitBatch`] exactly once. Retirement is enforced
//! by ownership: sealing the batch consumes the context, so a child context
//! is structurally a one-shot unit of work.
//!
//! Confinement: the context records the lane it was created on; every entry
//! point checks the calling lane and fails with a confinement violation on
//! mismatch. That error is fatal by contract and is logged at error level
//! here so it reaches diagnostics even if a caller drops it.

use crate::lane::Lane;
use loam_core::{
    CommitBatch, ContextId, Entity, EntityId, EntityKind, EntityRef, Error, Graph, LaneId,
    Mutation, Predicate, PropertyChange, Result, SortOrder, Value,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle of a context.
///
/// Child contexts go `Open → Committing` and are then consumed; the root
/// context cycles `Open → Committing → Open` for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Accepting stages.
    Open,
    /// Sealing a commit batch.
    Committing,
    /// Terminal: the batch was applied.
    Committed,
    /// Terminal: the commit was rejected.
    Failed,
}

#[derive(Debug, Clone)]
enum Staged {
    Insert {
        kind: EntityKind,
        properties: BTreeMap<String, Value>,
    },
    Update {
        changes: BTreeMap<String, PropertyChange>,
    },
    Delete,
}

/// A thread-confined staging area over the object graph.
pub struct Context {
    id: ContextId,
    lane: LaneId,
    snapshot: Arc<Graph>,
    staged: BTreeMap<EntityId, Staged>,
    order: Vec<EntityId>,
    next_pending: u64,
    state: ContextState,
}

impl Context {
    /// Create a context over a parent snapshot, confined to the calling
    /// lane.
    pub fn new(snapshot: Arc<Graph>) -> Result<Self> {
        let lane = Lane::current().ok_or_else(|| {
            Error::Internal("contexts can only be created on an execution lane".to_string())
        })?;
        Ok(Context {
            id: ContextId::new(),
            lane,
            snapshot,
            staged: BTreeMap::new(),
            order: Vec::new(),
            next_pending: 0,
            state: ContextState::Open,
        })
    }

    /// This context's id.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The lane this context is confined to.
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// True if anything is staged.
    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty()
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
        if self.state != ContextState::Open {
            return Err(Error::ContextRetired(self.id));
        }
        Ok(())
    }

    /// Stage a new entity; returns a reference carrying a pending id that
    /// stays valid only until this context commits.
    pub fn create_entity(&mut self, kind: EntityKind) -> Result<EntityRef> {
        self.guard()?;
        let id = EntityId::Pending(self.next_pending);
        self.next_pending += 1;
        self.staged.insert(
            id,
            Staged::Insert {
                kind,
                properties: BTreeMap::new(),
            },
        );
        self.order.push(id);
        Ok(EntityRef::new(id))
    }

    /// Stage a property write.
    ///
    /// Fails with [`Error::StaleReference`] if the entity was deleted in
    /// this context or is unknown to its snapshot (deleted in an ancestor
    /// before the snapshot was taken).
    pub fn set(&mut self, entity: EntityRef, property: &str, value: Value) -> Result<()> {
        self.guard()?;
        let id = entity.id;
        match self.staged.get_mut(&id) {
            Some(Staged::Delete) => Err(Error::StaleReference(id)),
            Some(Staged::Insert { properties, .. }) => {
                properties.insert(property.to_string(), value);
                Ok(())
            }
            Some(Staged::Update { changes }) => {
                let observed = self
                    .snapshot
                    .get(&id)
                    .map(|e| e.property(property))
                    .unwrap_or(Value::Null);
                changes
                    .entry(property.to_string())
                    .and_modify(|c| c.new = value.clone())
                    .or_insert(PropertyChange {
                        observed,
                        new: value,
                    });
                Ok(())
            }
            None => {
                // First touch of this entity in this context.
                let snapshot_entity = match id {
                    EntityId::Pending(_) => return Err(Error::StaleReference(id)),
                    EntityId::Durable(_) => {
                        self.snapshot.get(&id).ok_or(Error::StaleReference(id))?
                    }
                };
                let mut changes = BTreeMap::new();
                changes.insert(
                    property.to_string(),
                    PropertyChange {
                        observed: snapshot_entity.property(property),
                        new: value,
                    },
                );
                self.staged.insert(id, Staged::Update { changes });
                self.order.push(id);
                Ok(())
            }
        }
    }

    /// Stage a delete. Deleting an entity created in this context cancels
    /// the pending insert.
    pub fn delete(&mut self, entity: EntityRef) -> Result<()> {
        self.guard()?;
        let id = entity.id;
        match self.staged.get(&id) {
            Some(Staged::Insert { .. }) => {
                self.staged.remove(&id);
                self.order.retain(|other| *other != id);
                Ok(())
            }
            Some(Staged::Delete) => Err(Error::StaleReference(id)),
            Some(Staged::Update { .. }) => {
                self.staged.insert(id, Staged::Delete);
                Ok(())
            }
            None => {
                if !self.snapshot.contains_key(&id) {
                    return Err(Error::StaleReference(id));
                }
                self.staged.insert(id, Staged::Delete);
                self.order.push(id);
                Ok(())
            }
        }
    }

    /// Read one entity through this context's view (snapshot plus its own
    /// staged changes). Returns `None` for unknown or deleted entities.
    pub fn get(&self, entity: EntityRef) -> Result<Option<Entity>> {
        self.guard()?;
        Ok(self.view(entity.id))
    }

    /// Fetch entities matching a predicate through this context's view.
    pub fn fetch(&self, predicate: &Predicate, order: &SortOrder) -> Result<Vec<Entity>> {
        self.guard()?;
        let mut matched: Vec<Entity> = self
            .snapshot
            .keys()
            .chain(self.staged.keys())
            .copied()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| self.view(id))
            .filter(|e| predicate.matches(e))
            .collect();
        order.sort(&mut matched);
        Ok(matched)
    }

    fn view(&self, id: EntityId) -> Option<Entity> {
        match self.staged.get(&id) {
            Some(Staged::Delete) => None,
            Some(Staged::Insert { kind, properties }) => {
                let mut entity = Entity::new(id, kind.clone());
                entity.properties = properties.clone();
                Some(entity)
            }
            Some(Staged::Update { changes }) => {
                let mut entity = self.snapshot.get(&id)?.clone();
                for (name, change) in changes {
                    entity.set_property(name.clone(), change.new.clone());
                }
                Some(entity)
            }
            None => self.snapshot.get(&id).cloned(),
        }
    }

    /// Seal the net staged mutations into a commit batch, consuming the
    /// context. The batch preserves staging order.
    pub fn into_commit_batch(mut self) -> Result<CommitBatch> {
        self.guard()?;
        self.state = ContextState::Committing;
        let mut mutations = Vec::with_capacity(self.order.len());
        for id in &self.order {
            let staged = match self.staged.get(id) {
                Some(staged) => staged,
                None => continue, // cancelled insert
            };
            match staged {
                Staged::Insert { kind, properties } => mutations.push(Mutation::Insert {
                    placeholder: *id,
                    kind: kind.clone(),
                    properties: properties.clone(),
                }),
                Staged::Update { changes } => {
                    let observed = self.snapshot.get(id).ok_or_else(|| {
                        Error::Internal(format!("staged update for {} lost its snapshot", id))
                    })?;
                    mutations.push(Mutation::Update {
                        id: *id,
                        observed: observed.clone(),
                        changes: changes.clone(),
                    });
                }
                Staged::Delete => mutations.push(Mutation::Delete { id: *id }),
            }
        }
        Ok(CommitBatch {
            source: self.id,
            mutations,
        })
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("lane", &self.lane)
            .field("state", &self.state)
            .field("staged", &self.staged.len())
            .finish()
    }
}
