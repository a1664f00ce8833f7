//! Staged mutations and commit batches
//!
//! A context stages its work as [`Mutation`]s; `commit` packages the net
//! staged set into a [`CommitBatch`] which is applied atomically (within
//! the receiving context's lane) by the parent.

use crate::entity::Entity;
use crate::types::{ContextId, EntityId, EntityKind};
use crate::value::Value;
use std::collections::BTreeMap;

/// One property's staged change, as a triple the merge policy can resolve.
///
/// `observed` is the value the staging context last read from its parent
/// snapshot (`Null` if the property was absent); `new` is the value the
/// context wants to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    /// Value at the context's snapshot.
    pub observed: Value,
    /// Value the context is committing.
    pub new: Value,
}

/// A single staged mutation.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// A new entity, identified by the creating context's placeholder id.
    Insert {
        /// The context-local pending id.
        placeholder: EntityId,
        /// Kind of the new entity.
        kind: EntityKind,
        /// Initial property values.
        properties: BTreeMap<String, Value>,
    },
    /// Property changes to an existing entity.
    ///
    /// `observed` carries the full entity as the context's snapshot had it.
    /// It is the re-insert source when the parent deleted the entity after
    /// the snapshot was taken (committing side wins at entity level too).
    Update {
        /// The durable id being updated.
        id: EntityId,
        /// The entity as the committing context observed it.
        observed: Entity,
        /// Per-property staged changes, keyed by property name.
        changes: BTreeMap<String, PropertyChange>,
    },
    /// Removal of an existing entity.
    Delete {
        /// The durable id being deleted.
        id: EntityId,
    },
}

impl Mutation {
    /// The id this mutation targets.
    pub fn target(&self) -> EntityId {
        match self {
            Mutation::Insert { placeholder, .. } => *placeholder,
            Mutation::Update { id, .. } => *id,
            Mutation::Delete { id } => *id,
        }
    }
}

/// The net staged mutations of one context, in staging order.
#[derive(Debug, Clone)]
pub struct CommitBatch {
    /// The committing context.
    pub source: ContextId,
    /// Net mutations, one per touched entity.
    pub mutations: Vec<Mutation>,
}

impl CommitBatch {
    /// A batch with no mutations (a no-op commit).
    pub fn empty(source: ContextId) -> Self {
        CommitBatch {
            source,
            mutations: Vec::new(),
        }
    }

    /// True if the batch stages nothing.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}
