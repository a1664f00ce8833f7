//! Entity: the unit of persistence and conflict resolution
//!
//! An [`Entity`] is a mutable record with a stable identity, a kind, and an
//! ordered set of named properties. The same logical entity may exist as
//! distinct in-memory projections in different contexts at the same time;
//! projections are reconciled only at commit time by the merge policy.

use crate::types::{EntityId, EntityKind};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The whole object graph, keyed by entity id.
///
/// A `BTreeMap` so that iteration order (and thus batch and diff
/// computation) is deterministic.
pub type Graph = BTreeMap<EntityId, Entity>;

/// A record in the object graph.
///
/// Properties are held in a `BTreeMap` so iteration (and therefore
/// serialization and diff computation) is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identity, assigned by the store at first durable commit.
    pub id: EntityId,
    /// Schema-level kind.
    pub kind: EntityKind,
    /// Named, typed properties.
    pub properties: BTreeMap<String, Value>,
}

impl Entity {
    /// Create an entity with no properties.
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Entity {
            id,
            kind,
            properties: BTreeMap::new(),
        }
    }

    /// Get a property value, `Value::Null` if absent.
    ///
    /// Absence and an explicit `Null` are indistinguishable on read; the
    /// merge policy treats them identically as well.
    pub fn property(&self, name: &str) -> Value {
        self.properties.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Set a property value.
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    /// Rebind this entity to a different id, e.g. when a pending
    /// placeholder is replaced by a durable id.
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }
}

/// A handle to an entity as seen by one context.
///
/// The reference carries only the id; property access goes through the
/// owning context so that staged (uncommitted) values are visible to the
/// context that staged them and to nobody else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    /// The referenced entity's id (possibly still pending).
    pub id: EntityId,
}

impl EntityRef {
    /// Wrap an id in a reference.
    pub fn new(id: EntityId) -> Self {
        EntityRef { id }
    }
}

impl From<EntityId> for EntityRef {
    fn from(id: EntityId) -> Self {
        EntityRef { id }
    }
}
