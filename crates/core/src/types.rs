//! Core identifier types for the object graph
//!
//! This module defines the fundamental identifiers used throughout the
//! system:
//! - [`EntityId`]: identity of a persisted record
//! - [`EntityKind`]: the record's schema-level kind
//! - [`ContextId`]: identity of a mutation context
//! - [`LaneId`]: identity of a serial execution lane

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an entity in the object graph.
///
/// A durable id is assigned by the store and is stable for the lifetime of
/// the record. A pending id is a context-local placeholder handed out by
/// `create_entity`; it is only meaningful inside the context that minted it
/// and is replaced by a durable id when that context's commit is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    /// Store-assigned, globally unique.
    Durable(u64),
    /// Context-local placeholder, valid only until commit.
    Pending(u64),
}

impl EntityId {
    /// True if this id was assigned by the durable store.
    pub fn is_durable(&self) -> bool {
        matches!(self, EntityId::Durable(_))
    }

    /// True if this id is a pre-commit placeholder.
    pub fn is_pending(&self) -> bool {
        matches!(self, EntityId::Pending(_))
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityId::Durable(n) => write!(f, "entity:{}", n),
            EntityId::Pending(n) => write!(f, "pending:{}", n),
        }
    }
}

/// Schema-level kind of an entity (e.g. `"Counter"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKind(String);

impl EntityKind {
    /// Create a kind from a name.
    pub fn new(name: impl Into<String>) -> Self {
        EntityKind(name.into())
    }

    /// The kind name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityKind {
    fn from(s: &str) -> Self {
        EntityKind::new(s)
    }
}

/// Unique identifier for a mutation context.
///
/// Used in commit batches and error messages to attribute staged changes to
/// the context that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Create a new random context id.
    pub fn new() -> Self {
        ContextId(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a serial execution lane.
///
/// Every context is confined to exactly one lane for its entire lifetime;
/// the lane id is recorded at construction and checked on every entry
/// point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneId(u64);

impl LaneId {
    /// Wrap a raw lane number.
    pub fn from_raw(raw: u64) -> Self {
        LaneId(raw)
    }

    /// The raw lane number.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lane:{}", self.0)
    }
}
