//! Typed change diffs
//!
//! A [`ChangeDiff`] is the canonical description of one commit's net effect
//! on a context: which entities were inserted, deleted, and updated (where
//! "updated" includes externally refreshed entities). Diffs are non-empty
//! by construction; a commit with no net effect produces no diff at all, so
//! no-op saves never cause observer churn.

use crate::types::EntityId;
use std::collections::BTreeSet;

/// Immutable net effect of one commit.
///
/// The three sets are disjoint. Construction canonicalizes the raw
/// collections: an entity both inserted and deleted in the same commit
/// cancels out entirely, and an entity both inserted and updated collapses
/// to inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDiff {
    inserted: BTreeSet<EntityId>,
    deleted: BTreeSet<EntityId>,
    updated: BTreeSet<EntityId>,
}

impl ChangeDiff {
    /// Build a diff from raw inserted/deleted/updated collections.
    ///
    /// Returns `None` when the canonical net effect is empty.
    pub fn new(
        inserted: BTreeSet<EntityId>,
        deleted: BTreeSet<EntityId>,
        mut updated: BTreeSet<EntityId>,
    ) -> Option<Self> {
        // insert+delete in one commit is a no-op; insert+update is an insert
        let cancelled: BTreeSet<EntityId> = inserted.intersection(&deleted).copied().collect();
        let inserted: BTreeSet<EntityId> =
            inserted.difference(&cancelled).copied().collect();
        let deleted: BTreeSet<EntityId> = deleted.difference(&cancelled).copied().collect();
        updated.retain(|id| !inserted.contains(id) && !deleted.contains(id));

        if inserted.is_empty() && deleted.is_empty() && updated.is_empty() {
            return None;
        }
        Some(ChangeDiff {
            inserted,
            deleted,
            updated,
        })
    }

    /// Entities created by the commit.
    pub fn inserted(&self) -> &BTreeSet<EntityId> {
        &self.inserted
    }

    /// Entities removed by the commit.
    pub fn deleted(&self) -> &BTreeSet<EntityId> {
        &self.deleted
    }

    /// Entities whose properties changed (or were refreshed).
    pub fn updated(&self) -> &BTreeSet<EntityId> {
        &self.updated
    }

    /// Total number of affected entities.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.deleted.len() + self.updated.len()
    }

    /// Always false: empty diffs are unrepresentable.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True if the diff mentions the given entity in any set.
    pub fn touches(&self, id: &EntityId) -> bool {
        self.inserted.contains(id) || self.deleted.contains(id) || self.updated.contains(id)
    }
}
