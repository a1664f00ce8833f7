//! Merge policy: property-level, committing-side wins
//!
//! When a context's staged update reaches a parent whose copy of the same
//! entity has diverged, conflicts are resolved per property, not per
//! entity. The committing side's new value always wins on properties it
//! touched; properties it never touched keep whatever the parent currently
//! has. This avoids lost updates on untouched properties while keeping
//! last-writer-wins determinism on contended ones: the outcome is a
//! function of each property's `(parent, observed, new)` triple and never
//! of commit interleaving.

use loam_core::{Entity, PropertyChange, Value};
use std::collections::BTreeMap;

/// Resolve one property conflict.
///
/// Total and side-effect free: for every triple the committing side's new
/// value is the final value, whether or not the parent diverged from what
/// the committing context observed.
pub fn resolve(parent: &Value, observed: &Value, new: &Value) -> Value {
    let _ = (parent, observed);
    new.clone()
}

/// Apply a staged change set to the parent's current copy of an entity.
///
/// Touched properties go through [`resolve`]; untouched properties are left
/// exactly as the parent has them. Returns true if any property actually
/// changed value, so a commit that rewrites identical values contributes
/// nothing to the change diff.
pub fn apply_changes(parent: &mut Entity, changes: &BTreeMap<String, PropertyChange>) -> bool {
    let mut changed = false;
    for (name, change) in changes {
        let current = parent.property(name);
        let resolved = resolve(&current, &change.observed, &change.new);
        if resolved != current {
            parent.set_property(name.clone(), resolved);
            changed = true;
        }
    }
    changed
}

/// Rebuild an entity the parent no longer has from the committing side's
/// view: its observed snapshot plus its staged changes.
///
/// Entity-level corollary of committing-side-wins: an update racing a
/// delete re-inserts the record.
pub fn rebuild_from_observed(
    observed: &Entity,
    changes: &BTreeMap<String, PropertyChange>,
) -> Entity {
    let mut rebuilt = observed.clone();
    for (name, change) in changes {
        rebuilt.set_property(name.clone(), change.new.clone());
    }
    rebuilt
}
