//! Predicates and sort orders for fetches and reactive queries

use crate::entity::Entity;
use crate::types::EntityKind;
use crate::value::Value;
use std::cmp::Ordering;

/// A filter over entities.
///
/// Deliberately not a general query language: the store and the reactive
/// query only need kind and property-equality filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every entity.
    All,
    /// Matches entities of the given kind.
    KindIs(EntityKind),
    /// Matches entities whose property equals the given value.
    PropertyEquals {
        /// Property name.
        name: String,
        /// Required value (type-strict equality).
        value: Value,
    },
    /// Matches when both sub-predicates match.
    And(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Evaluate the predicate against one entity.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Predicate::All => true,
            Predicate::KindIs(kind) => &entity.kind == kind,
            Predicate::PropertyEquals { name, value } => &entity.property(name) == value,
            Predicate::And(a, b) => a.matches(entity) && b.matches(entity),
        }
    }

    /// Combine with another predicate.
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }
}

/// Primary sort key for an ordered fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Sort by a named property (via [`Value::compare`]).
    Property(String),
    /// Sort by entity id.
    Id,
}

/// Sort order for an ordered fetch.
///
/// Entities with equal primary keys always fall back to id order, so
/// re-sorting the same set is stable and unrelated rows never visibly
/// reorder across refreshes.
#[derive(Debug, Clone, PartialEq)]
pub struct SortOrder {
    /// Primary key.
    pub key: SortKey,
    /// Ascending or descending on the primary key.
    pub ascending: bool,
}

impl SortOrder {
    /// Ascending sort on a property.
    pub fn by_property(name: impl Into<String>) -> Self {
        SortOrder {
            key: SortKey::Property(name.into()),
            ascending: true,
        }
    }

    /// Ascending sort by id.
    pub fn by_id() -> Self {
        SortOrder {
            key: SortKey::Id,
            ascending: true,
        }
    }

    /// Flip direction.
    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    /// Compare two entities under this order (id tie-break included).
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let primary = match &self.key {
            SortKey::Property(name) => a.property(name).compare(&b.property(name)),
            SortKey::Id => a.id.cmp(&b.id),
        };
        let primary = if self.ascending {
            primary
        } else {
            primary.reverse()
        };
        primary.then(a.id.cmp(&b.id))
    }

    /// Sort a result set in place under this order.
    pub fn sort(&self, entities: &mut [Entity]) {
        entities.sort_by(|a, b| self.compare(a, b));
    }
}
