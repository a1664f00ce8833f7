//! Counter collection facade.
//!
//! The counter model is deliberately small: every counter is an entity of
//! kind `Counter` with a text `name` and an integer `count`. The facade
//! keeps one reactive query over the collection, sorted by name, and
//! exposes the two bulk operations the model needs: add a counter and
//! increment every counter by one.

use crate::database::CommitReceipt;
use crate::error::Result;
use loam_core::{Entity, EntityKind, EntityRef, Predicate, SortOrder, Value};
use loam_engine::WillChangeObserver;
use std::sync::Arc;

/// Entity kind for counters.
pub const COUNTER_KIND: &str = "Counter";

/// Property holding the counter's display name.
pub const NAME: &str = "name";

/// Property holding the counter's current count.
pub const COUNT: &str = "count";

/// Live view plus bulk operations over the counter collection.
pub struct Counters {
    db: Arc<loam_engine::Database>,
    query: Arc<loam_engine::ReactiveQuery>,
}

impl Counters {
    pub(crate) fn attach(db: Arc<loam_engine::Database>) -> Result<Self> {
        let query = db.query(
            Predicate::KindIs(EntityKind::new(COUNTER_KIND)),
            SortOrder::by_property(NAME),
        )?;
        Ok(Counters { db, query })
    }

    /// Create a new counter named after its position in the collection
    /// (`Counter #1`, `Counter #2`, ...) with a count of zero.
    ///
    /// The position is read from the live query at dispatch time, so two
    /// racing adds may produce duplicate names; names are labels, not
    /// keys, and the engine allocates distinct ids regardless.
    pub fn add(&self) -> CommitReceipt {
        let ordinal = self.query.len() + 1;
        CommitReceipt {
            inner: self.db.perform(move |ctx| {
                let counter = ctx.create_entity(EntityKind::new(COUNTER_KIND))?;
                ctx.set(counter, NAME, Value::Text(format!("Counter #{}", ordinal)))?;
                ctx.set(counter, COUNT, Value::Int(0))?;
                Ok(())
            }),
        }
    }

    /// Increment every counter's count by one, as a single commit.
    ///
    /// The counters are re-fetched inside the unit of work, so each
    /// increment reads the count the child context observed; concurrent
    /// increments serialize through the root and both land.
    pub fn increment_all(&self) -> CommitReceipt {
        CommitReceipt {
            inner: self.db.perform(|ctx| {
                let counters = ctx.fetch(
                    &Predicate::KindIs(EntityKind::new(COUNTER_KIND)),
                    &SortOrder::by_property(NAME),
                )?;
                for counter in counters {
                    let count = counter.property(COUNT).as_int().unwrap_or(0);
                    ctx.set(EntityRef::new(counter.id), COUNT, Value::Int(count + 1))?;
                }
                Ok(())
            }),
        }
    }

    /// Delete every counter, as a single commit.
    pub fn remove_all(&self) -> CommitReceipt {
        CommitReceipt {
            inner: self.db.perform(|ctx| {
                let counters = ctx.fetch(
                    &Predicate::KindIs(EntityKind::new(COUNTER_KIND)),
                    &SortOrder::by_id(),
                )?;
                for counter in counters {
                    ctx.delete(EntityRef::new(counter.id))?;
                }
                Ok(())
            }),
        }
    }

    /// The current name-ordered snapshot of the collection.
    pub fn all(&self) -> Arc<Vec<Entity>> {
        self.query.results()
    }

    /// Number of counters.
    pub fn len(&self) -> usize {
        self.query.len()
    }

    /// True if there are no counters.
    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    /// Sum of all counts in the current snapshot.
    pub fn total(&self) -> i64 {
        self.query
            .results()
            .iter()
            .map(|c| c.property(COUNT).as_int().unwrap_or(0))
            .sum()
    }

    /// Register an observer fired just before the collection view updates.
    pub fn on_will_change(&self, observer: WillChangeObserver) {
        self.query.on_will_change(observer);
    }
}
