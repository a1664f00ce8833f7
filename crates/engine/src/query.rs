//! Reactive queries
//!
//! A [`ReactiveQuery`] keeps a live, ordered projection of the entities
//! matching a predicate. On every diff published for the root context
//! (conservatively: any diff at all), the query signals "will change"
//! observers, recomputes the full result set from the durable store, and
//! replaces the exposed sequence wholesale. Readers on any lane see either
//! the pre- or post-refresh snapshot atomically, never a partially updated
//! one: the result set is an `Arc<Vec<_>>` swapped under a lock.
//!
//! Recomputing from the store (rather than the root's in-memory graph) is
//! what keeps a rejected flush invisible: the coordinator runs before the
//! query on each diff, so by refresh time the store either holds the
//! commit or rejected it, and a rejected commit recomputes to the old
//! result set.

use crate::notifier::{ChangeNotifier, Subscription};
use loam_core::{Entity, Predicate, Result, SortOrder};
use loam_storage::DurableStore;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

/// Observer invoked just before a refresh replaces the result set.
pub type WillChangeObserver = Box<dyn Fn() + Send + Sync + 'static>;

/// A live, ordered projection of matching entities.
pub struct ReactiveQuery {
    predicate: Predicate,
    order: SortOrder,
    store: Arc<dyn DurableStore>,
    results: RwLock<Arc<Vec<Entity>>>,
    will_change: Mutex<Vec<WillChangeObserver>>,
    subscription: Mutex<Option<Subscription>>,
}

impl ReactiveQuery {
    /// Open a query: run the initial fetch and subscribe to the notifier.
    pub(crate) fn open(
        store: Arc<dyn DurableStore>,
        notifier: &Arc<ChangeNotifier>,
        predicate: Predicate,
        order: SortOrder,
    ) -> Result<Arc<Self>> {
        let initial = store.fetch(&predicate, &order)?;
        let query = Arc::new(ReactiveQuery {
            predicate,
            order,
            store,
            results: RwLock::new(Arc::new(initial)),
            will_change: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
        });

        let weak: Weak<ReactiveQuery> = Arc::downgrade(&query);
        let subscription = notifier.subscribe(Arc::new(move |_diff| {
            if let Some(query) = weak.upgrade() {
                query.refresh();
            }
        }));
        *query.subscription.lock() = Some(subscription);
        Ok(query)
    }

    /// The current result snapshot.
    ///
    /// Cheap (one Arc clone) and callable from any lane. The returned
    /// vector never mutates; a refresh swaps in a new one.
    pub fn results(&self) -> Arc<Vec<Entity>> {
        self.results.read().clone()
    }

    /// Number of entities in the current snapshot.
    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    /// True if the current snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }

    /// Register an observer fired (on the root lane) before each refresh
    /// replaces the result set, so it can snapshot current state.
    pub fn on_will_change(&self, observer: WillChangeObserver) {
        self.will_change.lock().push(observer);
    }

    /// Recompute and swap the result set. Runs on the root lane.
    fn refresh(&self) {
        for observer in self.will_change.lock().iter() {
            observer();
        }
        match self.store.fetch(&self.predicate, &self.order) {
            Ok(fresh) => {
                *self.results.write() = Arc::new(fresh);
            }
            Err(e) => {
                // Keep serving the previous snapshot rather than tearing
                // the view down mid-iteration.
                tracing::error!("query refresh failed, keeping stale results: {}", e);
            }
        }
    }
}
