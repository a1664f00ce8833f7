//! Change notification
//!
//! Every successful commit into a context produces one typed
//! [`ChangeDiff`], delivered to exactly the subscribers registered on that
//! context. Delivery happens on the context's owning lane, synchronously
//! within the commit that produced the diff, so diffs from one context are
//! never reordered.

use loam_core::ChangeDiff;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Callback invoked with each published diff.
pub type DiffHandler = Arc<dyn Fn(&ChangeDiff) + Send + Sync + 'static>;

/// Subscriber registry for one context.
///
/// Subscribers are invoked in registration order. `publish` iterates over a
/// snapshot of the registry, so a handler may subscribe or unsubscribe
/// (including dropping its own [`Subscription`]) without invalidating a
/// delivery already in flight.
pub struct ChangeNotifier {
    subscribers: Mutex<Vec<(u64, DiffHandler)>>,
    next_token: AtomicU64,
}

impl ChangeNotifier {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(ChangeNotifier {
            subscribers: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        })
    }

    /// Register a handler; the returned subscription unregisters on drop.
    pub fn subscribe(self: &Arc<Self>, handler: DiffHandler) -> Subscription {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().push((token, handler));
        Subscription {
            token,
            notifier: Arc::downgrade(self),
        }
    }

    /// Deliver a diff to all current subscribers, in registration order.
    pub fn publish(&self, diff: &ChangeDiff) {
        let handlers: Vec<DiffHandler> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(diff);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn unsubscribe(&self, token: u64) {
        self.subscribers.lock().retain(|(t, _)| *t != token);
    }
}

/// Handle for one registered diff handler; unregisters on drop.
pub struct Subscription {
    token: u64,
    notifier: Weak<ChangeNotifier>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.unsubscribe(self.token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::EntityId;
    use std::collections::BTreeSet;

    fn diff_of(id: u64) -> ChangeDiff {
        let mut inserted = BTreeSet::new();
        inserted.insert(EntityId::Durable(id));
        ChangeDiff::new(inserted, BTreeSet::new(), BTreeSet::new()).unwrap()
    }

    #[test]
    fn delivers_in_registration_order() {
        let notifier = ChangeNotifier::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_a = log.clone();
        let _a = notifier.subscribe(Arc::new(move |_| log_a.lock().push("a")));
        let log_b = log.clone();
        let _b = notifier.subscribe(Arc::new(move |_| log_b.lock().push("b")));

        notifier.publish(&diff_of(1));
        assert_eq!(&*log.lock(), &["a", "b"]);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicU64::new(0));
        let count2 = count.clone();
        let sub = notifier.subscribe(Arc::new(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        notifier.publish(&diff_of(1));
        drop(sub);
        notifier.publish(&diff_of(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn handler_may_unsubscribe_another_mid_delivery() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicU64::new(0));

        let hits2 = hits.clone();
        let second = notifier.subscribe(Arc::new(move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        }));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(Some(second)));

        let slot2 = slot.clone();
        let _first = notifier.subscribe(Arc::new(move |_| {
            // Tears down the other subscription while delivery is running.
            slot2.lock().take();
        }));

        // The snapshot taken at publish time still includes the second
        // handler for this delivery.
        notifier.publish(&diff_of(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        notifier.publish(&diff_of(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
