//! Synchronization coordinator
//!
//! Changes a child commit lands in the root context are only in memory
//! until the root flushes; relying on background commits alone would
//! silently drop them. The coordinator closes that gap: it is the first
//! subscriber on the root notifier, and on every diff it flushes the
//! root's unflushed entries to the durable store. Flushing with nothing
//! staged is a no-op and emits nothing.

use crate::notifier::Subscription;
use crate::RootShared;
use std::sync::{Arc, Weak};

/// First subscriber on the root context; flushes on every diff.
pub struct SyncCoordinator {
    _subscription: Subscription,
}

impl SyncCoordinator {
    /// Attach to a root context. Must be called before any query is opened
    /// so the store is current by the time queries recompute.
    pub(crate) fn attach(root: &Arc<RootShared>) -> SyncCoordinator {
        let weak: Weak<RootShared> = Arc::downgrade(root);
        let subscription = root.notifier.subscribe(Arc::new(move |_diff| {
            let root = match weak.upgrade() {
                Some(root) => root,
                None => return,
            };
            let mut inner = root.inner.lock();
            match inner.flush() {
                Ok(_) => {}
                Err(e) => {
                    // Surfaced on the originating commit's receipt; the
                    // root has already rolled the entries back.
                    inner.note_flush_failure(e);
                }
            }
        }));
        SyncCoordinator {
            _subscription: subscription,
        }
    }
}
