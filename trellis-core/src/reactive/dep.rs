//! Dependency Implementation
//!
//! A [`Dep`] is the atomic observable unit. Every tracked slot and every
//! observed container owns one.
//!
//! # How Deps Work
//!
//! 1. When a tracked value is read while a watcher is evaluating, the value's
//!    dep calls [`Dep::depend`], which asks the active watcher to record it.
//!
//! 2. The watcher decides whether it is a new dependency and, if so,
//!    subscribes itself with [`Dep::add_sub`].
//!
//! 3. When the value changes, [`Dep::notify`] calls `update` on every
//!    subscriber.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::runtime::WeakRuntime;
use super::{Runtime, Subscriber, SubscriberId};

/// Identity of a [`Dep`], unique within its runtime.
pub type DepId = u64;

type SubscriberList = SmallVec<[Arc<dyn Subscriber>; 4]>;

struct DepInner {
    id: DepId,
    subs: Mutex<SubscriberList>,
    runtime: WeakRuntime,
}

/// An observable that any number of subscribers can depend on.
///
/// Clones share the same subscriber list.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

impl Dep {
    /// Create a dep owned by `runtime`.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Arc::new(DepInner {
                id: runtime.next_dep_id(),
                subs: Mutex::new(SmallVec::new()),
                runtime: runtime.downgrade(),
            }),
        }
    }

    /// Get the dep's unique ID.
    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Append a subscriber.
    ///
    /// Callers guarantee the subscriber is not already present; watchers do
    /// this through their own dependency bookkeeping.
    pub fn add_sub(&self, sub: Arc<dyn Subscriber>) {
        self.inner.subs.lock().push(sub);
    }

    /// Remove a subscriber.
    pub fn remove_sub(&self, id: SubscriberId) {
        let mut subs = self.inner.subs.lock();
        if let Some(pos) = subs.iter().position(|s| s.id() == id) {
            subs.remove(pos);
        }
    }

    /// Register the runtime's active target as depending on this dep.
    pub fn depend(&self) {
        let Some(runtime) = self.inner.runtime.upgrade() else {
            return;
        };
        if let Some(target) = runtime.current_target() {
            target.add_dep(self);
        }
    }

    /// Notify every subscriber that this dep changed.
    ///
    /// Iterates over a snapshot, so subscriptions added or removed by the
    /// notified subscribers do not affect this dispatch.
    pub fn notify(&self) {
        let mut subs: SubscriberList = self.inner.subs.lock().clone();

        let batched = self
            .inner
            .runtime
            .upgrade()
            .map(|rt| rt.config().batched)
            .unwrap_or(true);
        if !batched {
            // The scheduler does not order unbatched runs, so fire in
            // creation order here.
            subs.sort_by_key(|s| s.id());
        }

        tracing::trace!(dep = self.inner.id, subscribers = subs.len(), "notify");
        for sub in subs {
            sub.update();
        }
    }

    /// Ids of the current subscribers, in subscription order.
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.inner.subs.lock().iter().map(|s| s.id()).collect()
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subs.lock().len()
    }

    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        self.inner.subs.lock().iter().any(|s| s.id() == id)
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("subscribers", &self.subscriber_ids())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
