//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a tracked value is read,
//! the dependency registers the current computation as a subscriber.
//!
//! # Implementation
//!
//! Each [`Runtime`] owns a stack of targets. Entering an evaluation pushes
//! the subscriber (or `None`, to suspend tracking) and returns a
//! [`TargetGuard`]; dropping the guard pops it. The top of the stack is the
//! active target.
//!
//! This design supports nested evaluations (e.g. a watcher whose getter
//! reads a computed value that evaluates another watcher).

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Runtime, Subscriber, SubscriberId};

/// The stack of evaluation targets.
#[derive(Default)]
pub(crate) struct TargetStack {
    entries: Mutex<Vec<Option<Arc<dyn Subscriber>>>>,
}

impl TargetStack {
    pub(crate) fn push(&self, target: Option<Arc<dyn Subscriber>>) {
        self.entries.lock().push(target);
    }

    /// Pop the top entry, returning the id of the subscriber it named.
    pub(crate) fn pop(&self) -> Option<SubscriberId> {
        let popped = self.entries.lock().pop();
        debug_assert!(popped.is_some(), "reactive target stack popped while empty");
        popped.flatten().map(|target| target.id())
    }

    pub(crate) fn current(&self) -> Option<Arc<dyn Subscriber>> {
        self.entries.lock().last().cloned().flatten()
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Guard that pops the target when dropped.
///
/// This keeps the stack balanced even if the evaluation returns early or
/// panics.
#[must_use = "the target is popped as soon as the guard is dropped"]
pub struct TargetGuard {
    runtime: Runtime,
    subscriber_id: Option<SubscriberId>,
}

impl TargetGuard {
    pub(crate) fn new(runtime: Runtime, subscriber_id: Option<SubscriberId>) -> Self {
        Self {
            runtime,
            subscriber_id,
        }
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        let popped = self.runtime.targets().pop();

        debug_assert_eq!(
            popped, self.subscriber_id,
            "TargetGuard mismatch: expected {:?}, got {:?}",
            self.subscriber_id, popped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Dep;

    struct Probe(SubscriberId);

    impl Subscriber for Probe {
        fn id(&self) -> SubscriberId {
            self.0
        }

        fn add_dep(&self, _dep: &Dep) {}

        fn update(&self) {}
    }

    fn probe(raw: u64) -> Arc<dyn Subscriber> {
        Arc::new(Probe(SubscriberId::from_raw(raw)))
    }

    #[test]
    fn context_tracks_subscriber() {
        let runtime = Runtime::new();

        assert!(!runtime.is_tracking());
        assert!(runtime.current_target().is_none());

        {
            let _guard = runtime.push_target(Some(probe(1)));

            assert!(runtime.is_tracking());
            assert_eq!(
                runtime.current_target().map(|t| t.id()),
                Some(SubscriberId::from_raw(1))
            );
        }

        // Context should be cleaned up after drop
        assert!(!runtime.is_tracking());
        assert_eq!(runtime.target_depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        let runtime = Runtime::new();

        {
            let _outer = runtime.push_target(Some(probe(1)));
            {
                let _inner = runtime.push_target(Some(probe(2)));
                assert_eq!(runtime.current_target().unwrap().id().raw(), 2);
                assert_eq!(runtime.target_depth(), 2);
            }

            // After inner context drops, outer should be current
            assert_eq!(runtime.current_target().unwrap().id().raw(), 1);
        }

        assert!(runtime.current_target().is_none());
    }

    #[test]
    fn none_target_suspends_tracking() {
        let runtime = Runtime::new();
        let _outer = runtime.push_target(Some(probe(7)));

        runtime.untracked(|| {
            assert!(!runtime.is_tracking());
            assert_eq!(runtime.target_depth(), 2);
        });

        assert!(runtime.is_tracking());
    }

    #[test]
    fn guard_pops_on_panic() {
        let runtime = Runtime::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = runtime.push_target(Some(probe(3)));
            panic!("evaluation failed");
        }));

        assert!(result.is_err());
        assert_eq!(runtime.target_depth(), 0);
    }

    #[test]
    fn runtimes_do_not_share_targets() {
        let a = Runtime::new();
        let b = Runtime::new();

        let _guard = a.push_target(Some(probe(1)));
        assert!(a.is_tracking());
        assert!(!b.is_tracking());
    }
}
