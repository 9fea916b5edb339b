//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects dependencies,
//! observed values and watchers. Every [`Dep`](super::Dep), monitor and
//! watcher belongs to exactly one runtime.
//!
//! # How It Works
//!
//! 1. A watcher evaluates under [`Runtime::push_target`], which makes it the
//!    active target.
//!
//! 2. Tracked reads call [`Dep::depend`](super::Dep::depend), which looks up
//!    the active target through the runtime that created the dep.
//!
//! 3. When a dep notifies, watchers either mark themselves dirty (lazy), run
//!    on the spot (sync), or are handed to the runtime's [`Scheduler`].
//!
//! # Instances
//!
//! There is no global state: two runtimes never see each other's targets,
//! ids or scheduler queues. A `Runtime` is a cheap handle; clones share state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::context::{TargetGuard, TargetStack};
use super::{Scope, Subscriber, SubscriberId};
use crate::config::RuntimeConfig;
use crate::error::{Error, ErrorSink, LogErrorSink};
use crate::graph::{FlushQueue, Scheduler};

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    observing: AtomicBool,
    targets: TargetStack,
    next_dep_id: AtomicU64,
    next_subscriber_id: AtomicU64,
    scheduler: Arc<dyn Scheduler>,
    error_sink: Arc<dyn ErrorSink>,
}

/// Handle to a reactive runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

/// Non-owning runtime handle, held by deps and monitors.
#[derive(Clone, Default)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

/// Builder for a [`Runtime`] with injected collaborators.
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    error_sink: Option<Arc<dyn ErrorSink>>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default [`FlushQueue`].
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Replace the default [`LogErrorSink`].
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    pub fn build(self) -> Runtime {
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(FlushQueue::from_config(&self.config)));
        let error_sink = self.error_sink.unwrap_or_else(|| Arc::new(LogErrorSink));

        Runtime {
            inner: Arc::new(RuntimeInner {
                config: self.config,
                observing: AtomicBool::new(true),
                targets: TargetStack::default(),
                next_dep_id: AtomicU64::new(0),
                next_subscriber_id: AtomicU64::new(1),
                scheduler,
                error_sink,
            }),
        }
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.inner))
    }

    pub(crate) fn targets(&self) -> &TargetStack {
        &self.inner.targets
    }

    pub(crate) fn next_dep_id(&self) -> u64 {
        self.inner.next_dep_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_subscriber_id(&self) -> SubscriberId {
        SubscriberId::from_raw(self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Make `target` the active subscriber until the guard is dropped.
    ///
    /// Passing `None` suspends tracking for the guard's lifetime.
    pub fn push_target(&self, target: Option<Arc<dyn Subscriber>>) -> TargetGuard {
        let id = target.as_ref().map(|t| t.id());
        self.inner.targets.push(target);
        TargetGuard::new(self.clone(), id)
    }

    /// Get the subscriber currently being evaluated, if any.
    pub fn current_target(&self) -> Option<Arc<dyn Subscriber>> {
        self.inner.targets.current()
    }

    /// Check if a subscriber is currently collecting dependencies.
    pub fn is_tracking(&self) -> bool {
        self.current_target().is_some()
    }

    /// Nesting depth of the target stack.
    pub fn target_depth(&self) -> usize {
        self.inner.targets.depth()
    }

    /// Run `f` with dependency tracking suspended.
    pub fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.push_target(None);
        f()
    }

    /// Whether new monitors may be created.
    pub fn should_observe(&self) -> bool {
        self.inner.observing.load(Ordering::SeqCst)
    }

    /// Globally suspend or resume creation of new monitors.
    pub fn toggle_observing(&self, value: bool) {
        self.inner.observing.store(value, Ordering::SeqCst);
    }

    pub(crate) fn can_observe(&self) -> bool {
        self.should_observe() && !self.inner.config.server_rendering
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.inner.scheduler
    }

    /// Run every queued watcher now.
    pub fn flush(&self) {
        self.inner.scheduler.flush();
    }

    /// Hand an error to the configured sink.
    pub fn report_error(&self, error: &Error, scope: Option<&Scope>, info: &str) {
        self.inner.error_sink.report(error, scope, info);
    }

    /// Emit a developer-misuse warning when diagnostics are enabled.
    pub(crate) fn diagnostic(&self, message: fmt::Arguments<'_>) {
        if self.inner.config.diagnostics {
            tracing::warn!("{}", message);
        }
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("observing", &self.should_observe())
            .field("target_depth", &self.target_depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<String>>,
    }

    impl ErrorSink for RecordingSink {
        fn report(&self, _error: &Error, _scope: Option<&Scope>, info: &str) {
            self.reports.lock().push(info.to_string());
        }
    }

    #[test]
    fn ids_are_monotonic_per_runtime() {
        let a = Runtime::new();
        let b = Runtime::new();

        let first = a.next_subscriber_id();
        let second = a.next_subscriber_id();
        assert!(first < second);

        // Independent runtimes start from the same point
        assert_eq!(b.next_subscriber_id(), first);

        assert_eq!(a.next_dep_id(), 0);
        assert_eq!(a.next_dep_id(), 1);
    }

    #[test]
    fn observing_can_be_suspended() {
        let runtime = Runtime::new();
        assert!(runtime.can_observe());

        runtime.toggle_observing(false);
        assert!(!runtime.should_observe());
        assert!(!runtime.can_observe());

        runtime.toggle_observing(true);
        assert!(runtime.can_observe());
    }

    #[test]
    fn server_rendering_blocks_observation() {
        let runtime = Runtime::with_config(RuntimeConfig {
            server_rendering: true,
            ..RuntimeConfig::default()
        });
        assert!(runtime.should_observe());
        assert!(!runtime.can_observe());
    }

    #[test]
    fn errors_reach_injected_sink() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = Runtime::builder().error_sink(sink.clone()).build();

        let error = Error::Callback {
            expression: "x".into(),
            source: "nope".into(),
        };
        runtime.report_error(&error, None, "callback for watcher \"x\"");

        assert_eq!(sink.reports.lock().as_slice(), ["callback for watcher \"x\""]);
    }

    #[test]
    fn weak_handle_does_not_keep_runtime_alive() {
        let runtime = Runtime::new();
        let weak = runtime.downgrade();
        assert!(weak.upgrade().is_some_and(|rt| rt.ptr_eq(&runtime)));

        drop(runtime);
        assert!(weak.upgrade().is_none());
    }
}
