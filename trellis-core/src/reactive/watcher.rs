//! Watchers
//!
//! A [`Watcher`] is one tracked computation. It evaluates a getter with
//! itself as the active target, records every dep the getter read, and
//! re-runs when any of them notifies.
//!
//! # How Watchers Work
//!
//! 1. `get()` pushes the watcher as the active target and calls the getter.
//!    Every tracked read ends in [`Subscriber::add_dep`].
//!
//! 2. `add_dep` records the dep in `new_deps` and subscribes only when the
//!    dep was not already a dependency last time around.
//!
//! 3. When the evaluation ends (on every exit path) `cleanup_deps`
//!    unsubscribes from deps that were not read this time and promotes
//!    `new_deps` to `deps`.
//!
//! 4. A notifying dep calls `update()`: lazy watchers only become dirty,
//!    sync watchers run on the spot, everything else goes to the scheduler,
//!    which calls `run()` later.
//!
//! After every evaluation, the deps listing this watcher as a subscriber
//! are exactly the deps in `dep_ids()`.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::path::{parse_path, resolve};
use super::{traverse, Dep, DepId, Runtime, Scope, Subscriber, SubscriberId};
use crate::error::{BoxError, Error, Result};
use crate::observer::Value;

/// Evaluation function of a watcher.
pub type EvalFn = Arc<dyn Fn(&Scope) -> std::result::Result<Value, BoxError> + Send + Sync>;

/// Change callback, called with `(new, old)`.
pub type CallbackFn =
    Arc<dyn Fn(&Scope, &Value, &Value) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Hook run by the scheduler right before a queued watcher runs.
pub type HookFn = Arc<dyn Fn() + Send + Sync>;

/// What a watcher evaluates.
#[derive(Clone)]
pub enum WatchSource {
    /// Dot-separated path into the scope's data, e.g. `"user.name"`.
    Path(String),
    Getter(EvalFn),
}

impl WatchSource {
    pub fn getter(
        f: impl Fn(&Scope) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        WatchSource::Getter(Arc::new(f))
    }
}

impl From<&str> for WatchSource {
    fn from(path: &str) -> Self {
        WatchSource::Path(path.to_string())
    }
}

impl From<String> for WatchSource {
    fn from(path: String) -> Self {
        WatchSource::Path(path)
    }
}

impl From<EvalFn> for WatchSource {
    fn from(getter: EvalFn) -> Self {
        WatchSource::Getter(getter)
    }
}

/// Watcher flags.
#[derive(Clone, Default)]
pub struct WatcherOptions {
    /// Subscribe to everything reachable from the produced value.
    pub deep: bool,
    /// User-authored watcher: errors go to the error sink instead of the caller.
    pub user: bool,
    /// Evaluate on demand only (computed values).
    pub lazy: bool,
    /// Run on notification instead of going through the scheduler.
    pub sync: bool,
    pub before: Option<HookFn>,
}

impl fmt::Debug for WatcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherOptions")
            .field("deep", &self.deep)
            .field("user", &self.user)
            .field("lazy", &self.lazy)
            .field("sync", &self.sync)
            .field("before", &self.before.is_some())
            .finish()
    }
}

struct WatcherState {
    active: bool,
    dirty: bool,
    value: Value,
    deps: IndexMap<DepId, Dep>,
    new_deps: IndexMap<DepId, Dep>,
}

struct WatcherInner {
    id: SubscriberId,
    me: Weak<WatcherInner>,
    runtime: Runtime,
    scope: Scope,
    expression: String,
    getter: EvalFn,
    callback: Option<CallbackFn>,
    deep: bool,
    user: bool,
    lazy: bool,
    sync: bool,
    before: Option<HookFn>,
    state: Mutex<WatcherState>,
}

/// Handle to a watcher. Clones share the same watcher.
///
/// Every dep a watcher reads keeps it alive, and so does its scope. A
/// watcher is only released after [`Watcher::teardown`] or
/// [`Scope::destroy`].
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

impl Watcher {
    /// Create a watcher owned by `scope`.
    ///
    /// Non-lazy watchers evaluate right away. If that first evaluation fails
    /// (non-user watchers only) the watcher is torn down and the error is
    /// returned. `is_render` registers the watcher as the scope's render
    /// watcher.
    pub fn new(
        scope: &Scope,
        source: impl Into<WatchSource>,
        callback: Option<CallbackFn>,
        options: WatcherOptions,
        is_render: bool,
    ) -> Result<Watcher> {
        let lazy = options.lazy;
        let watcher = Self::create(scope, source.into(), callback, options);
        if is_render {
            scope.set_render_watcher(watcher.clone());
        }
        scope.push_watcher(watcher.clone());

        if !lazy {
            match watcher.get() {
                Ok(value) => watcher.inner.state.lock().value = value,
                Err(err) => {
                    watcher.teardown();
                    return Err(err);
                }
            }
        }
        Ok(watcher)
    }

    fn create(
        scope: &Scope,
        source: WatchSource,
        callback: Option<CallbackFn>,
        options: WatcherOptions,
    ) -> Watcher {
        let runtime = scope.runtime().clone();
        let (expression, getter) = match source {
            WatchSource::Getter(getter) => ("function".to_string(), getter),
            WatchSource::Path(path) => {
                let getter: EvalFn = match parse_path(&path) {
                    Some(segments) => {
                        Arc::new(move |scope: &Scope| -> std::result::Result<Value, BoxError> {
                            Ok(resolve(scope.data(), &segments))
                        })
                    }
                    None => {
                        runtime.diagnostic(format_args!(
                            "Failed watching path: \"{path}\". Watchers only accept simple \
                             dot-delimited paths. For full control, use a getter instead."
                        ));
                        Arc::new(|_: &Scope| -> std::result::Result<Value, BoxError> {
                            Ok(Value::Undefined)
                        })
                    }
                };
                (path, getter)
            }
        };

        let id = runtime.next_subscriber_id();
        let inner = Arc::new_cyclic(|me| WatcherInner {
            id,
            me: me.clone(),
            runtime,
            scope: scope.clone(),
            expression,
            getter,
            callback,
            deep: options.deep,
            user: options.user,
            lazy: options.lazy,
            sync: options.sync,
            before: options.before,
            state: Mutex::new(WatcherState {
                active: true,
                dirty: options.lazy,
                value: Value::Undefined,
                deps: IndexMap::new(),
                new_deps: IndexMap::new(),
            }),
        });
        tracing::trace!(watcher = %id, expression = %inner.expression, "watcher created");
        Watcher { inner }
    }

    /// Create a lazy watcher without registering it anywhere but `scope`.
    pub(crate) fn lazy(scope: &Scope, getter: EvalFn) -> Watcher {
        let options = WatcherOptions {
            lazy: true,
            ..WatcherOptions::default()
        };
        let watcher = Self::create(scope, WatchSource::Getter(getter), None, options);
        scope.push_watcher(watcher.clone());
        watcher
    }

    /// Evaluate the getter and re-collect dependencies.
    ///
    /// Does not store the result; see [`Watcher::run`] and
    /// [`Watcher::evaluate`].
    pub fn get(&self) -> Result<Value> {
        let inner = &self.inner;
        // Drop order matters: the target is popped before deps are reconciled.
        let _cleanup = DepsCleanup(inner);
        let target: Arc<dyn Subscriber> = inner.clone();
        let _target = inner.runtime.push_target(Some(target));

        let value = match (inner.getter)(&inner.scope) {
            Ok(value) => value,
            Err(source) => {
                let error = Error::Getter {
                    expression: inner.expression.clone(),
                    source,
                };
                if !inner.user {
                    return Err(error);
                }
                inner.runtime.report_error(
                    &error,
                    Some(&inner.scope),
                    &format!("getter for watcher \"{}\"", inner.expression),
                );
                Value::Undefined
            }
        };

        if inner.deep {
            traverse(&value);
        }
        Ok(value)
    }

    /// Scheduler job: re-evaluate and fire the callback on change.
    ///
    /// A torn-down watcher does nothing. The callback fires when the value
    /// changed, when it is an object or array, or when the watcher is deep.
    pub fn run(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        let value = self.get()?;

        let old = {
            let mut state = self.inner.state.lock();
            let fire = !value.same_value(&state.value) || value.is_object() || self.inner.deep;
            if !fire {
                return Ok(());
            }
            std::mem::replace(&mut state.value, value.clone())
        };

        let Some(callback) = &self.inner.callback else {
            return Ok(());
        };
        if let Err(source) = callback(&self.inner.scope, &value, &old) {
            let error = Error::Callback {
                expression: self.inner.expression.clone(),
                source,
            };
            if !self.inner.user {
                return Err(error);
            }
            self.inner.runtime.report_error(
                &error,
                Some(&self.inner.scope),
                &format!("callback for watcher \"{}\"", self.inner.expression),
            );
        }
        Ok(())
    }

    /// Evaluate a lazy watcher, store the value and clear `dirty`.
    pub fn evaluate(&self) -> Result<Value> {
        let value = self.get()?;
        let mut state = self.inner.state.lock();
        state.value = value.clone();
        state.dirty = false;
        Ok(value)
    }

    /// Make the active target depend on everything this watcher depends on.
    pub fn depend(&self) {
        let deps: Vec<Dep> = self.inner.state.lock().deps.values().cloned().collect();
        for dep in deps {
            dep.depend();
        }
    }

    /// Unsubscribe from every dep and stop reacting. Idempotent.
    pub fn teardown(&self) {
        let deps = {
            let mut state = self.inner.state.lock();
            if !state.active {
                return;
            }
            state.active = false;
            state.new_deps.clear();
            std::mem::take(&mut state.deps)
        };

        if !self.inner.scope.is_being_destroyed() {
            self.inner.scope.remove_watcher(self.id());
        }
        for dep in deps.values() {
            dep.remove_sub(self.id());
        }
        tracing::trace!(watcher = %self.id(), deps = deps.len(), "watcher torn down");
    }

    /// Run the `before` hook, if any.
    pub fn call_before(&self) {
        if let Some(before) = &self.inner.before {
            before();
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// Last stored value.
    pub fn value(&self) -> Value {
        self.inner.state.lock().value.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.lazy
    }

    pub fn is_user(&self) -> bool {
        self.inner.user
    }

    /// Ids of the deps recorded by the last completed evaluation.
    pub fn dep_ids(&self) -> Vec<DepId> {
        self.inner.state.lock().deps.keys().copied().collect()
    }

    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn ptr_eq(&self, other: &Watcher) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.expression)
            .field("active", &state.active)
            .field("dirty", &state.dirty)
            .field("deps", &state.deps.len())
            .finish()
    }
}

impl WatcherInner {
    fn handle(&self) -> Option<Watcher> {
        self.me.upgrade().map(|inner| Watcher { inner })
    }

    /// Drop deps not read in the last evaluation and promote `new_deps`.
    fn cleanup_deps(&self) {
        let stale: Vec<Dep> = {
            let mut state = self.state.lock();
            let fresh = std::mem::take(&mut state.new_deps);
            let previous = std::mem::replace(&mut state.deps, fresh);
            previous
                .into_iter()
                .filter(|(id, _)| !state.deps.contains_key(id))
                .map(|(_, dep)| dep)
                .collect()
        };
        for dep in stale {
            dep.remove_sub(self.id);
        }
    }
}

impl Subscriber for WatcherInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn add_dep(&self, dep: &Dep) {
        let id = dep.id();
        let subscribe = {
            let mut state = self.state.lock();
            if !state.active || state.new_deps.contains_key(&id) {
                return;
            }
            state.new_deps.insert(id, dep.clone());
            !state.deps.contains_key(&id)
        };
        if subscribe {
            if let Some(me) = self.me.upgrade() {
                dep.add_sub(me);
            }
        }
    }

    fn update(&self) {
        if self.lazy {
            self.state.lock().dirty = true;
            return;
        }
        let Some(watcher) = self.handle() else {
            return;
        };
        if self.sync {
            if let Err(error) = watcher.run() {
                self.runtime.report_error(
                    &error,
                    Some(&self.scope),
                    &format!("sync watcher \"{}\"", self.expression),
                );
            }
        } else {
            self.runtime.scheduler().enqueue(watcher);
        }
    }
}

/// Reconciles a watcher's deps when an evaluation ends.
struct DepsCleanup<'a>(&'a WatcherInner);

impl Drop for DepsCleanup<'_> {
    fn drop(&mut self) {
        self.0.cleanup_deps();
    }
}

// ---- Tests ----
