//! Scopes and computed values.
//!
//! A [`Scope`] owns a piece of root state and the watchers created against
//! it. Destroying the scope tears all of them down at once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{CallbackFn, Runtime, SubscriberId, WatchSource, Watcher, WatcherOptions};
use crate::error::{BoxError, Error, Result};
use crate::observer::Value;

/// Options for [`Scope::watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub deep: bool,
    /// Call the callback once right away with `(value, Undefined)`.
    pub immediate: bool,
    pub sync: bool,
}

struct ScopeInner {
    name: String,
    runtime: Runtime,
    data: Value,
    watchers: Mutex<Vec<Watcher>>,
    render_watcher: Mutex<Option<Watcher>>,
    being_destroyed: AtomicBool,
}

/// Owner of root state and of the watchers reading it.
///
/// A scope and its watchers hold strong references to each other, so
/// dropping every handle does not free them. Call [`Scope::destroy`] when
/// the scope is done.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Create a scope and observe `data` as its root state.
    pub fn new(runtime: &Runtime, name: impl Into<String>, data: impl Into<Value>) -> Self {
        let data = data.into();
        runtime.observe(&data, true);
        Self {
            inner: Arc::new(ScopeInner {
                name: name.into(),
                runtime: runtime.clone(),
                data,
                watchers: Mutex::new(Vec::new()),
                render_watcher: Mutex::new(None),
                being_destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The scope's root state.
    pub fn data(&self) -> &Value {
        &self.inner.data
    }

    /// Live watchers owned by this scope, in creation order.
    pub fn watchers(&self) -> Vec<Watcher> {
        self.inner.watchers.lock().clone()
    }

    pub fn render_watcher(&self) -> Option<Watcher> {
        self.inner.render_watcher.lock().clone()
    }

    /// Watch `source` and call `callback` with `(new, old)` when it changes.
    ///
    /// The watcher is user-authored: getter and callback errors are reported
    /// to the runtime's error sink. Call [`Watcher::teardown`] on the result
    /// to stop watching.
    pub fn watch(
        &self,
        source: impl Into<WatchSource>,
        callback: impl Fn(&Scope, &Value, &Value) -> std::result::Result<(), BoxError>
            + Send
            + Sync
            + 'static,
        options: WatchOptions,
    ) -> Result<Watcher> {
        let callback: CallbackFn = Arc::new(callback);
        let watcher = Watcher::new(
            self,
            source,
            Some(callback.clone()),
            WatcherOptions {
                deep: options.deep,
                user: true,
                sync: options.sync,
                ..WatcherOptions::default()
            },
            false,
        )?;

        if options.immediate {
            let value = watcher.value();
            let result = self
                .runtime()
                .untracked(|| callback(self, &value, &Value::Undefined));
            if let Err(source) = result {
                let error = Error::Callback {
                    expression: watcher.expression().to_string(),
                    source,
                };
                self.runtime().report_error(
                    &error,
                    Some(self),
                    &format!("callback for immediate watcher \"{}\"", watcher.expression()),
                );
            }
        }
        Ok(watcher)
    }

    /// Create a computed value over this scope.
    pub fn computed(
        &self,
        getter: impl Fn(&Scope) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Computed {
        Computed {
            watcher: Watcher::lazy(self, Arc::new(getter)),
        }
    }

    /// Tear down every watcher and release the root state.
    ///
    /// Calling `destroy` twice is a no-op.
    pub fn destroy(&self) {
        if self.inner.being_destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let watchers = std::mem::take(&mut *self.inner.watchers.lock());
        self.inner.render_watcher.lock().take();
        tracing::debug!(scope = %self.inner.name, watchers = watchers.len(), "destroy scope");

        for watcher in &watchers {
            watcher.teardown();
        }
        if let Some(monitor) = self.inner.data.monitor() {
            monitor.release_root();
        }
    }

    pub fn is_being_destroyed(&self) -> bool {
        self.inner.being_destroyed.load(Ordering::SeqCst)
    }

    pub(crate) fn push_watcher(&self, watcher: Watcher) {
        self.inner.watchers.lock().push(watcher);
    }

    pub(crate) fn remove_watcher(&self, id: SubscriberId) {
        self.inner.watchers.lock().retain(|w| w.id() != id);
        let mut render = self.inner.render_watcher.lock();
        if render.as_ref().is_some_and(|w| w.id() == id) {
            *render = None;
        }
    }

    pub(crate) fn set_render_watcher(&self, watcher: Watcher) {
        *self.inner.render_watcher.lock() = Some(watcher);
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("watchers", &self.inner.watchers.lock().len())
            .field("being_destroyed", &self.is_being_destroyed())
            .finish()
    }
}

/// A cached value derived from tracked state.
///
/// Re-evaluates only after one of its deps changed, and only when read.
/// Reading it inside another watcher makes that watcher depend on
/// everything the computed value depends on.
#[derive(Clone, Debug)]
pub struct Computed {
    watcher: Watcher,
}

impl Computed {
    pub fn get(&self) -> Result<Value> {
        if self.watcher.is_dirty() {
            self.watcher.evaluate()?;
        }
        if self.watcher.runtime().is_tracking() {
            self.watcher.depend();
        }
        Ok(self.watcher.value())
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorSink;
    use crate::RuntimeConfig;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn scope_with(data: serde_json::Value) -> Scope {
        let runtime = Runtime::with_config(RuntimeConfig::unbatched());
        Scope::new(&runtime, "test", Value::from_json(data))
    }

    #[test]
    fn new_observes_data_as_root() {
        let scope = scope_with(json!({ "a": 1 }));
        let monitor = scope.data().monitor().unwrap();
        assert_eq!(monitor.root_count(), 1);
        assert!(scope.data().as_object().unwrap().is_tracked("a"));
    }

    #[test]
    fn watch_path_calls_back() {
        let scope = scope_with(json!({ "user": { "name": "ada" } }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        scope
            .watch(
                "user.name",
                move |_: &Scope, new: &Value, old: &Value| -> std::result::Result<(), BoxError> {
                    sink.lock().push((new.clone(), old.clone()));
                    Ok(())
                },
                WatchOptions::default(),
            )
            .unwrap();

        let user = scope.data().as_object().unwrap().get("user");
        user.as_object().unwrap().set("name", "grace");

        assert_eq!(
            seen.lock().as_slice(),
            [(Value::from("grace"), Value::from("ada"))]
        );
    }

    #[test]
    fn immediate_fires_once_with_undefined_old_value() {
        let scope = scope_with(json!({ "a": 1 }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tracked = Arc::new(AtomicBool::new(true));
        let tracked_seen = tracked.clone();
        let runtime = scope.runtime().clone();
        scope
            .watch(
                "a",
                move |_: &Scope, new: &Value, old: &Value| -> std::result::Result<(), BoxError> {
                    tracked_seen.store(runtime.is_tracking(), Ordering::SeqCst);
                    sink.lock().push((new.clone(), old.clone()));
                    Ok(())
                },
                WatchOptions {
                    immediate: true,
                    ..WatchOptions::default()
                },
            )
            .unwrap();

        assert_eq!(seen.lock().as_slice(), [(Value::from(1), Value::Undefined)]);
        // The immediate call runs with tracking suspended.
        assert!(!tracked.load(Ordering::SeqCst));
    }

    #[test]
    fn immediate_callback_error_is_reported() {
        #[derive(Default)]
        struct Infos(Mutex<Vec<String>>);
        impl ErrorSink for Infos {
            fn report(&self, _error: &Error, scope: Option<&Scope>, info: &str) {
                assert_eq!(scope.map(|s| s.name()), Some("test"));
                self.0.lock().push(info.to_string());
            }
        }

        let sink = Arc::new(Infos::default());
        let runtime = Runtime::builder().error_sink(sink.clone()).build();
        let scope = Scope::new(&runtime, "test", Value::from_json(json!({ "a": 1 })));
        scope
            .watch(
                "a",
                |_: &Scope, _: &Value, _: &Value| -> std::result::Result<(), BoxError> {
                    Err("nope".into())
                },
                WatchOptions {
                    immediate: true,
                    ..WatchOptions::default()
                },
            )
            .unwrap();

        assert_eq!(
            sink.0.lock().as_slice(),
            ["callback for immediate watcher \"a\"".to_string()]
        );
    }

    #[test]
    fn computed_caches_until_a_dep_changes() {
        let scope = scope_with(json!({ "a": 2 }));
        let evaluations = Arc::new(AtomicUsize::new(0));
        let counter = evaluations.clone();
        let doubled = scope.computed(move |scope: &Scope| {
            counter.fetch_add(1, Ordering::SeqCst);
            let a = scope.data().as_object().unwrap().get("a");
            Ok(Value::from(a.as_f64().unwrap_or(0.0) * 2.0))
        });

        assert_eq!(doubled.get().unwrap(), Value::from(4));
        assert_eq!(doubled.get().unwrap(), Value::from(4));
        assert_eq!(evaluations.load(Ordering::SeqCst), 1);

        scope.data().as_object().unwrap().set("a", 5);
        assert_eq!(evaluations.load(Ordering::SeqCst), 1);
        assert_eq!(doubled.get().unwrap(), Value::from(10));
        assert_eq!(evaluations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reader_of_computed_inherits_its_deps() {
        let scope = scope_with(json!({ "a": 1 }));
        let computed =
            scope.computed(|scope: &Scope| Ok(scope.data().as_object().unwrap().get("a")));

        let reader_computed = computed.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        scope
            .watch(
                WatchSource::getter(move |_: &Scope| reader_computed.get().map_err(Into::into)),
                move |_: &Scope, new: &Value, _: &Value| -> std::result::Result<(), BoxError> {
                    sink.lock().push(new.clone());
                    Ok(())
                },
                WatchOptions::default(),
            )
            .unwrap();

        let a_dep = scope.data().as_object().unwrap().slot_dep("a").unwrap();
        assert_eq!(a_dep.subscriber_count(), 2);

        scope.data().as_object().unwrap().set("a", 7);
        assert_eq!(seen.lock().as_slice(), [Value::from(7)]);
    }

    #[test]
    fn destroy_tears_down_everything() {
        let scope = scope_with(json!({ "a": 1 }));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let watcher = scope
            .watch(
                "a",
                move |_: &Scope, _: &Value, _: &Value| -> std::result::Result<(), BoxError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                WatchOptions::default(),
            )
            .unwrap();
        let computed =
            scope.computed(|scope: &Scope| Ok(scope.data().as_object().unwrap().get("a")));
        computed.get().unwrap();

        scope.destroy();
        scope.destroy();

        assert!(scope.is_being_destroyed());
        assert!(scope.watchers().is_empty());
        assert!(!watcher.is_active());
        assert!(!computed.watcher().is_active());
        assert_eq!(scope.data().monitor().unwrap().root_count(), 0);

        scope.data().as_object().unwrap().set("a", 2);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
