//! Monitors and observation.
//!
//! A [`Monitor`] is attached to every observed object or array. It owns the
//! container-level [`Dep`], which fires on structural changes (keys added or
//! removed, array mutation), and counts how many scopes use the value as
//! their root state.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{define_reactive, Array, Object, Value};
use crate::reactive::runtime::WeakRuntime;
use crate::reactive::{Dep, Runtime};

/// Observation record attached to one object or array.
pub struct Monitor {
    dep: Dep,
    root_count: AtomicUsize,
    runtime: WeakRuntime,
}

impl Monitor {
    fn new(runtime: &Runtime) -> Self {
        Self {
            dep: Dep::new(runtime),
            root_count: AtomicUsize::new(0),
            runtime: runtime.downgrade(),
        }
    }

    /// The container-level dep.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Number of scopes using this value as root state.
    pub fn root_count(&self) -> usize {
        self.root_count.load(Ordering::SeqCst)
    }

    pub(crate) fn release_root(&self) {
        let _ = self
            .root_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Observe every element of a freshly inserted run of array items.
    pub(crate) fn observe_items(&self, items: &[Value]) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        for item in items {
            observe(&runtime, item, false);
        }
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("dep", &self.dep.id())
            .field("root_count", &self.root_count())
            .finish()
    }
}

/// Attach a monitor to `value`, or return the one it already has.
///
/// Returns `None` for primitives and nodes, and for values that cannot be
/// observed right now: observation suspended, server rendering, a
/// non-extensible value, or a root instance. With `as_root`, the monitor's
/// root count is incremented.
pub fn observe(runtime: &Runtime, value: &Value, as_root: bool) -> Option<Arc<Monitor>> {
    let monitor = match value {
        Value::Object(obj) => obj.monitor().or_else(|| {
            (runtime.can_observe() && obj.is_extensible() && !obj.is_root_instance())
                .then(|| walk(runtime, obj))
        }),
        Value::Array(arr) => arr.monitor().or_else(|| {
            (runtime.can_observe() && arr.is_extensible()).then(|| observe_array(runtime, arr))
        }),
        _ => None,
    };

    if as_root {
        if let Some(monitor) = &monitor {
            monitor.root_count.fetch_add(1, Ordering::SeqCst);
        }
    }
    monitor
}

/// Convert every own key of `obj` into a tracked slot.
fn walk(runtime: &Runtime, obj: &Object) -> Arc<Monitor> {
    // Attach first so self-references resolve to this monitor.
    let monitor = obj.attach_monitor(Arc::new(Monitor::new(runtime)));
    tracing::trace!(dep = monitor.dep().id(), keys = obj.len(), "observe object");
    for key in obj.keys() {
        define_reactive(runtime, obj, &key, None, None, false);
    }
    monitor
}

fn observe_array(runtime: &Runtime, arr: &Array) -> Arc<Monitor> {
    let monitor = arr.attach_monitor(Arc::new(Monitor::new(runtime)));
    tracing::trace!(dep = monitor.dep().id(), len = arr.len(), "observe array");
    for item in arr.items() {
        observe(runtime, &item, false);
    }
    monitor
}

impl Runtime {
    /// See [`observe`].
    pub fn observe(&self, value: &Value, as_root: bool) -> Option<Arc<Monitor>> {
        observe(self, value, as_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::VNode;
    use crate::RuntimeConfig;
    use serde_json::json;

    #[test]
    fn primitives_and_nodes_are_not_observed() {
        let runtime = Runtime::new();

        assert!(runtime.observe(&Value::from(1), false).is_none());
        assert!(runtime.observe(&Value::from("s"), false).is_none());
        assert!(runtime.observe(&Value::Null, true).is_none());
        assert!(runtime.observe(&Value::from(VNode::new("p")), false).is_none());
    }

    #[test]
    fn observe_is_idempotent() {
        let runtime = Runtime::new();
        let value = Value::from_json(json!({ "a": 1 }));

        let first = runtime.observe(&value, false).unwrap();
        let second = runtime.observe(&value, false).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(value.as_object().unwrap().is_tracked("a"));
    }

    #[test]
    fn observe_walks_nested_values() {
        let runtime = Runtime::new();
        let value = Value::from_json(json!({ "child": { "x": 1 }, "list": [{ "y": 2 }] }));
        runtime.observe(&value, false);

        let obj = value.as_object().unwrap();
        let child = obj.get("child");
        assert!(child.monitor().is_some());
        assert!(child.as_object().unwrap().is_tracked("x"));

        let list = obj.get("list");
        let list = list.as_array().unwrap();
        assert!(list.monitor().is_some());
        assert!(list.get(0).monitor().is_some());
    }

    #[test]
    fn as_root_counts_roots() {
        let runtime = Runtime::new();
        let value = Value::from_json(json!({}));

        let monitor = runtime.observe(&value, true).unwrap();
        runtime.observe(&value, true);
        assert_eq!(monitor.root_count(), 2);

        monitor.release_root();
        monitor.release_root();
        monitor.release_root();
        assert_eq!(monitor.root_count(), 0);
    }

    #[test]
    fn gated_values_are_skipped() {
        let runtime = Runtime::new();

        let sealed = Object::new();
        sealed.prevent_extensions();
        assert!(runtime.observe(&Value::from(sealed), false).is_none());

        let root = Object::new();
        root.mark_root_instance();
        assert!(runtime.observe(&Value::from(root), false).is_none());

        runtime.toggle_observing(false);
        assert!(runtime.observe(&Value::from(Object::new()), false).is_none());
        runtime.toggle_observing(true);

        let ssr = Runtime::with_config(RuntimeConfig {
            server_rendering: true,
            ..RuntimeConfig::default()
        });
        assert!(ssr.observe(&Value::from(Array::new()), false).is_none());
    }

    #[test]
    fn existing_monitor_survives_suspension() {
        let runtime = Runtime::new();
        let value = Value::from(Object::new());
        let monitor = runtime.observe(&value, false).unwrap();

        runtime.toggle_observing(false);
        let again = runtime.observe(&value, false).unwrap();
        assert!(Arc::ptr_eq(&monitor, &again));
    }

    #[test]
    fn self_reference_reuses_monitor() {
        let runtime = Runtime::new();
        let obj = Object::new();
        obj.set("self", Value::from(obj.clone()));

        let monitor = runtime.observe(&Value::from(obj.clone()), false).unwrap();
        let inner = obj.get("self").monitor().unwrap();
        assert!(Arc::ptr_eq(&monitor, &inner));
    }
}
