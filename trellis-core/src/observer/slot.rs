//! Tracked slots.
//!
//! [`define_reactive`] replaces one key of an object with a [`TrackedSlot`]:
//! a getter/setter pair backed by a private [`Dep`]. Reads made while a
//! watcher is evaluating subscribe that watcher; writes of a different value
//! notify every subscriber.

use std::sync::Arc;

use parking_lot::Mutex;

use super::object::{GetterFn, Property, PropertyKind, SetterFn};
use super::{observe, Array, Monitor, Object, Value};
use crate::reactive::runtime::WeakRuntime;
use crate::reactive::{Dep, Runtime};

/// Development hook run before a tracked write is applied.
pub type SetterHook = Arc<dyn Fn() + Send + Sync>;

/// Reactive storage for one object key.
pub struct TrackedSlot {
    dep: Dep,
    runtime: WeakRuntime,
    getter: Option<GetterFn>,
    setter: Option<SetterFn>,
    value: Mutex<Value>,
    child: Mutex<Option<Arc<Monitor>>>,
    custom_setter: Option<SetterHook>,
    shallow: bool,
}

impl TrackedSlot {
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Monitor of the value currently stored in the slot.
    pub fn child(&self) -> Option<Arc<Monitor>> {
        self.child.lock().clone()
    }

    fn current(&self, owner: &Object) -> Value {
        match &self.getter {
            Some(getter) => getter(owner),
            None => self.value.lock().clone(),
        }
    }

    pub(crate) fn get(&self, owner: &Object) -> Value {
        let value = self.current(owner);

        let tracking = self
            .runtime
            .upgrade()
            .is_some_and(|runtime| runtime.is_tracking());
        if tracking {
            self.dep.depend();
            if let Some(child) = self.child() {
                child.dep().depend();
                if let Value::Array(arr) = &value {
                    depend_array(arr);
                }
            }
        }
        value
    }

    pub(crate) fn set(&self, owner: &Object, new_value: Value) {
        let old_value = self.current(owner);
        if new_value.same_value(&old_value) {
            return;
        }

        let runtime = self.runtime.upgrade();
        if let (Some(hook), Some(runtime)) = (&self.custom_setter, &runtime) {
            if runtime.config().diagnostics {
                hook();
            }
        }

        // Accessor without a setter: the write is absorbed.
        if self.getter.is_some() && self.setter.is_none() {
            return;
        }
        match &self.setter {
            Some(setter) => setter(owner, new_value.clone()),
            None => *self.value.lock() = new_value.clone(),
        }

        let child = match (&runtime, self.shallow) {
            (Some(runtime), false) => observe(runtime, &new_value, false),
            _ => None,
        };
        *self.child.lock() = child;

        self.dep.notify();
    }
}

/// Install a tracked slot for `key` on `obj`.
///
/// `value` supplies the initial value; when `None`, the current value of the
/// key is used (unless the key is a getter-only accessor). Non-configurable
/// keys are left untouched. An existing getter/setter pair keeps working
/// behind the slot. `custom_setter` runs before each effective write when
/// diagnostics are on; `shallow` skips observing stored values.
pub fn define_reactive(
    runtime: &Runtime,
    obj: &Object,
    key: &str,
    value: Option<Value>,
    custom_setter: Option<SetterHook>,
    shallow: bool,
) {
    let property = obj.property(key);
    if property.as_ref().is_some_and(|p| !p.configurable) {
        return;
    }

    let (getter, setter): (Option<GetterFn>, Option<SetterFn>) =
        match property.map(|p| p.kind) {
            Some(PropertyKind::Accessor { get, set }) => (get, set),
            Some(PropertyKind::Tracked(previous)) => {
                let read = previous.clone();
                let write = previous;
                let get: GetterFn = Arc::new(move |owner: &Object| read.get(owner));
                let set: SetterFn = Arc::new(move |owner: &Object, v: Value| write.set(owner, v));
                (Some(get), Some(set))
            }
            _ => (None, None),
        };

    let value = match value {
        Some(value) => value,
        None if getter.is_none() || setter.is_some() => obj.get(key),
        None => Value::Undefined,
    };

    let child = if shallow {
        None
    } else {
        observe(runtime, &value, false)
    };

    let slot = TrackedSlot {
        dep: Dep::new(runtime),
        runtime: runtime.downgrade(),
        getter,
        setter,
        value: Mutex::new(value),
        child: Mutex::new(child),
        custom_setter,
        shallow,
    };
    obj.install(
        key,
        Property {
            kind: PropertyKind::Tracked(Arc::new(slot)),
            configurable: true,
        },
    );
}

/// Depend on every observed element of `arr`, recursing into nested arrays.
///
/// Element reads are not intercepted, so a watcher that reads an array
/// through a tracked slot subscribes to its elements' containers here.
pub(crate) fn depend_array(arr: &Array) {
    for item in arr.items() {
        if let Some(monitor) = item.monitor() {
            monitor.dep().depend();
        }
        if let Value::Array(nested) = &item {
            depend_array(nested);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Subscriber, SubscriberId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Subscriber that records deps it is asked to add and counts updates.
    #[derive(Default)]
    struct Probe {
        deps: Mutex<Vec<u64>>,
        updates: AtomicUsize,
    }

    impl Subscriber for Probe {
        fn id(&self) -> SubscriberId {
            SubscriberId::from_raw(99)
        }

        fn add_dep(&self, dep: &Dep) {
            self.deps.lock().push(dep.id());
        }

        fn update(&self) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn subscribe(obj: &Object, key: &str) -> Arc<Probe> {
        let probe = Arc::new(Probe::default());
        obj.slot_dep(key).unwrap().add_sub(probe.clone());
        probe
    }

    #[test]
    fn read_without_target_does_not_track() {
        let runtime = Runtime::new();
        let obj: Object = [("a", 1)].into_iter().collect();
        define_reactive(&runtime, &obj, "a", None, None, false);

        assert_eq!(obj.get("a"), Value::from(1));
        assert_eq!(obj.slot_dep("a").unwrap().subscriber_count(), 0);
    }

    #[test]
    fn read_under_target_records_slot_and_child() {
        let runtime = Runtime::new();
        let child: Object = [("x", 1)].into_iter().collect();
        let obj: Object = [("child", Value::from(child.clone()))].into_iter().collect();
        define_reactive(&runtime, &obj, "child", None, None, false);

        let probe = Arc::new(Probe::default());
        {
            let _guard = runtime.push_target(Some(probe.clone()));
            obj.get("child");
        }

        let slot_dep = obj.slot_dep("child").unwrap().id();
        let child_dep = child.monitor().unwrap().dep().id();
        assert_eq!(probe.deps.lock().as_slice(), [slot_dep, child_dep]);
    }

    #[test]
    fn array_read_depends_on_nested_elements() {
        let runtime = Runtime::new();
        let inner: Object = [("y", 2)].into_iter().collect();
        let nested: Array = [Value::from(inner.clone())].into_iter().collect();
        let list: Array = [Value::from(nested.clone())].into_iter().collect();
        let obj: Object = [("list", Value::from(list.clone()))].into_iter().collect();
        define_reactive(&runtime, &obj, "list", None, None, false);

        let probe = Arc::new(Probe::default());
        {
            let _guard = runtime.push_target(Some(probe.clone()));
            obj.get("list");
        }

        let deps = probe.deps.lock().clone();
        assert!(deps.contains(&list.monitor().unwrap().dep().id()));
        assert!(deps.contains(&nested.monitor().unwrap().dep().id()));
        assert!(deps.contains(&inner.monitor().unwrap().dep().id()));
    }

    #[test]
    fn same_value_write_is_silent() {
        let runtime = Runtime::new();
        let obj: Object = [("n", f64::NAN)].into_iter().collect();
        define_reactive(&runtime, &obj, "n", None, None, false);
        let probe = subscribe(&obj, "n");

        obj.set("n", f64::NAN);
        assert_eq!(probe.updates.load(Ordering::SeqCst), 0);

        obj.set("n", 1.0);
        assert_eq!(probe.updates.load(Ordering::SeqCst), 1);
        assert_eq!(obj.get("n"), Value::from(1.0));
    }

    #[test]
    fn getter_only_slot_absorbs_writes() {
        let runtime = Runtime::new();
        let obj = Object::new();
        obj.define_accessor("fixed", Some(Arc::new(|_: &Object| Value::from("const"))), None);
        define_reactive(&runtime, &obj, "fixed", None, None, false);
        let probe = subscribe(&obj, "fixed");

        obj.set("fixed", "changed");
        assert_eq!(obj.get("fixed"), Value::from("const"));
        assert_eq!(probe.updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn existing_setter_is_delegated() {
        let runtime = Runtime::new();
        let store = Arc::new(Mutex::new(Value::from(1)));
        let obj = Object::new();
        {
            let read = store.clone();
            let write = store.clone();
            obj.define_accessor(
                "proxied",
                Some(Arc::new(move |_: &Object| read.lock().clone())),
                Some(Arc::new(move |_: &Object, v: Value| *write.lock() = v)),
            );
        }
        define_reactive(&runtime, &obj, "proxied", None, None, false);
        let probe = subscribe(&obj, "proxied");

        obj.set("proxied", 5);
        assert_eq!(*store.lock(), Value::from(5));
        assert_eq!(obj.get("proxied"), Value::from(5));
        assert_eq!(probe.updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_configurable_key_is_left_alone() {
        let runtime = Runtime::new();
        let obj = Object::new();
        obj.define_property("locked", 1, false);

        define_reactive(&runtime, &obj, "locked", None, None, false);
        assert!(!obj.is_tracked("locked"));
    }

    #[test]
    fn writes_observe_new_values_unless_shallow() {
        let runtime = Runtime::new();
        let obj: Object = [("deep", 0), ("flat", 0)].into_iter().collect();
        define_reactive(&runtime, &obj, "deep", None, None, false);
        define_reactive(&runtime, &obj, "flat", None, None, true);

        let a = Object::new();
        let b = Object::new();
        obj.set("deep", Value::from(a.clone()));
        obj.set("flat", Value::from(b.clone()));

        assert!(a.monitor().is_some());
        assert!(b.monitor().is_none());
    }

    #[test]
    fn custom_setter_runs_on_effective_writes() {
        let runtime = Runtime::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let obj: Object = [("v", 1)].into_iter().collect();
        {
            let calls = calls.clone();
            let hook: SetterHook = Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
            define_reactive(&runtime, &obj, "v", None, Some(hook), false);
        }

        obj.set("v", 1);
        obj.set("v", 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn redefining_chains_through_previous_slot() {
        let runtime = Runtime::new();
        let obj: Object = [("a", 1)].into_iter().collect();
        define_reactive(&runtime, &obj, "a", None, None, false);
        let first = subscribe(&obj, "a");

        define_reactive(&runtime, &obj, "a", None, None, false);
        let second = subscribe(&obj, "a");

        obj.set("a", 2);
        assert_eq!(obj.get("a"), Value::from(2));
        assert_eq!(first.updates.load(Ordering::SeqCst), 1);
        assert_eq!(second.updates.load(Ordering::SeqCst), 1);
    }
}
