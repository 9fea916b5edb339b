//! Observable objects.
//!
//! An [`Object`] is an ordered map from string keys to properties. A property
//! is either plain data, a host-defined accessor pair, or a [`TrackedSlot`]
//! installed by the observer. Reads and writes always go through
//! [`Object::get`] and [`Object::set`], which dispatch on the property kind.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::{Monitor, TrackedSlot, Value};
use crate::reactive::Dep;

/// Host-defined getter. Receives the object the property lives on.
pub type GetterFn = Arc<dyn Fn(&Object) -> Value + Send + Sync>;

/// Host-defined setter. Receives the object the property lives on.
pub type SetterFn = Arc<dyn Fn(&Object, Value) + Send + Sync>;

#[derive(Clone)]
pub(crate) enum PropertyKind {
    Data(Value),
    Accessor {
        get: Option<GetterFn>,
        set: Option<SetterFn>,
    },
    Tracked(Arc<TrackedSlot>),
}

#[derive(Clone)]
pub(crate) struct Property {
    pub(crate) kind: PropertyKind,
    pub(crate) configurable: bool,
}

struct ObjectInner {
    props: RwLock<IndexMap<String, Property>>,
    monitor: OnceLock<Arc<Monitor>>,
    extensible: AtomicBool,
    frozen: AtomicBool,
    root_instance: AtomicBool,
}

/// Shared handle to an object. Clones refer to the same object.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                props: RwLock::new(IndexMap::new()),
                monitor: OnceLock::new(),
                extensible: AtomicBool::new(true),
                frozen: AtomicBool::new(false),
                root_instance: AtomicBool::new(false),
            }),
        }
    }

    /// Read a property. Missing keys read as `undefined`.
    pub fn get(&self, key: &str) -> Value {
        let Some(property) = self.property(key) else {
            return Value::Undefined;
        };
        match property.kind {
            PropertyKind::Data(value) => value,
            PropertyKind::Accessor { get, .. } => get.map(|g| g(self)).unwrap_or_default(),
            PropertyKind::Tracked(slot) => slot.get(self),
        }
    }

    /// Assign a property.
    ///
    /// Existing data properties are overwritten unless the object is frozen,
    /// accessors delegate to their setter (or drop the write without one),
    /// and tracked slots run their reactive setter. A missing key is added
    /// as untracked data when the object is extensible.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let existing = self.property(key).map(|p| p.kind);
        match existing {
            Some(PropertyKind::Tracked(slot)) => slot.set(self, value),
            Some(PropertyKind::Accessor { set, .. }) => {
                if let Some(set) = set {
                    set(self, value);
                }
            }
            Some(PropertyKind::Data(_)) => {
                if self.is_frozen() {
                    return;
                }
                if let Some(property) = self.inner.props.write().get_mut(key) {
                    if let PropertyKind::Data(slot) = &mut property.kind {
                        *slot = value;
                    }
                }
            }
            None => {
                self.install(
                    key,
                    Property {
                        kind: PropertyKind::Data(value),
                        configurable: true,
                    },
                );
            }
        }
    }

    /// Define a property backed by a getter and/or setter.
    pub fn define_accessor(&self, key: &str, get: Option<GetterFn>, set: Option<SetterFn>) {
        self.install(
            key,
            Property {
                kind: PropertyKind::Accessor { get, set },
                configurable: true,
            },
        );
    }

    /// Define a data property with explicit configurability.
    ///
    /// Non-configurable properties are never replaced by tracked slots.
    pub fn define_property(&self, key: &str, value: impl Into<Value>, configurable: bool) {
        self.install(
            key,
            Property {
                kind: PropertyKind::Data(value.into()),
                configurable,
            },
        );
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.props.read().contains_key(key)
    }

    /// Own keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.props.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.props.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.props.read().is_empty()
    }

    /// Whether the key is backed by a tracked slot.
    pub fn is_tracked(&self, key: &str) -> bool {
        matches!(
            self.property(key).map(|p| p.kind),
            Some(PropertyKind::Tracked(_))
        )
    }

    /// The dep of the tracked slot behind `key`, if any.
    pub fn slot_dep(&self, key: &str) -> Option<Dep> {
        match self.property(key)?.kind {
            PropertyKind::Tracked(slot) => Some(slot.dep().clone()),
            _ => None,
        }
    }

    /// Make the object immutable: no new keys, no reconfiguration, and data
    /// properties reject writes.
    pub fn freeze(&self) {
        self.inner.frozen.store(true, Ordering::SeqCst);
        self.inner.extensible.store(false, Ordering::SeqCst);
        for property in self.inner.props.write().values_mut() {
            property.configurable = false;
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::SeqCst)
    }

    /// Forbid adding new keys.
    pub fn prevent_extensions(&self) {
        self.inner.extensible.store(false, Ordering::SeqCst);
    }

    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.load(Ordering::SeqCst)
    }

    /// Flag the object as a framework root instance. Root instances are
    /// never observed and reject runtime key additions and removals.
    pub fn mark_root_instance(&self) {
        self.inner.root_instance.store(true, Ordering::SeqCst);
    }

    pub fn is_root_instance(&self) -> bool {
        self.inner.root_instance.load(Ordering::SeqCst)
    }

    pub fn monitor(&self) -> Option<Arc<Monitor>> {
        self.inner.monitor.get().cloned()
    }

    /// Attach `monitor`, or return the one already attached.
    pub(crate) fn attach_monitor(&self, monitor: Arc<Monitor>) -> Arc<Monitor> {
        self.inner.monitor.get_or_init(|| monitor).clone()
    }

    pub(crate) fn property(&self, key: &str) -> Option<Property> {
        self.inner.props.read().get(key).cloned()
    }

    /// Insert or replace a property. New keys need an extensible object.
    pub(crate) fn install(&self, key: &str, property: Property) -> bool {
        let mut props = self.inner.props.write();
        if !props.contains_key(key) && !self.is_extensible() {
            return false;
        }
        props.insert(key.to_string(), property);
        true
    }

    /// Remove an own property. Non-configurable properties stay.
    pub(crate) fn remove(&self, key: &str) -> bool {
        let mut props = self.inner.props.write();
        match props.get(key) {
            Some(property) if property.configurable => props.shift_remove(key).is_some(),
            _ => false,
        }
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let obj = Object::new();
        {
            let mut props = obj.inner.props.write();
            for (key, value) in iter {
                props.insert(
                    key.into(),
                    Property {
                        kind: PropertyKind::Data(value.into()),
                        configurable: true,
                    },
                );
            }
        }
        obj
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values are not printed: the graph may be cyclic and accessors may
        // run arbitrary code.
        f.debug_struct("Object")
            .field("keys", &self.keys())
            .field("observed", &self.monitor().is_some())
            .finish()
    }
}
