//! Structural mutation entry points.
//!
//! Tracked slots only exist for keys present when an object was observed.
//! [`set_property`] and [`delete_property`] are the sanctioned way to add or
//! remove keys (and array elements) afterwards so that watchers hear about
//! it.

use std::borrow::Cow;
use std::fmt;

use super::{define_reactive, Array, Object, Value};
use crate::reactive::Runtime;

/// The largest valid array index. Array lengths stay below `2^32`.
pub const MAX_ARRAY_INDEX: usize = u32::MAX as usize - 1;

/// A property key: an array index or an object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    /// The key as an array index. Names made only of ASCII digits count.
    /// Anything above [`MAX_ARRAY_INDEX`] is not an index.
    pub fn as_index(&self) -> Option<usize> {
        let index = match self {
            Key::Index(index) => *index,
            Key::Name(name) if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) => {
                name.parse().ok()?
            }
            Key::Name(_) => return None,
        };
        (index <= MAX_ARRAY_INDEX).then_some(index)
    }

    pub fn as_name(&self) -> Cow<'_, str> {
        match self {
            Key::Index(index) => Cow::Owned(index.to_string()),
            Key::Name(name) => Cow::Borrowed(name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_name())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// Set a property, adding it as tracked state when it does not exist yet.
///
/// Returns the value that was set. Adding keys to a root state object or a
/// root instance is rejected with a warning.
pub fn set_property(
    runtime: &Runtime,
    target: &Value,
    key: impl Into<Key>,
    value: impl Into<Value>,
) -> Value {
    let key = key.into();
    let value = value.into();

    match target {
        Value::Array(arr) => match key.as_index() {
            Some(index) => set_index(runtime, arr, index, value.clone()),
            None => runtime.diagnostic(format_args!(
                "Cannot set non-index key \"{key}\" on an array"
            )),
        },
        Value::Object(obj) => set_key(runtime, obj, &key.as_name(), value.clone()),
        other => runtime.diagnostic(format_args!(
            "Cannot set reactive property on undefined, null, or primitive value: {other:?}"
        )),
    }
    value
}

fn set_index(runtime: &Runtime, arr: &Array, index: usize, value: Value) {
    if !arr.extend_len(index) {
        runtime.diagnostic(format_args!("Cannot grow array to index {index}: out of memory"));
        return;
    }
    arr.splice(index, 1, [value]);
}

fn set_key(runtime: &Runtime, obj: &Object, key: &str, value: Value) {
    if obj.has(key) {
        obj.set(key, value);
        return;
    }

    let monitor = obj.monitor();
    if obj.is_root_instance() || monitor.as_ref().is_some_and(|m| m.root_count() > 0) {
        runtime.diagnostic(format_args!(
            "Avoid adding reactive properties to a root instance or its root state at runtime \
             (key \"{key}\") - declare it upfront instead."
        ));
        return;
    }

    let Some(monitor) = monitor else {
        obj.set(key, value);
        return;
    };
    define_reactive(runtime, obj, key, Some(value), None, false);
    monitor.dep().notify();
}

/// Delete a property and notify the container when it was tracked.
///
/// Deleting an array index removes the element, shifting later ones down.
pub fn delete_property(runtime: &Runtime, target: &Value, key: impl Into<Key>) {
    let key = key.into();

    match target {
        Value::Array(arr) => match key.as_index() {
            Some(index) => {
                arr.splice(index, 1, []);
            }
            None => runtime.diagnostic(format_args!(
                "Cannot delete non-index key \"{key}\" from an array"
            )),
        },
        Value::Object(obj) => delete_key(runtime, obj, &key.as_name()),
        other => runtime.diagnostic(format_args!(
            "Cannot delete reactive property on undefined, null, or primitive value: {other:?}"
        )),
    }
}

fn delete_key(runtime: &Runtime, obj: &Object, key: &str) {
    let monitor = obj.monitor();
    if obj.is_root_instance() || monitor.as_ref().is_some_and(|m| m.root_count() > 0) {
        runtime.diagnostic(format_args!(
            "Avoid deleting properties on a root instance or its root state (key \"{key}\") \
             - just set it to null."
        ));
        return;
    }
    if !obj.has(key) {
        return;
    }
    if !obj.remove(key) {
        return;
    }
    if let Some(monitor) = monitor {
        monitor.dep().notify();
    }
}

impl Runtime {
    /// See [`set_property`].
    pub fn set(&self, target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Value {
        set_property(self, target, key, value)
    }

    /// See [`delete_property`].
    pub fn delete(&self, target: &Value, key: impl Into<Key>) {
        delete_property(self, target, key)
    }
}
