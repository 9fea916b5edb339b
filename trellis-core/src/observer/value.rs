//! Dynamic values.
//!
//! [`Value`] is the state model the observer works on: primitives are held
//! inline, while objects and arrays are shared handles compared by identity.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::{Array, Monitor, Object};

/// A virtual-tree node. Nodes are opaque to the observer: they are never
/// observed and deep traversal stops at them.
#[derive(Clone)]
pub struct VNode {
    inner: Arc<VNodeData>,
}

struct VNodeData {
    tag: String,
}

impl VNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(VNodeData { tag: tag.into() }),
        }
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VNode(<{}>)", self.inner.tag)
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(Object),
    Array(Array),
    Node(VNode),
}

impl Value {
    /// Same-value comparison.
    ///
    /// Primitives compare by value, with `NaN` equal to itself; objects,
    /// arrays and nodes compare by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Node(a), Value::Node(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// True for reference types (objects, arrays and nodes).
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_) | Value::Node(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True for `undefined`, `null` and every other non-reference value.
    pub fn is_primitive(&self) -> bool {
        !self.is_object()
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The monitor attached to this value, if it is observed.
    pub fn monitor(&self) -> Option<Arc<Monitor>> {
        match self {
            Value::Object(obj) => obj.monitor(),
            Value::Array(arr) => arr.monitor(),
            _ => None,
        }
    }

    /// Build a value tree from JSON. The result is not observed yet.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Snapshot the value as JSON.
    ///
    /// Keys are read through [`Object::get`], so tracked reads register
    /// dependencies like any other read. Cycles, `undefined` and nodes
    /// become `null`; non-finite numbers too.
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = HashSet::new();
        self.to_json_inner(&mut seen)
    }

    fn to_json_inner(&self, seen: &mut HashSet<usize>) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Node(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(arr) => {
                if !seen.insert(arr.addr()) {
                    return serde_json::Value::Null;
                }
                let out = arr
                    .items()
                    .iter()
                    .map(|item| item.to_json_inner(seen))
                    .collect();
                seen.remove(&arr.addr());
                serde_json::Value::Array(out)
            }
            Value::Object(obj) => {
                if !seen.insert(obj.addr()) {
                    return serde_json::Value::Null;
                }
                let mut map = serde_json::Map::new();
                for key in obj.keys() {
                    let value = obj.get(&key);
                    if !value.is_undefined() {
                        map.insert(key, value.to_json_inner(seen));
                    }
                }
                seen.remove(&obj.addr());
                serde_json::Value::Object(map)
            }
        }
    }
}

/// Integral numbers serialize as JSON integers, everything else as floats.
fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

impl PartialEq for Value {
    /// Same-value semantics; see [`Value::same_value`].
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(obj) => fmt::Debug::fmt(obj, f),
            Value::Array(arr) => fmt::Debug::fmt(arr, f),
            Value::Node(node) => fmt::Debug::fmt(node, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl From<Array> for Value {
    fn from(arr: Array) -> Self {
        Value::Array(arr)
    }
}

impl From<VNode> for Value {
    fn from(node: VNode) -> Self {
        Value::Node(node)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
