//! Observable arrays.
//!
//! Element access on an [`Array`] is not tracked. Instead, every structural
//! mutation goes through the methods below: once an array is observed, each
//! of them observes newly inserted elements and notifies the array's
//! container dep exactly once.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::{Monitor, Value};

struct ArrayInner {
    items: RwLock<Vec<Value>>,
    monitor: OnceLock<Arc<Monitor>>,
    extensible: AtomicBool,
    frozen: AtomicBool,
}

/// Shared handle to an array. Clones refer to the same array.
#[derive(Clone)]
pub struct Array {
    inner: Arc<ArrayInner>,
}

impl Array {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                items: RwLock::new(items),
                monitor: OnceLock::new(),
                extensible: AtomicBool::new(true),
                frozen: AtomicBool::new(false),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    /// Element at `index`, or `undefined` past the end.
    pub fn get(&self, index: usize) -> Value {
        self.inner.items.read().get(index).cloned().unwrap_or_default()
    }

    /// Snapshot of the elements.
    pub fn items(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// Append elements. Returns the new length.
    pub fn push(&self, values: impl IntoIterator<Item = Value>) -> usize {
        let values: Vec<Value> = values.into_iter().collect();
        let len = match self.mutate(|items| {
            items.extend(values.iter().cloned());
            items.len()
        }) {
            Some(len) => len,
            None => return self.len(),
        };
        self.after_mutation(&values);
        len
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        let removed = self.mutate(|items| items.pop().unwrap_or_default());
        match removed {
            Some(value) => {
                self.after_mutation(&[]);
                value
            }
            None => Value::Undefined,
        }
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Value {
        let removed = self.mutate(|items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        });
        match removed {
            Some(value) => {
                self.after_mutation(&[]);
                value
            }
            None => Value::Undefined,
        }
    }

    /// Prepend elements. Returns the new length.
    pub fn unshift(&self, values: impl IntoIterator<Item = Value>) -> usize {
        let values: Vec<Value> = values.into_iter().collect();
        let len = match self.mutate(|items| {
            items.splice(0..0, values.iter().cloned());
            items.len()
        }) {
            Some(len) => len,
            None => return self.len(),
        };
        self.after_mutation(&values);
        len
    }

    /// Remove `delete_count` elements starting at `start` and insert
    /// `insert` in their place. Out-of-range arguments are clamped.
    /// Returns the removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        insert: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let insert: Vec<Value> = insert.into_iter().collect();
        let removed = self.mutate(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items.splice(start..end, insert.iter().cloned()).collect::<Vec<_>>()
        });
        match removed {
            Some(removed) => {
                self.after_mutation(&insert);
                removed
            }
            None => Vec::new(),
        }
    }

    /// Sort with a comparator. The comparator runs on a snapshot with no
    /// lock held, so it may read this array.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> CmpOrdering,
    {
        if self.is_frozen() {
            return;
        }
        let mut sorted = self.items();
        sorted.sort_by(compare);
        if self.mutate(|items| *items = sorted).is_some() {
            self.after_mutation(&[]);
        }
    }

    /// Reverse in place.
    pub fn reverse(&self) {
        if self.mutate(|items| items.reverse()).is_some() {
            self.after_mutation(&[]);
        }
    }

    /// Pad with `undefined` up to `len` without notifying, like assigning a
    /// larger `length`. Returns false when the storage cannot be reserved.
    pub(crate) fn extend_len(&self, len: usize) -> bool {
        self.mutate(|items| {
            if items.len() >= len {
                return true;
            }
            if items.try_reserve(len - items.len()).is_err() {
                return false;
            }
            items.resize(len, Value::Undefined);
            true
        })
        .unwrap_or(true)
    }

    pub fn freeze(&self) {
        self.inner.frozen.store(true, Ordering::SeqCst);
        self.inner.extensible.store(false, Ordering::SeqCst);
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::SeqCst)
    }

    pub fn prevent_extensions(&self) {
        self.inner.extensible.store(false, Ordering::SeqCst);
    }

    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.load(Ordering::SeqCst)
    }

    pub fn monitor(&self) -> Option<Arc<Monitor>> {
        self.inner.monitor.get().cloned()
    }

    pub(crate) fn attach_monitor(&self, monitor: Arc<Monitor>) -> Arc<Monitor> {
        self.inner.monitor.get_or_init(|| monitor).clone()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Run `f` on the elements unless the array is frozen.
    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<Value>) -> T) -> Option<T> {
        if self.is_frozen() {
            return None;
        }
        let mut items = self.inner.items.write();
        Some(f(&mut items))
    }

    fn after_mutation(&self, inserted: &[Value]) {
        let Some(monitor) = self.monitor() else {
            return;
        };
        if !inserted.is_empty() {
            monitor.observe_items(inserted);
        }
        monitor.dep().notify();
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("len", &self.len())
            .field("observed", &self.monitor().is_some())
            .finish()
    }
}
