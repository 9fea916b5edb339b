//! Deep traversal.
//!
//! Deep watchers call [`traverse`] on the value they produced while still
//! being the active target. Reading every nested key fires each tracked
//! slot's `depend`, so the watcher ends up subscribed to the whole tree.

use std::collections::HashSet;

use super::DepId;
use crate::observer::Value;

/// Read every value reachable from `value`.
///
/// Stops at primitives, frozen containers and nodes. Observed containers are
/// visited once per call, keyed by their container dep, which also makes
/// cyclic observed graphs terminate.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    traverse_into(value, &mut seen);
}

fn traverse_into(value: &Value, seen: &mut HashSet<DepId>) {
    match value {
        Value::Array(arr) => {
            if arr.is_frozen() || !first_visit(value, seen) {
                return;
            }
            for item in arr.items() {
                traverse_into(&item, seen);
            }
        }
        Value::Object(obj) => {
            if obj.is_frozen() || !first_visit(value, seen) {
                return;
            }
            for key in obj.keys() {
                traverse_into(&obj.get(&key), seen);
            }
        }
        _ => {}
    }
}

/// Record the container's dep id. Unobserved containers always count as new.
fn first_visit(value: &Value, seen: &mut HashSet<DepId>) -> bool {
    match value.monitor() {
        Some(monitor) => seen.insert(monitor.dep().id()),
        None => true,
    }
}
