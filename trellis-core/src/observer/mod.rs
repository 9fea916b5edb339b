//! Observed State
//!
//! This module turns plain values into tracked state.
//!
//! # Concepts
//!
//! ## Values
//!
//! [`Value`] is a dynamic value. [`Object`] and [`Array`] are shared handles,
//! so several parts of a value tree (or several watchers) can refer to the
//! same container.
//!
//! ## Monitors
//!
//! Observing a container attaches a [`Monitor`] to it. The monitor owns a
//! container-level dep that fires when keys are added or removed or when an
//! array is mutated. Observation is recursive and idempotent.
//!
//! ## Tracked slots
//!
//! Every own key of an observed object becomes a [`TrackedSlot`] with its own
//! dep. Reading the key inside an evaluation subscribes the evaluating
//! watcher; writing a different value notifies its subscribers.
//!
//! Keys that did not exist when the object was observed are invisible to
//! watchers until added through [`set_property`].

mod array;
mod monitor;
mod mutate;
mod object;
mod slot;
mod value;

pub use array::Array;
pub use monitor::{observe, Monitor};
pub use mutate::{delete_property, set_property, Key, MAX_ARRAY_INDEX};
pub use object::{GetterFn, Object, SetterFn};
pub use slot::{define_reactive, SetterHook, TrackedSlot};
pub use value::{VNode, Value};
