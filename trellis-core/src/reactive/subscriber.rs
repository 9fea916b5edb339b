//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! Watchers are the only subscribers the crate creates itself, but the trait
//! is public so hosts can hang their own computations off a [`Dep`].

use std::fmt;

use super::Dep;

/// Unique identifier for a subscriber.
///
/// Ids are handed out by a [`Runtime`](crate::Runtime) in creation order, so
/// ascending id order puts owning computations before the ones they create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Wrap a raw id.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A computation that can depend on [`Dep`]s.
pub trait Subscriber: Send + Sync {
    /// Get the subscriber ID.
    fn id(&self) -> SubscriberId;

    /// Record that `dep` was read during the current evaluation.
    fn add_dep(&self, dep: &Dep);

    /// Called when one of the subscriber's dependencies changed.
    fn update(&self);
}
