//! Reactive Primitives
//!
//! This module implements dependency tracking: deps, the active target and
//! watchers. Together with [`observer`](crate::observer) they form the
//! foundation of Trellis' fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Deps
//!
//! A [`Dep`] is a subscription point. Every tracked slot and every observed
//! container owns one. Reading tracked state while a watcher evaluates
//! subscribes the watcher to the dep; changing it notifies the dep.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a getter, remembers exactly which deps it read,
//! and reacts when one of them changes. Scopes create them through
//! [`Scope::watch`] and [`Scope::computed`].
//!
//! ## Computed values
//!
//! A [`Computed`] is a lazy watcher that re-evaluates on demand. Reading it
//! inside another watcher forwards its deps to that watcher.
//!
//! # Implementation Notes
//!
//! The active target lives in the [`Runtime`], not in a global, so
//! independent runtimes can coexist in one process. Evaluations nest: a
//! watcher's getter may evaluate other watchers, and the previous target is
//! restored when the inner evaluation ends.

mod context;
mod dep;
mod path;
pub(crate) mod runtime;
mod scope;
mod subscriber;
mod traverse;
mod watcher;

pub use context::TargetGuard;
pub use dep::{Dep, DepId};
pub use path::parse_path;
pub use runtime::{Runtime, RuntimeBuilder};
pub use scope::{Computed, Scope, WatchOptions};
pub use subscriber::{Subscriber, SubscriberId};
pub use traverse::traverse;
pub use watcher::{CallbackFn, EvalFn, HookFn, WatchSource, Watcher, WatcherOptions};
