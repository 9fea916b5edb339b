//! Trellis Core
//!
//! This crate provides the dependency-tracking runtime for the Trellis
//! reactive framework. It implements:
//!
//! - Observation of plain data (objects and arrays) into tracked state
//! - Deps and the active-target context used for automatic tracking
//! - Watchers, computed values and deep traversal
//! - A deduplicating flush scheduler
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observer`: values, monitors, tracked slots and the mutation entry points
//! - `reactive`: deps, the runtime, watchers and scopes
//! - `graph`: scheduling of watcher jobs
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::{BoxError, Runtime, RuntimeConfig, Scope, Value, WatchOptions};
//!
//! let runtime = Runtime::with_config(RuntimeConfig::unbatched());
//! let scope = Scope::new(&runtime, "counter", Value::from_json(json!({ "count": 0 })));
//!
//! let doubled = scope.computed(|scope: &Scope| {
//!     let count = scope.data().as_object().unwrap().get("count");
//!     Ok(Value::from(count.as_f64().unwrap_or(0.0) * 2.0))
//! });
//!
//! scope
//!     .watch(
//!         "count",
//!         |_: &Scope, new: &Value, old: &Value| -> Result<(), BoxError> {
//!             println!("count: {old:?} -> {new:?}");
//!             Ok(())
//!         },
//!         WatchOptions::default(),
//!     )
//!     .unwrap();
//!
//! scope.data().as_object().unwrap().set("count", 5);
//! assert_eq!(doubled.get().unwrap(), Value::from(10));
//! ```

pub mod graph;
pub mod observer;
pub mod reactive;

mod config;
mod error;

pub use config::{RuntimeConfig, DEFAULT_MAX_UPDATE_COUNT};
pub use error::{BoxError, Error, ErrorSink, LogErrorSink, Result};
pub use graph::{FlushQueue, Scheduler};
pub use observer::{Array, Key, Monitor, Object, VNode, Value};
pub use reactive::{
    Computed, Dep, Runtime, RuntimeBuilder, Scope, WatchOptions, WatchSource, Watcher,
    WatcherOptions,
};
