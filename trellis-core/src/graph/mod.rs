//! Update Scheduling
//!
//! Watchers that are neither lazy nor sync do not run when a dep notifies.
//! They are handed to the runtime's [`Scheduler`], which batches them and
//! runs them later in a well-defined order.
//!
//! # Design Decisions
//!
//! 1. Scheduling is a trait so hosts can plug in their own event loop. The
//!    default [`FlushQueue`] flushes when the host calls
//!    [`Runtime::flush`](crate::Runtime::flush).
//!
//! 2. Jobs run in ascending watcher id order. Ids are handed out at
//!    construction, so a watcher created by an outer computation runs before
//!    the watchers created inside it.
//!
//! 3. Deduplication is per flush: a watcher notified many times runs once.

mod scheduler;

pub use scheduler::{FlushQueue, Scheduler};
