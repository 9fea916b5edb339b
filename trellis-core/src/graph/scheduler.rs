//! Flush Scheduler
//!
//! The scheduler decides when and in which order queued watchers run.
//!
//! # Algorithm
//!
//! 1. A notified watcher is enqueued once; further notifications before it
//!    runs are dropped (dedup by watcher id).
//! 2. `flush()` repeatedly takes the queued watcher with the lowest id, so
//!    owners (created first) run before the watchers they own.
//! 3. Right before a watcher runs, it leaves the dedup set and its `before`
//!    hook fires. A watcher that changes its own inputs may therefore queue
//!    itself again during the same flush.
//! 4. A watcher re-queued more than `max_update_count` times in one flush is
//!    treated as an infinite update loop: a warning is logged and the flush
//!    stops.
//!
//! In unbatched mode every enqueue outside a flush flushes at once.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::config::RuntimeConfig;
use crate::reactive::{SubscriberId, Watcher};

/// Deferred execution of watcher jobs.
///
/// `enqueue` must dedup per flush and eventually call [`Watcher::run`] once
/// per batch of notifications.
pub trait Scheduler: Send + Sync {
    fn enqueue(&self, watcher: Watcher);

    /// Run everything queued so far. Schedulers that drive themselves can
    /// ignore this.
    fn flush(&self) {}
}

/// The default scheduler: an id-ordered, deduplicating queue.
pub struct FlushQueue {
    queue: Mutex<Vec<Watcher>>,
    has: Mutex<HashSet<SubscriberId>>,
    flushing: AtomicBool,
    batched: bool,
    max_update_count: usize,
}

impl FlushQueue {
    pub fn new(batched: bool, max_update_count: usize) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            has: Mutex::new(HashSet::new()),
            flushing: AtomicBool::new(false),
            batched,
            max_update_count,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.batched, config.max_update_count)
    }

    /// Number of watchers waiting to run.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::SeqCst)
    }

    /// Remove and return the queued watcher with the lowest id.
    fn next(&self) -> Option<Watcher> {
        let mut queue = self.queue.lock();
        let pos = queue
            .iter()
            .enumerate()
            .min_by_key(|(_, w)| w.id())
            .map(|(pos, _)| pos)?;
        Some(queue.swap_remove(pos))
    }
}

impl Default for FlushQueue {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl Scheduler for FlushQueue {
    fn enqueue(&self, watcher: Watcher) {
        if !self.has.lock().insert(watcher.id()) {
            return;
        }
        tracing::trace!(watcher = %watcher.id(), "enqueue");
        self.queue.lock().push(watcher);

        if !self.batched && !self.is_flushing() {
            self.flush();
        }
    }

    fn flush(&self) {
        if self.flushing.swap(true, Ordering::SeqCst) {
            return;
        }
        let _reset = FlushReset(self);

        let mut circular: HashMap<SubscriberId, usize> = HashMap::new();
        let mut ran = 0usize;
        while let Some(watcher) = self.next() {
            let id = watcher.id();
            self.has.lock().remove(&id);

            watcher.call_before();
            if let Err(error) = watcher.run() {
                watcher.runtime().report_error(
                    &error,
                    Some(watcher.scope()),
                    &format!("watcher \"{}\"", watcher.expression()),
                );
            }
            ran += 1;

            if self.has.lock().contains(&id) {
                let count = circular.entry(id).or_insert(0);
                *count += 1;
                if *count > self.max_update_count {
                    tracing::warn!(
                        watcher = %id,
                        expression = watcher.expression(),
                        "possible infinite update loop, stopping flush"
                    );
                    break;
                }
            }
        }
        tracing::debug!(ran, "flush complete");
    }
}

/// Clears the queue state when a flush ends, including by panic.
struct FlushReset<'a>(&'a FlushQueue);

impl Drop for FlushReset<'_> {
    fn drop(&mut self) {
        self.0.queue.lock().clear();
        self.0.has.lock().clear();
        self.0.flushing.store(false, Ordering::SeqCst);
    }
}

// ---- Tests ----
