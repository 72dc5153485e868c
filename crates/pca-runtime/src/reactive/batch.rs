#![forbid(unsafe_code)]

//! Deferred work for [`Observable`](super::Observable) notifications and
//! scheduled follow-up updates.
//!
//! While a [`BatchScope`] is alive, notifications and anything passed to
//! [`defer_or_run`] are queued. When the outermost scope drops, the queue
//! is drained in enqueue order. Work queued while draining (a subscriber
//! that writes to another observable, a deferred validation that updates
//! the form) runs in the same drain, after everything already queued.
//!
//! This is the "after the current update settles" point used by the form
//! engine: an update opens a scope, schedules its follow-up, and the
//! follow-up runs once the update has fully completed.
//!
//! # Invariants
//!
//! 1. Nested batches are supported: only the outermost scope flushes.
//! 2. Within a batch, `Observable::get()` returns the latest value.
//! 3. Keyed entries coalesce: the latest callback wins, keeping the
//!    first enqueue position.
//! 4. A panicking callback does not stop the rest; the first panic is
//!    re-raised once the queue is empty.

use std::cell::RefCell;

use tracing::debug;

type Deferred = Box<dyn FnOnce()>;

struct DeferredEntry {
    key: Option<usize>,
    run: Deferred,
}

struct BatchContext {
    depth: u32,
    /// Set while the root scope drains the queue.
    flushing: bool,
    deferred: Vec<DeferredEntry>,
}

thread_local! {
    static BATCH_CTX: RefCell<Option<BatchContext>> = const { RefCell::new(None) };
}

/// Whether a batch (or its flush) is active on this thread.
pub fn is_batching() -> bool {
    BATCH_CTX.with(|ctx| ctx.borrow().is_some())
}

/// Queue `f` for the end of the current batch, or run it now if none is
/// active. Returns `true` when deferred.
pub fn defer_or_run(f: impl FnOnce() + 'static) -> bool {
    enqueue(None, Box::new(f))
}

/// Like [`defer_or_run`], replacing any entry already queued under `key`.
pub fn defer_or_run_keyed(key: usize, f: impl FnOnce() + 'static) -> bool {
    enqueue(Some(key), Box::new(f))
}

fn enqueue(key: Option<usize>, run: Deferred) -> bool {
    let rejected = BATCH_CTX.with(|ctx| {
        let mut guard = ctx.borrow_mut();
        let Some(batch) = guard.as_mut() else {
            return Some(run);
        };
        if let Some(key) = key
            && let Some(entry) = batch.deferred.iter_mut().find(|e| e.key == Some(key))
        {
            entry.run = run;
        } else {
            batch.deferred.push(DeferredEntry { key, run });
        }
        None
    });
    match rejected {
        Some(run) => {
            run();
            false
        }
        None => true,
    }
}

fn take_pending() -> Vec<Deferred> {
    BATCH_CTX.with(|ctx| {
        ctx.borrow_mut().as_mut().map_or_else(Vec::new, |batch| {
            std::mem::take(&mut batch.deferred)
                .into_iter()
                .map(|entry| entry.run)
                .collect()
        })
    })
}

fn flush() {
    let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
    let mut rounds = 0u32;
    let mut ran = 0usize;
    loop {
        let pending = take_pending();
        if pending.is_empty() {
            break;
        }
        rounds += 1;
        ran += pending.len();
        for run in pending {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(run));
            if let Err(payload) = result
                && first_panic.is_none()
            {
                first_panic = Some(payload);
            }
        }
    }
    if ran > 0 {
        debug!(target: "pca.reactive", rounds, ran, "batch flushed");
    }
    if let Some(payload) = first_panic {
        // Leave the thread-local clean before unwinding.
        BATCH_CTX.with(|ctx| *ctx.borrow_mut() = None);
        std::panic::resume_unwind(payload);
    }
}

/// RAII guard that begins a batch scope.
pub struct BatchScope {
    is_root: bool,
}

impl BatchScope {
    #[must_use]
    pub fn new() -> Self {
        let is_root = BATCH_CTX.with(|ctx| {
            let mut guard = ctx.borrow_mut();
            match guard.as_mut() {
                Some(batch) => {
                    batch.depth += 1;
                    false
                }
                None => {
                    *guard = Some(BatchContext {
                        depth: 1,
                        flushing: false,
                        deferred: Vec::new(),
                    });
                    true
                }
            }
        });
        Self { is_root }
    }

    /// Entries queued in the current batch.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        BATCH_CTX.with(|ctx| ctx.borrow().as_ref().map_or(0, |b| b.deferred.len()))
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let should_flush = BATCH_CTX.with(|ctx| {
            let mut guard = ctx.borrow_mut();
            match guard.as_mut() {
                Some(batch) => {
                    batch.depth = batch.depth.saturating_sub(1);
                    let flush = batch.depth == 0 && !batch.flushing;
                    if flush {
                        batch.flushing = true;
                    }
                    flush
                }
                None => false,
            }
        });

        if should_flush {
            flush();
            BATCH_CTX.with(|ctx| *ctx.borrow_mut() = None);
        }
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("is_root", &self.is_root)
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn batch_defers_and_coalesces_notifications() {
        let obs = Observable::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v| seen_clone.borrow_mut().push(*v));

        {
            let _batch = BatchScope::new();
            obs.set(1);
            obs.set(2);
            obs.set(3);
            assert_eq!(obs.get(), 3);
            assert!(seen.borrow().is_empty());
        }
        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn nested_batch_only_outermost_flushes() {
        let ran = Rc::new(Cell::new(false));
        let ran_clone = Rc::clone(&ran);
        {
            let _outer = BatchScope::new();
            {
                let _inner = BatchScope::new();
                defer_or_run(move || ran_clone.set(true));
            }
            assert!(!ran.get());
        }
        assert!(ran.get());
        assert!(!is_batching());
    }

    #[test]
    fn work_queued_during_flush_runs_in_same_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let outer_log = Rc::clone(&log);
        {
            let _batch = BatchScope::new();
            defer_or_run(move || {
                outer_log.borrow_mut().push("first");
                let inner_log = Rc::clone(&outer_log);
                // Scopes opened while flushing nest into the root flush.
                let _nested = BatchScope::new();
                defer_or_run(move || inner_log.borrow_mut().push("second"));
            });
        }
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert!(!is_batching());
    }

    #[test]
    fn defer_or_run_without_batch_runs_now() {
        let ran = Rc::new(Cell::new(false));
        let ran_clone = Rc::clone(&ran);
        assert!(!defer_or_run(move || ran_clone.set(true)));
        assert!(ran.get());
    }

    #[test]
    fn keyed_entries_keep_first_position() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let (o1, o2, o3) = (Rc::clone(&order), Rc::clone(&order), Rc::clone(&order));
        {
            let batch = BatchScope::new();
            defer_or_run_keyed(1, move || o1.borrow_mut().push("first-old"));
            defer_or_run_keyed(2, move || o2.borrow_mut().push("second"));
            defer_or_run_keyed(1, move || o3.borrow_mut().push("first-new"));
            assert_eq!(batch.pending_count(), 2);
        }
        assert_eq!(*order.borrow(), vec!["first-new", "second"]);
    }
}
