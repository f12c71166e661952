//! Shared state tying the acquisition, writer, and metadata threads together.
//!
//! One [`CaptureContext`] is created per run and handed to every worker behind an `Arc`.
//! It carries the latched stop flag, the cumulative sample counter, the count of blocks
//! sitting in the ring, and the condition variable the segmenter sleeps on.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Condvar, Mutex, MutexGuard,
};

#[derive(Default)]
pub struct CaptureContext {
    stop: AtomicBool,
    // Set once acquisition has returned, after which `total_samples` never changes
    sealed: AtomicBool,
    total_samples: AtomicU64,
    outstanding: AtomicUsize,
    boundary: Mutex<()>,
    wakeup: Condvar,
}

impl CaptureContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the stop flag. Returns true only for the call that actually flipped it.
    pub fn request_stop(&self) -> bool {
        !self.stop.swap(true, Ordering::AcqRel)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Called by the coordinator once acquisition has returned: stops everything and wakes
    /// the segmenter so it can write out whatever is left.
    pub fn seal(&self) {
        self.request_stop();
        self.sealed.store(true, Ordering::Release);
        self.notify();
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Only the acquisition loop calls this. Returns the new total.
    pub fn add_samples(&self, n: u64) -> u64 {
        self.total_samples.fetch_add(n, Ordering::AcqRel) + n
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples.load(Ordering::Acquire)
    }

    pub fn block_enqueued(&self) {
        self.outstanding.fetch_add(1, Ordering::Relaxed);
    }

    pub fn block_written(&self) {
        // Saturate, progress reporting only
        let _ = self
            .outstanding
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Wake the segmenter. The lock is taken so the wakeup can't land between the segmenter
    /// checking its predicate and going to sleep.
    pub fn notify(&self) {
        drop(self.lock());
        self.wakeup.notify_all();
    }

    /// Sleep until at least `threshold` samples have been acquired or the run is sealed.
    /// Returns the total seen on wakeup.
    pub fn wait_for_samples(&self, threshold: u64) -> u64 {
        let guard = self.lock();
        let _guard = self
            .wakeup
            .wait_while(guard, |_| {
                !self.is_sealed() && self.total_samples() < threshold
            })
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.total_samples()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // Nothing lives behind this mutex, so poisoning carries no broken invariant
        self.boundary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
