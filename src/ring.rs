//! Bounded SPSC ring between the acquisition thread and the disk writer.
//!
//! This is a thin layer over an `rtrb` ring. The producer side never blocks: a push into a
//! full ring hands the element straight back. The consumer side parks until an element shows
//! up or the producer goes away, so the writer doesn't have to peg a core spinning on `pop`.

use std::{
    sync::{Arc, OnceLock},
    thread::{self, Thread},
    time::Duration,
};

// Upper bound on how long a consumer sleeps without rechecking the ring, in case an unpark
// raced with the consumer registering itself
const PARK_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Default)]
struct Waiter {
    thread: OnceLock<Thread>,
}

impl Waiter {
    fn wake(&self) {
        if let Some(t) = self.thread.get() {
            t.unpark();
        }
    }
}

pub struct RingProducer<T> {
    inner: rtrb::Producer<T>,
    capacity: usize,
    waiter: Arc<Waiter>,
}

pub struct RingConsumer<T> {
    inner: rtrb::Consumer<T>,
    waiter: Arc<Waiter>,
}

/// Create a ring that holds at most `capacity` elements
pub fn ring_buffer<T>(capacity: usize) -> (RingProducer<T>, RingConsumer<T>) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    let waiter = Arc::new(Waiter::default());
    (
        RingProducer {
            inner: producer,
            capacity,
            waiter: waiter.clone(),
        },
        RingConsumer {
            inner: consumer,
            waiter,
        },
    )
}

impl<T> RingProducer<T> {
    /// Enqueue without blocking. A full ring is left untouched and the element is returned.
    pub fn try_push(&mut self, element: T) -> Result<(), T> {
        match self.inner.push(element) {
            Ok(()) => {
                self.waiter.wake();
                Ok(())
            }
            Err(rtrb::PushError::Full(element)) => Err(element),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots
    pub fn slots(&self) -> usize {
        self.inner.slots()
    }
}

impl<T> Drop for RingProducer<T> {
    fn drop(&mut self) {
        // Dropping the producer closes the ring, make sure a parked consumer notices
        self.waiter.wake();
    }
}

impl<T> RingConsumer<T> {
    pub fn try_pop(&mut self) -> Option<T> {
        self.inner.pop().ok()
    }

    /// Block until an element is available, FIFO. Returns `None` once the producer is gone
    /// and everything it pushed has been taken.
    pub fn pop_blocking(&mut self) -> Option<T> {
        // Only ever one consumer thread, so the first caller owns the slot
        let _ = self.waiter.thread.set(thread::current());
        loop {
            if let Ok(element) = self.inner.pop() {
                return Some(element);
            }
            if self.inner.is_abandoned() {
                // The producer may have pushed right before it went away
                return self.inner.pop().ok();
            }
            thread::park_timeout(PARK_TIMEOUT);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_abandoned()
    }
}
