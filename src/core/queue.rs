//! The queue fabric: bounded single-producer/single-consumer ring buffers.
//!
//! Each queue connects exactly one publisher (the source's agent) to exactly
//! one consumer (a processor-agent's drain loop). Capacity is fixed at
//! construction and rounded up to the next power of two so slot indices can
//! be computed with a mask instead of a modulo.
//!
//! # Memory ordering
//!
//! `tail` (producer-owned) is published with `Release` and observed with
//! `Acquire` by the consumer; `head` (consumer-owned) is published with
//! `Release` and observed with `Acquire` by the producer. A successful
//! `offer` happens-before the matching `drain_to` observes the element,
//! which is the ordering guarantee §4.1 of the dispatch protocol relies on.
//!
//! `QueueProducer` and `QueueConsumer` are deliberately not `Clone`: the
//! single-writer/single-reader invariant is enforced by construction rather
//! than by runtime checks.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Default capacity used when a source doesn't specify one (§3: "default
/// power-of-two, e.g., 2048").
pub const DEFAULT_CAPACITY: usize = 2048;

struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Slot {
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

struct Ring<T> {
    buffer: Box<[Slot<T>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicU64,
}

unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(2);
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, Slot::empty);
        Ring {
            buffer: buffer.into_boxed_slice(),
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

/// Creates a bound pair of (producer, consumer) handles over a fresh ring.
///
/// `capacity` is rounded up to the next power of two (minimum 2).
pub fn bounded<T>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let ring = Arc::new(Ring::with_capacity(capacity));
    (
        QueueProducer { ring: ring.clone() },
        QueueConsumer { ring },
    )
}

/// The single writer handle for a target queue.
pub struct QueueProducer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> QueueProducer<T> {
    /// Attempts to enqueue `value`. Returns `false` (and the value is
    /// dropped) if the queue is full. Never blocks.
    pub fn offer(&self, value: T) -> bool {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= ring.capacity() {
            return false;
        }
        let idx = tail & ring.mask;
        unsafe {
            (*ring.buffer[idx].value.get()).write(value);
        }
        ring.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Number of elements the consumer has not yet drained (approximate,
    /// since the consumer may be concurrently draining).
    pub fn len(&self) -> usize {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Count of elements discarded by a `Drop` slow-consumer policy against
    /// this queue (§8: "increments a counter and reports ERROR").
    pub fn record_drop(&self) {
        self.ring.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.ring.dropped.load(Ordering::Relaxed)
    }
}

/// The single reader handle for a target queue.
pub struct QueueConsumer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> QueueConsumer<T> {
    /// Drains up to `max` elements, calling `sink` for each in FIFO order.
    /// Returns the number of elements drained.
    pub fn drain_to<F: FnMut(T)>(&self, max: usize, mut sink: F) -> usize {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let tail = ring.tail.load(Ordering::Acquire);
        let available = tail.wrapping_sub(head);
        let to_take = available.min(max);
        for i in 0..to_take {
            let idx = (head.wrapping_add(i)) & ring.mask;
            let value = unsafe { (*ring.buffer[idx].value.get()).assume_init_read() };
            sink(value);
        }
        if to_take > 0 {
            ring.head.store(head.wrapping_add(to_take), Ordering::Release);
        }
        to_take
    }

    pub fn len(&self) -> usize {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Acquire);
        let head = ring.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        let mut pos = head;
        while pos != tail {
            let idx = pos & self.mask;
            unsafe {
                (*self.buffer[idx].value.get()).assume_init_drop();
            }
            pos = pos.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_then_drain_preserves_order() {
        let (p, c) = bounded::<i32>(4);
        for v in 0..4 {
            assert!(p.offer(v));
        }
        assert!(!p.offer(99), "queue should be full at capacity");

        let mut out = Vec::new();
        let n = c.drain_to(10, |v| out.push(v));
        assert_eq!(n, 4);
        assert_eq!(out, vec![0, 1, 2, 3]);
        assert!(c.is_empty());
    }

    #[test]
    fn drain_respects_max_batch() {
        let (p, c) = bounded::<i32>(16);
        for v in 0..10 {
            p.offer(v);
        }
        let mut out = Vec::new();
        let n = c.drain_to(4, |v| out.push(v));
        assert_eq!(n, 4);
        assert_eq!(out, vec![0, 1, 2, 3]);
        assert_eq!(c.len(), 6);
    }

    #[test]
    fn capacity_rounds_to_power_of_two() {
        let (p, _c) = bounded::<u8>(10);
        assert_eq!(p.capacity(), 16);
    }

    #[test]
    fn cross_thread_publish_happens_before_drain() {
        use std::thread;
        let (p, c) = bounded::<u64>(1024);
        let writer = thread::spawn(move || {
            for v in 0..100_000u64 {
                while !p.offer(v) {
                    std::hint::spin_loop();
                }
            }
        });

        let mut received = Vec::with_capacity(100_000);
        while received.len() < 100_000 {
            c.drain_to(256, |v| received.push(v));
        }
        writer.join().unwrap();
        assert_eq!(received, (0..100_000u64).collect::<Vec<_>>());
    }
}
