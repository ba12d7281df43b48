//! Minimal object pool (§5 "shared resource policy": "lock-free
//! acquire/release with reference-counting reset hook invoked on final
//! release"). Referenced only for its reset-on-release semantics; no
//! allocation-strategy tuning.

use std::sync::Mutex;

/// Resets an object to its default usable state before it re-enters the
/// pool's free list.
pub trait Reset {
    fn reset(&mut self);
}

/// A bounded free-list pool. `acquire` takes an existing instance if one is
/// free, otherwise builds a new one via `factory`; `release` resets the
/// instance and returns it to the free list (dropped instead if the pool is
/// already at `max_idle`).
pub struct Pool<T: Reset> {
    factory: Box<dyn Fn() -> T + Send + Sync>,
    free: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T: Reset> Pool<T> {
    pub fn new(max_idle: usize, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Pool {
            factory: Box::new(factory),
            free: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    pub fn acquire(&self) -> T {
        self.free.lock().unwrap().pop().unwrap_or_else(|| (self.factory)())
    }

    pub fn release(&self, mut value: T) {
        value.reset();
        let mut free = self.free.lock().unwrap();
        if free.len() < self.max_idle {
            free.push(value);
        }
    }

    pub fn idle_count(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Buffer {
        data: Vec<u8>,
    }

    impl Reset for Buffer {
        fn reset(&mut self) {
            self.data.clear();
        }
    }

    #[test]
    fn release_resets_before_reuse() {
        let pool = Pool::new(4, Buffer::default);
        let mut buf = pool.acquire();
        buf.data.extend_from_slice(b"hello");
        pool.release(buf);

        let reused = pool.acquire();
        assert!(reused.data.is_empty());
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn excess_releases_beyond_max_idle_are_dropped() {
        let pool = Pool::new(1, Buffer::default);
        pool.release(Buffer::default());
        pool.release(Buffer::default());
        assert_eq!(pool.idle_count(), 1);
    }
}
