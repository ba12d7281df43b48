//! Idle strategies: the policy an agent applies between `doWork` cycles.
//!
//! Generalizes the queue crate's original reader-side wait strategy
//! (busy-spin / hybrid spin-then-park / sleep) into the four variants the
//! agent runtime needs, with the `idle(work_count)` contract: when work was
//! done the strategy must reset, when none was done it may spin, yield, or
//! sleep.

use std::thread;
use std::time::Duration;

/// Policy applied by an agent thread between `doWork()` calls.
#[derive(Debug, Clone)]
pub enum IdleStrategy {
    /// Never yields the CPU; lowest latency, 100% of one core.
    BusySpin,
    /// Calls `thread::yield_now()` every idle cycle.
    Yielding,
    /// Sleeps a fixed duration every idle cycle.
    Sleeping(Duration),
    /// Spins briefly, then yields, then parks with exponential backoff
    /// between `park_min` and `park_max`.
    Backoff {
        spin: u32,
        yield_count: u32,
        park_min: Duration,
        park_max: Duration,
    },
}

impl Default for IdleStrategy {
    fn default() -> Self {
        IdleStrategy::Backoff {
            spin: 100,
            yield_count: 100,
            park_min: Duration::from_micros(1),
            park_max: Duration::from_millis(1),
        }
    }
}

/// Mutable cursor over an `IdleStrategy`: tracks how many idle cycles have
/// elapsed since the last reset, which the `Backoff` variant needs to ramp
/// its spin/yield/park phases.
pub struct Idler {
    strategy: IdleStrategy,
    idle_count: u32,
    current_park: Duration,
}

impl Idler {
    pub fn new(strategy: IdleStrategy) -> Self {
        let current_park = match &strategy {
            IdleStrategy::Backoff { park_min, .. } => *park_min,
            _ => Duration::from_micros(1),
        };
        Idler {
            strategy,
            idle_count: 0,
            current_park,
        }
    }

    /// Called once per agent cycle with the number of events processed.
    /// `work_count > 0` resets the backoff state; `work_count == 0` advances
    /// it and may sleep/yield/spin.
    pub fn idle(&mut self, work_count: usize) {
        if work_count > 0 {
            self.reset();
            return;
        }
        match &self.strategy {
            IdleStrategy::BusySpin => {
                std::hint::spin_loop();
            }
            IdleStrategy::Yielding => {
                thread::yield_now();
            }
            IdleStrategy::Sleeping(dur) => {
                thread::sleep(*dur);
            }
            IdleStrategy::Backoff {
                spin,
                yield_count,
                park_max,
                ..
            } => {
                self.idle_count = self.idle_count.saturating_add(1);
                if self.idle_count <= *spin {
                    std::hint::spin_loop();
                } else if self.idle_count <= spin + yield_count {
                    thread::yield_now();
                } else {
                    thread::sleep(self.current_park);
                    self.current_park = (self.current_park * 2).min(*park_max);
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.idle_count = 0;
        if let IdleStrategy::Backoff { park_min, .. } = &self.strategy {
            self.current_park = *park_min;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_resets_backoff_state() {
        let mut idler = Idler::new(IdleStrategy::Backoff {
            spin: 1,
            yield_count: 1,
            park_min: Duration::from_micros(1),
            park_max: Duration::from_micros(8),
        });
        idler.idle(0);
        idler.idle(0);
        idler.idle(0);
        assert!(idler.idle_count > 0);
        idler.idle(1);
        assert_eq!(idler.idle_count, 0);
    }

    #[test]
    fn busy_spin_never_sleeps_noticeably() {
        let mut idler = Idler::new(IdleStrategy::BusySpin);
        let start = std::time::Instant::now();
        for _ in 0..1000 {
            idler.idle(0);
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
