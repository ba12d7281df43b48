//! `SchedulerService` (§6): a deadline timer wheel polled from a dedicated
//! agent's `doWork`, giving processors `scheduleAtTime`/`scheduleAfterDelay`
//! without recursing on the call stack (§9 "re-entrant event cycles").

use std::collections::BinaryHeap;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use crate::agent::runtime::Agent;
use crate::core::clock::Clock;

pub type ScheduledId = u64;

/// A callback scheduled to run once its deadline has passed. Boxed so the
/// scheduler can hold callbacks of unrelated closures in one queue.
pub type Callback = Box<dyn FnMut() + Send>;

struct Timer {
    id: ScheduledId,
    deadline_ms: u64,
    callback: Callback,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline_ms == other.deadline_ms && self.id == other.id
    }
}
impl Eq for Timer {}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest deadline first.
        other.deadline_ms.cmp(&self.deadline_ms).then_with(|| other.id.cmp(&self.id))
    }
}
impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    heap: BinaryHeap<Timer>,
    cancelled: std::collections::HashSet<ScheduledId>,
}

/// Deadline timer wheel: `schedule_*` may be called from any thread (e.g. a
/// processor's `on_event`), but timers only ever fire from the agent thread
/// polling `poll_due` — matching §9's rule that re-entrant work must be
/// enqueued rather than run on the caller's stack.
pub struct SchedulerService {
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl SchedulerService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        SchedulerService {
            clock,
            next_id: AtomicU64::new(1),
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                cancelled: std::collections::HashSet::new(),
            }),
        }
    }

    pub fn milli_time(&self) -> u64 {
        self.clock.now() / 1_000_000
    }

    pub fn micro_time(&self) -> u64 {
        self.clock.now() / 1_000
    }

    pub fn nano_time(&self) -> u64 {
        self.clock.now()
    }

    pub fn schedule_at_time(&self, abs_ms: u64, callback: Callback) -> ScheduledId {
        let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        self.inner.lock().unwrap().heap.push(Timer {
            id,
            deadline_ms: abs_ms,
            callback,
        });
        id
    }

    pub fn schedule_after_delay(&self, wait_ms: u64, callback: Callback) -> ScheduledId {
        self.schedule_at_time(self.milli_time() + wait_ms, callback)
    }

    pub fn cancel(&self, id: ScheduledId) {
        self.inner.lock().unwrap().cancelled.insert(id);
    }

    /// Pops and runs every timer whose deadline has passed, returning the
    /// number fired. Called from the scheduler's own agent thread only.
    pub fn poll_due(&self) -> usize {
        let now = self.milli_time();
        let mut fired = 0;
        loop {
            let due = {
                let mut guard = self.inner.lock().unwrap();
                match guard.heap.peek() {
                    Some(timer) if timer.deadline_ms <= now => guard.heap.pop(),
                    _ => None,
                }
            };
            let Some(mut timer) = due else { break };
            let mut guard = self.inner.lock().unwrap();
            let cancelled = guard.cancelled.remove(&timer.id);
            drop(guard);
            if !cancelled {
                (timer.callback)();
                fired += 1;
            }
        }
        fired
    }
}

/// Runs a `SchedulerService` as an agent: `doWork` just polls due timers.
pub struct SchedulerAgent {
    name: Arc<str>,
    scheduler: Arc<SchedulerService>,
}

impl SchedulerAgent {
    pub fn new(name: impl Into<Arc<str>>, scheduler: Arc<SchedulerService>) -> Self {
        SchedulerAgent {
            name: name.into(),
            scheduler,
        }
    }
}

impl Agent for SchedulerAgent {
    fn do_work(&mut self) -> usize {
        self.scheduler.poll_due()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn fires_timers_in_deadline_order() {
        let scheduler = SchedulerService::new(Arc::new(SystemClock));
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        scheduler.schedule_at_time(0, Box::new(move || o1.lock().unwrap().push(1)));
        let o2 = order.clone();
        scheduler.schedule_at_time(0, Box::new(move || o2.lock().unwrap().push(2)));

        let fired = scheduler.poll_due();
        assert_eq!(fired, 2);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn cancelled_timer_does_not_fire() {
        let scheduler = SchedulerService::new(Arc::new(SystemClock));
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = scheduler.schedule_at_time(0, Box::new(move || { c.fetch_add(1, AtomicOrdering::SeqCst); }));
        scheduler.cancel(id);
        scheduler.poll_due();
        assert_eq!(count.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn re_entrant_schedule_from_inside_callback_does_not_recurse() {
        let scheduler = Arc::new(SchedulerService::new(Arc::new(SystemClock)));
        let count = Arc::new(AtomicUsize::new(0));

        let scheduler2 = scheduler.clone();
        let count2 = count.clone();
        fn emit(scheduler: Arc<SchedulerService>, count: Arc<AtomicUsize>, i: u32) {
            count.fetch_add(1, AtomicOrdering::SeqCst);
            if i + 1 < 20 {
                let scheduler2 = scheduler.clone();
                let count2 = count.clone();
                scheduler.schedule_at_time(0, Box::new(move || emit(scheduler2.clone(), count2.clone(), i + 1)));
            }
        }
        scheduler2.schedule_at_time(0, Box::new(move || emit(scheduler2.clone(), count2.clone(), 0)));

        for _ in 0..20 {
            scheduler.poll_due();
        }
        assert_eq!(count.load(AtomicOrdering::SeqCst), 20);
    }
}
