//! `QueuePublisher` (§4.2): per-source fan-out to N target queues, with
//! optional wrap-as-named-event, value mapping, slow-consumer policy, and
//! cache-before-publish.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::clock::{Clock, SystemClock};
use crate::core::queue::QueueProducer;
use crate::event::{Dispatched, EventWrapStrategy, FeedEvent};
use crate::report::{ErrorReporter, Severity};

/// Policy applied when a target queue is full (§GLOSSARY, §4.2 step 5).
#[derive(Debug, Clone)]
pub enum SlowConsumerStrategy {
    /// Retry in a bounded spin; after `max_spins` failed attempts, falls
    /// back to reporting an error and dropping the event for that target.
    Backoff { max_spins: u32 },
    /// Discard the event for this target only; increments its drop counter
    /// and reports `Error`.
    Drop,
    /// Detach the target permanently and report `Error`. Further events
    /// are silently skipped for this target.
    Disconnect,
    /// Raise fatal: panics the calling (agent) thread after reporting
    /// `Critical`. Reserved for sources that must never silently lose
    /// data.
    Exit,
}

impl Default for SlowConsumerStrategy {
    fn default() -> Self {
        SlowConsumerStrategy::Backoff { max_spins: 1000 }
    }
}

/// Maps an event to a possibly-different value before dispatch, or filters
/// it out entirely by returning `None`.
pub type DataMapper<T> = Box<dyn Fn(T) -> Option<T> + Send>;

struct Target<T> {
    consumer_name: Arc<str>,
    producer: QueueProducer<Dispatched<T>>,
    connected: AtomicBool,
}

struct CacheState<T> {
    /// All events accepted by `cache()`/`publish()` while caching applies,
    /// in insertion order. Doubles as the replay log (§4.2: "the log is
    /// the single source of truth for replay").
    log: Vec<T>,
    /// Number of `log` entries already dispatched to target queues.
    flushed: usize,
    started_complete: bool,
}

/// Per-source fan-out publisher. One instance is wired into each
/// registered source via `EventSource::set_publisher` (renamed from
/// `setEventToQueuePublisher`).
pub struct QueuePublisher<T> {
    feed_name: Arc<str>,
    targets: Mutex<Vec<Target<T>>>,
    cache_event_log: AtomicBool,
    wrap_strategy: Mutex<EventWrapStrategy>,
    slow_consumer: Mutex<SlowConsumerStrategy>,
    mapper: Mutex<Option<DataMapper<T>>>,
    sequence: AtomicU64,
    data_version: u32,
    clock: Arc<dyn Clock>,
    cache: Mutex<CacheState<T>>,
    reporter: Option<Arc<ErrorReporter>>,
}

impl<T: Clone + Send + 'static> QueuePublisher<T> {
    pub fn new(feed_name: impl Into<Arc<str>>, reporter: Option<Arc<ErrorReporter>>) -> Self {
        QueuePublisher {
            feed_name: feed_name.into(),
            targets: Mutex::new(Vec::new()),
            cache_event_log: AtomicBool::new(false),
            wrap_strategy: Mutex::new(EventWrapStrategy::Raw),
            slow_consumer: Mutex::new(SlowConsumerStrategy::default()),
            mapper: Mutex::new(None),
            sequence: AtomicU64::new(0),
            data_version: 1,
            clock: Arc::new(SystemClock),
            cache: Mutex::new(CacheState {
                log: Vec::new(),
                flushed: 0,
                started_complete: false,
            }),
            reporter,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn add_target_queue(
        &self,
        consumer_name: impl Into<Arc<str>>,
        producer: QueueProducer<Dispatched<T>>,
    ) {
        self.targets.lock().unwrap().push(Target {
            consumer_name: consumer_name.into(),
            producer,
            connected: AtomicBool::new(true),
        });
    }

    pub fn set_cache_event_log(&self, enabled: bool) {
        self.cache_event_log.store(enabled, Ordering::SeqCst);
    }

    pub fn set_event_wrap_strategy(&self, strategy: EventWrapStrategy) {
        *self.wrap_strategy.lock().unwrap() = strategy;
    }

    pub fn set_slow_consumer_strategy(&self, strategy: SlowConsumerStrategy) {
        *self.slow_consumer.lock().unwrap() = strategy;
    }

    pub fn set_data_mapper(&self, mapper: DataMapper<T>) {
        *self.mapper.lock().unwrap() = Some(mapper);
    }

    /// Returns a copy of the replay log (raw, pre-wrap events), in publish
    /// order: cached-pre-completion entries first, then post-completion
    /// entries (§8: the round-trip law this backs).
    pub fn event_log(&self) -> Vec<T> {
        self.cache.lock().unwrap().log.clone()
    }

    /// Appends to the log without dispatching (§4.2 cache/dispatch
    /// protocol).
    pub fn cache(&self, event: T) {
        self.cache.lock().unwrap().log.push(event);
    }

    /// Flushes any pending cached events to every target queue, in
    /// insertion order.
    pub fn dispatch_cached_event_log(&self) {
        let mut guard = self.cache.lock().unwrap();
        self.flush_locked(&mut guard);
    }

    /// Called by the orchestrator when the owning source reaches
    /// START_COMPLETED. Flushes the cache exactly once (§3 publisher
    /// cache invariant) and marks the publisher as no longer caching new
    /// events.
    pub fn mark_start_complete(&self) {
        let mut guard = self.cache.lock().unwrap();
        guard.started_complete = true;
        self.flush_locked(&mut guard);
    }

    fn flush_locked(&self, guard: &mut CacheState<T>) {
        while guard.flushed < guard.log.len() {
            let event = guard.log[guard.flushed].clone();
            self.dispatch_raw(event);
            guard.flushed += 1;
        }
    }

    /// Publishes a single event per §4.2's five/six-step algorithm.
    pub fn publish(&self, event: T) {
        let event = {
            let guard = self.mapper.lock().unwrap();
            match guard.as_ref() {
                Some(mapper) => match mapper(event) {
                    Some(mapped) => mapped,
                    None => return,
                },
                None => event,
            }
        };

        if self.cache_event_log.load(Ordering::SeqCst) {
            let mut guard = self.cache.lock().unwrap();
            if !guard.started_complete {
                guard.log.push(event);
                return;
            }
            self.flush_locked(&mut guard);
            guard.log.push(event.clone());
            guard.flushed += 1;
            drop(guard);
            self.dispatch_raw(event);
        } else {
            self.dispatch_raw(event);
        }
    }

    fn dispatch_raw(&self, event: T) {
        let wrapped = match *self.wrap_strategy.lock().unwrap() {
            EventWrapStrategy::Raw => Dispatched::Raw(event),
            EventWrapStrategy::Named => {
                let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
                Dispatched::Named(FeedEvent {
                    feed_name: self.feed_name.clone(),
                    sequence,
                    data_version: self.data_version,
                    data: event,
                    event_time: self.clock.now(),
                })
            }
        };

        let targets = self.targets.lock().unwrap();
        for target in targets.iter() {
            if !target.connected.load(Ordering::SeqCst) {
                continue;
            }
            self.offer_with_policy(target, wrapped.clone());
        }
    }

    fn offer_with_policy(&self, target: &Target<T>, value: Dispatched<T>) {
        if target.producer.offer(value.clone()) {
            return;
        }
        let strategy = self.slow_consumer.lock().unwrap().clone();
        match strategy {
            SlowConsumerStrategy::Backoff { max_spins } => {
                let mut spins = 0;
                loop {
                    if target.producer.offer(value.clone()) {
                        return;
                    }
                    spins += 1;
                    if spins >= max_spins {
                        self.report(
                            Severity::Error,
                            format!(
                                "queue '{}' full after {} spins for consumer '{}', dropping event",
                                self.feed_name, max_spins, target.consumer_name
                            ),
                        );
                        target.producer.record_drop();
                        return;
                    }
                    std::hint::spin_loop();
                }
            }
            SlowConsumerStrategy::Drop => {
                target.producer.record_drop();
                self.report(
                    Severity::Error,
                    format!(
                        "queue '{}' full for consumer '{}', dropping event",
                        self.feed_name, target.consumer_name
                    ),
                );
            }
            SlowConsumerStrategy::Disconnect => {
                target.connected.store(false, Ordering::SeqCst);
                self.report(
                    Severity::Error,
                    format!(
                        "consumer '{}' detached from feed '{}' after queue full",
                        target.consumer_name, self.feed_name
                    ),
                );
            }
            SlowConsumerStrategy::Exit => {
                self.report(
                    Severity::Critical,
                    format!(
                        "fatal: queue '{}' full for consumer '{}' under EXIT policy",
                        self.feed_name, target.consumer_name
                    ),
                );
                panic!(
                    "agentmesh: fatal slow-consumer EXIT on feed '{}' for consumer '{}'",
                    self.feed_name, target.consumer_name
                );
            }
        }
    }

    fn report(&self, severity: Severity, message: String) {
        if let Some(reporter) = &self.reporter {
            reporter.report(severity, self.feed_name.to_string(), message);
        } else {
            log::error!("{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queue;

    fn publisher() -> QueuePublisher<&'static str> {
        QueuePublisher::new("feed", None)
    }

    #[test]
    fn broadcast_without_cache_delivers_immediately() {
        let pubr = publisher();
        let (producer, consumer) = queue::bounded(16);
        pubr.add_target_queue("p1", producer);

        pubr.publish("a");
        pubr.publish("b");
        pubr.publish("c");

        let mut out = Vec::new();
        consumer.drain_to(10, |d| out.push(d.into_inner()));
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn cached_events_flush_in_order_on_start_complete() {
        let pubr = publisher();
        let (producer, consumer) = queue::bounded(16);
        pubr.add_target_queue("p1", producer);
        pubr.set_cache_event_log(true);

        pubr.publish("x");
        pubr.publish("y");
        assert!(consumer.is_empty(), "nothing should dispatch before startComplete");

        pubr.mark_start_complete();
        pubr.publish("z");

        let mut out = Vec::new();
        consumer.drain_to(10, |d| out.push(d.into_inner()));
        assert_eq!(out, vec!["x", "y", "z"]);
        assert_eq!(pubr.event_log(), vec!["x", "y", "z"]);
    }

    #[test]
    fn null_mapper_result_drops_event_without_advancing_sequence() {
        let pubr: QueuePublisher<i32> = QueuePublisher::new("feed", None);
        let (producer, consumer) = queue::bounded(16);
        pubr.add_target_queue("p1", producer);
        pubr.set_event_wrap_strategy(EventWrapStrategy::Named);
        pubr.set_data_mapper(Box::new(|v: i32| if v < 0 { None } else { Some(v) }));

        pubr.publish(-1);
        pubr.publish(5);

        let mut out = Vec::new();
        consumer.drain_to(10, |d| out.push(d));
        assert_eq!(out.len(), 1);
        match &out[0] {
            Dispatched::Named(fe) => {
                assert_eq!(fe.sequence, 0, "dropped event must not advance sequence");
                assert_eq!(fe.data, 5);
            }
            Dispatched::Raw(_) => panic!("expected wrapped event"),
        }
    }

    #[test]
    fn drop_policy_increments_counter_and_leaves_head_untouched() {
        let pubr = publisher();
        let (producer, consumer) = queue::bounded(2);
        pubr.add_target_queue("p1", producer);
        pubr.set_slow_consumer_strategy(SlowConsumerStrategy::Drop);

        pubr.publish("a");
        pubr.publish("b");
        pubr.publish("c"); // queue full (cap 2), dropped

        let mut out = Vec::new();
        consumer.drain_to(10, |d| out.push(d.into_inner()));
        assert_eq!(out, vec!["a", "b"]);
    }
}
