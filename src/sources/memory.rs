//! An externally-pushed in-memory source (§8 scenario #5): no `doWork` of
//! its own — callers push events directly via `offer`, which is what
//! exercises the publisher's cache/replay protocol end to end.

use std::sync::Arc;

use crate::lifecycle::LifecycleHooks;
use crate::publisher::QueuePublisher;
use crate::source::{EventSource, SourceLifecycle, SourceObject, SourceState};
use crate::subscription::SubscriptionKey;

pub struct MemorySource<T> {
    publisher: Option<Arc<QueuePublisher<T>>>,
    lifecycle: SourceLifecycle,
}

impl<T> Default for MemorySource<T> {
    fn default() -> Self {
        MemorySource {
            publisher: None,
            lifecycle: SourceLifecycle::new(),
        }
    }
}

impl<T: Clone + Send + 'static> MemorySource<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `event` through the wired publisher, applying whatever
    /// cache/dispatch behavior the publisher is currently configured for
    /// (§4.2). A no-op before `set_publisher` has been called.
    pub fn offer(&self, event: T) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(event);
        }
    }

    pub fn state(&self) -> SourceState {
        self.lifecycle.get()
    }
}

impl<T: Clone + Send + 'static> LifecycleHooks for MemorySource<T> {
    fn start(&mut self) {
        self.lifecycle.set(SourceState::Started);
    }

    /// Flushes the publisher's cache exactly once, in insertion order,
    /// before any post-completion `offer` is delivered (§4.2).
    fn start_complete(&mut self) {
        self.lifecycle.set(SourceState::StartCompleted);
        if let Some(publisher) = &self.publisher {
            publisher.mark_start_complete();
        }
    }

    fn stop(&mut self) {
        self.lifecycle.set(SourceState::Stopped);
    }

    fn tear_down(&mut self) {
        self.lifecycle.set(SourceState::TornDown);
    }
}

impl<T: Clone + Send + 'static> EventSource<T> for MemorySource<T> {
    fn subscribe(&mut self, _key: &SubscriptionKey) {}
    fn unsubscribe(&mut self, _key: &SubscriptionKey) {}

    fn set_publisher(&mut self, publisher: Arc<QueuePublisher<T>>) {
        self.publisher = Some(publisher);
    }
}

impl<T: Clone + Send + 'static> SourceObject<T> for MemorySource<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queue;
    use crate::event::Dispatched;

    #[test]
    fn cache_then_start_complete_replays_in_order_then_live_events_follow() {
        let publisher = Arc::new(QueuePublisher::new("mem-feed", None));
        let (producer, consumer) = queue::bounded(16);
        publisher.add_target_queue("consumer", producer);
        publisher.set_cache_event_log(true);

        let mut source = MemorySource::new();
        source.set_publisher(publisher.clone());
        source.start();

        source.offer("item 1".to_string());
        source.offer("item 2".to_string());
        assert!(consumer.is_empty(), "nothing should dispatch before startComplete");

        source.start_complete();
        let mut first_cycle = Vec::new();
        consumer.drain_to(10, |d| first_cycle.push(d.into_inner()));
        assert_eq!(first_cycle, vec!["item 1", "item 2"]);

        source.offer("item 3".to_string());
        source.offer("item 4".to_string());
        let mut second_cycle = Vec::new();
        consumer.drain_to(10, |d| second_cycle.push(d.into_inner()));
        assert_eq!(second_cycle, vec!["item 3", "item 4"]);

        assert_eq!(
            publisher.event_log(),
            vec!["item 1", "item 2", "item 3", "item 4"]
        );
    }

    #[test]
    fn offer_before_publisher_wired_is_a_no_op() {
        let source: MemorySource<i32> = MemorySource::new();
        source.offer(1); // must not panic
    }
}
