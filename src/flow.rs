//! `FlowManager` (§4.3): registry of sources and subscription keys;
//! creates queues on demand; binds subscribers to sources.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::queue::{self, QueueConsumer, DEFAULT_CAPACITY};
use crate::event::Dispatched;
use crate::publisher::QueuePublisher;
use crate::report::ErrorReporter;
use crate::subscription::{SourceKey, SubscriptionKey};

/// A (source, subscriptionKey, consumerAgent) triple maps to exactly one
/// queue for the life of the server (§4.3 rule 1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueueId {
    key: SubscriptionKey,
    consumer_agent: Arc<str>,
}

struct SourceEntry<T> {
    publisher: Arc<QueuePublisher<T>>,
}

/// Registry of sources and the queues fanning out of them. Safe for
/// concurrent registration while agents are running: all state lives
/// behind short-critical-section locks that are never held across a queue
/// operation (§4.3 rule 3).
pub struct FlowManager<T> {
    sources: Mutex<HashMap<SourceKey, SourceEntry<T>>>,
    queues: Mutex<HashMap<QueueId, ()>>,
    capacity: usize,
    reporter: Option<Arc<ErrorReporter>>,
}

impl<T: Clone + Send + 'static> FlowManager<T> {
    pub fn new(reporter: Option<Arc<ErrorReporter>>) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, reporter)
    }

    pub fn with_capacity(capacity: usize, reporter: Option<Arc<ErrorReporter>>) -> Self {
        FlowManager {
            sources: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            capacity,
            reporter,
        }
    }

    /// Idempotent by name: registering the same source name twice is a
    /// no-op for the second call (§4.3).
    pub fn register_event_source(&self, name: impl Into<Arc<str>>) -> Arc<QueuePublisher<T>> {
        let name: Arc<str> = name.into();
        let mut sources = self.sources.lock().unwrap();
        if let Some(entry) = sources.get(&SourceKey(name.clone())) {
            return entry.publisher.clone();
        }
        let publisher = Arc::new(QueuePublisher::new(name.clone(), self.reporter.clone()));
        sources.insert(
            SourceKey(name),
            SourceEntry {
                publisher: publisher.clone(),
            },
        );
        publisher
    }

    pub fn publisher_for(&self, source: &SourceKey) -> Option<Arc<QueuePublisher<T>>> {
        self.sources.lock().unwrap().get(source).map(|e| e.publisher.clone())
    }

    /// True once `(key, consumer_agent)` already owns a queue — i.e. a
    /// prior `mapping_agent` call for this exact pair has already created
    /// and wired it. Callers that want to attach an *additional*
    /// subscriber to a key a group already consumes (§4.4: "two
    /// processors in the same group subscribed to the same key share one
    /// queue") must check this first and skip straight to registering the
    /// subscriber against the existing queue instead of calling
    /// `mapping_agent` again.
    pub fn is_mapped(&self, key: &SubscriptionKey, consumer_agent: impl Into<Arc<str>>) -> bool {
        let id = QueueId {
            key: key.clone(),
            consumer_agent: consumer_agent.into(),
        };
        self.queues.lock().unwrap().contains_key(&id)
    }

    /// Creates the target queue's consumer end for `(key, consumer_agent)`
    /// and wires the producer end into the source's publisher (§4.3 rule
    /// 1). Must only be called once per `(key, consumer_agent)` pair —
    /// callers check `is_mapped` first and, when it's already mapped,
    /// attach the new subscriber to the existing queue instead of calling
    /// this again (the single-consumer invariant means the consumer end
    /// can't be handed out twice).
    pub fn mapping_agent(
        &self,
        key: &SubscriptionKey,
        consumer_agent: impl Into<Arc<str>>,
    ) -> QueueConsumer<Dispatched<T>> {
        let consumer_agent: Arc<str> = consumer_agent.into();
        let id = QueueId {
            key: key.clone(),
            consumer_agent: consumer_agent.clone(),
        };

        let publisher = self.publisher_for(&key.source);

        let mut queues = self.queues.lock().unwrap();
        if queues.contains_key(&id) {
            panic!(
                "agentmesh: queue for {key} already mapped to consumer agent '{consumer_agent}'; \
                 callers must check FlowManager::is_mapped before calling mapping_agent again"
            );
        }
        let (producer, consumer) = queue::bounded(self.capacity);
        queues.insert(id, ());
        drop(queues);

        if let Some(publisher) = publisher {
            publisher.add_target_queue(consumer_agent, producer);
        }

        consumer
    }

    /// Forwards to the source's `subscribe`, letting the source decide
    /// whether to activate publishing (§4.3).
    pub fn subscribe<S: crate::source::EventSource<T> + ?Sized>(
        &self,
        source: &mut S,
        key: &SubscriptionKey,
    ) {
        source.subscribe(key);
    }

    pub fn unsubscribe<S: crate::source::EventSource<T> + ?Sized>(
        &self,
        source: &mut S,
        key: &SubscriptionKey,
    ) {
        source.unsubscribe(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_mapped_is_false_until_mapping_agent_creates_the_queue() {
        let flow: FlowManager<i32> = FlowManager::new(None);
        flow.register_event_source("feed");
        let key = SubscriptionKey::on_event("feed");

        assert!(!flow.is_mapped(&key, "group-1"));
        flow.mapping_agent(&key, "group-1");
        assert!(flow.is_mapped(&key, "group-1"));
    }

    #[test]
    fn is_mapped_is_scoped_per_consumer_agent() {
        let flow: FlowManager<i32> = FlowManager::new(None);
        flow.register_event_source("feed");
        let key = SubscriptionKey::on_event("feed");

        flow.mapping_agent(&key, "group-1");
        assert!(flow.is_mapped(&key, "group-1"));
        assert!(
            !flow.is_mapped(&key, "group-2"),
            "a queue mapped for one consumer agent must not show as mapped for another"
        );
    }

    #[test]
    #[should_panic(expected = "already mapped")]
    fn mapping_agent_panics_if_called_twice_for_the_same_pair_without_checking_is_mapped() {
        let flow: FlowManager<i32> = FlowManager::new(None);
        flow.register_event_source("feed");
        let key = SubscriptionKey::on_event("feed");

        flow.mapping_agent(&key, "group-1");
        flow.mapping_agent(&key, "group-1");
    }
}
