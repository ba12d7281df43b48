//! `ProcessorAgent` (§4.5): a group of processors sharing one agent thread,
//! draining their subscribed queues and dispatching events in round-robin
//! order.
//!
//! Structural changes (adding/removing a processor, subscribing/
//! unsubscribing a queue) are not applied directly by the orchestrator
//! thread — they're pushed through a command queue and applied by the
//! agent itself at the top of its own `doWork` cycle, so a processor is
//! never mutated concurrently with its own `on_event` call.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::agent::runtime::Agent;
use crate::core::queue::{self, QueueConsumer, QueueProducer};
use crate::event::Dispatched;
use crate::processor::EventProcessor;
use crate::report::{ErrorReporter, Severity};
use crate::subscription::SubscriptionKey;

/// Maximum events drained from a single queue per `doWork` cycle, so one
/// hot queue can't starve the others hosted on the same agent (§4.5).
const MAX_BATCH_PER_QUEUE: usize = 64;

/// Maximum structural commands applied per cycle, ahead of the event drain.
const MAX_COMMANDS_PER_CYCLE: usize = 64;

pub enum ProcessorCommand<T> {
    AddProcessor {
        name: String,
        processor: Box<dyn EventProcessor<T>>,
    },
    RemoveProcessor {
        name: String,
    },
    Subscribe {
        processor: String,
        key: SubscriptionKey,
        consumer: QueueConsumer<Dispatched<T>>,
    },
    /// Attaches `processor` to a key the group already owns a queue for
    /// (§4.4: processors sharing a key share one queue), without handing
    /// over a new consumer — the queue's consumer end was already taken
    /// by whichever `Subscribe` created it.
    AddSubscriber {
        processor: String,
        key: SubscriptionKey,
    },
    Unsubscribe {
        processor: String,
        key: SubscriptionKey,
    },
    /// Broadcasts `startComplete()` to every processor currently hosted in
    /// the group. Sent once by the orchestrator when the whole server
    /// transitions to START_COMPLETED (§4.7); a processor added
    /// afterwards instead gets it applied inline by `AddProcessor` via
    /// `ProcessorHandle::mark_server_start_complete`.
    StartComplete,
}

/// The orchestrator-side handle for a running `ProcessorAgent`: sends
/// structural commands and tracks whether the server has already reached
/// START_COMPLETED, so a processor added late still gets the full
/// init/start/startComplete sequence (§4.7 "late join").
#[derive(Clone)]
pub struct ProcessorHandle<T> {
    commands: Arc<QueueProducer<ProcessorCommand<T>>>,
    server_start_completed: Arc<AtomicBool>,
}

impl<T: Send + 'static> ProcessorHandle<T> {
    pub fn add_processor(&self, name: impl Into<String>, processor: Box<dyn EventProcessor<T>>) {
        self.send(ProcessorCommand::AddProcessor {
            name: name.into(),
            processor,
        });
    }

    pub fn remove_processor(&self, name: impl Into<String>) {
        self.send(ProcessorCommand::RemoveProcessor { name: name.into() });
    }

    pub fn subscribe(
        &self,
        processor: impl Into<String>,
        key: SubscriptionKey,
        consumer: QueueConsumer<Dispatched<T>>,
    ) {
        self.send(ProcessorCommand::Subscribe {
            processor: processor.into(),
            key,
            consumer,
        });
    }

    /// Adds `processor` as an additional subscriber to `key`, assuming the
    /// group already owns a queue for it (caller must have checked
    /// `FlowManager::is_mapped` first).
    pub fn add_subscriber(&self, processor: impl Into<String>, key: SubscriptionKey) {
        self.send(ProcessorCommand::AddSubscriber {
            processor: processor.into(),
            key,
        });
    }

    pub fn unsubscribe(&self, processor: impl Into<String>, key: SubscriptionKey) {
        self.send(ProcessorCommand::Unsubscribe {
            processor: processor.into(),
            key,
        });
    }

    /// Called by the orchestrator once the whole server reaches
    /// START_COMPLETED, so processors added afterwards skip straight to the
    /// full lifecycle instead of waiting for a startComplete that will
    /// never come again.
    pub fn mark_server_start_complete(&self) {
        self.server_start_completed.store(true, Ordering::SeqCst);
    }

    pub fn broadcast_start_complete(&self) {
        self.send(ProcessorCommand::StartComplete);
    }

    fn send(&self, command: ProcessorCommand<T>) {
        if !self.commands.offer(command) {
            log::error!("agentmesh: processor agent command queue full, command dropped");
        }
    }
}

/// Hosts a set of processors that all consume the same event type `T`
/// (see the doc comment on `EventProcessor` for why groups are
/// monomorphic). Runs as the body of an `AgentThread`.
pub struct ProcessorAgent<T> {
    name: Arc<str>,
    processors: HashMap<String, Box<dyn EventProcessor<T>>>,
    subscriptions: HashMap<SubscriptionKey, Vec<String>>,
    queues: HashMap<SubscriptionKey, QueueConsumer<Dispatched<T>>>,
    commands: QueueConsumer<ProcessorCommand<T>>,
    server_start_completed: Arc<AtomicBool>,
    reporter: Option<Arc<ErrorReporter>>,
}

impl<T: Send + 'static> ProcessorAgent<T> {
    pub fn new(
        name: impl Into<Arc<str>>,
        command_capacity: usize,
        reporter: Option<Arc<ErrorReporter>>,
    ) -> (Self, ProcessorHandle<T>) {
        let (producer, consumer) = queue::bounded(command_capacity);
        let server_start_completed = Arc::new(AtomicBool::new(false));
        let agent = ProcessorAgent {
            name: name.into(),
            processors: HashMap::new(),
            subscriptions: HashMap::new(),
            queues: HashMap::new(),
            commands: consumer,
            server_start_completed: server_start_completed.clone(),
            reporter,
        };
        let handle = ProcessorHandle {
            commands: Arc::new(producer),
            server_start_completed,
        };
        (agent, handle)
    }

    fn apply_commands(&mut self) -> usize {
        let mut applied = 0;
        let server_complete = self.server_start_completed.load(Ordering::SeqCst);
        let mut pending = Vec::new();
        applied += self
            .commands
            .drain_to(MAX_COMMANDS_PER_CYCLE, |cmd| pending.push(cmd));

        for command in pending {
            match command {
                ProcessorCommand::AddProcessor { name, mut processor } => {
                    processor.init();
                    processor.start();
                    if server_complete {
                        processor.start_complete();
                    }
                    self.processors.insert(name, processor);
                }
                ProcessorCommand::RemoveProcessor { name } => {
                    if let Some(mut processor) = self.processors.remove(&name) {
                        processor.stop();
                        processor.tear_down();
                    }
                    for subscribers in self.subscriptions.values_mut() {
                        subscribers.retain(|n| n != &name);
                    }
                }
                ProcessorCommand::Subscribe { processor, key, consumer } => {
                    self.queues.entry(key.clone()).or_insert(consumer);
                    let subscribers = self.subscriptions.entry(key).or_default();
                    if !subscribers.contains(&processor) {
                        subscribers.push(processor);
                    }
                }
                ProcessorCommand::AddSubscriber { processor, key } => {
                    let subscribers = self.subscriptions.entry(key).or_default();
                    if !subscribers.contains(&processor) {
                        subscribers.push(processor);
                    }
                }
                ProcessorCommand::Unsubscribe { processor, key } => {
                    if let Some(subscribers) = self.subscriptions.get_mut(&key) {
                        subscribers.retain(|n| n != &processor);
                    }
                }
                ProcessorCommand::StartComplete => {
                    for processor in self.processors.values_mut() {
                        processor.start_complete();
                    }
                }
            }
        }
        applied
    }

    fn dispatch_queues(&mut self) -> usize {
        let mut total = 0;
        for (key, consumer) in self.queues.iter() {
            let subscribers = match self.subscriptions.get(key) {
                Some(s) if !s.is_empty() => s,
                _ => continue,
            };
            let mut drained = Vec::new();
            consumer.drain_to(MAX_BATCH_PER_QUEUE, |d| drained.push(d.into_inner()));
            total += drained.len();
            for event in drained {
                for name in subscribers {
                    if let Some(processor) = self.processors.get_mut(name) {
                        let result = catch_unwind(AssertUnwindSafe(|| processor.on_event(&event)));
                        if result.is_err() {
                            self.report(
                                Severity::Warning,
                                format!(
                                    "processor '{name}' panicked handling an event on agent '{}'",
                                    self.name
                                ),
                            );
                        }
                    }
                }
            }
        }
        total
    }

    fn report(&self, severity: Severity, message: String) {
        if let Some(reporter) = &self.reporter {
            reporter.report(severity, self.name.to_string(), message);
        } else {
            log::warn!("{message}");
        }
    }
}

impl<T: Send + 'static> Agent for ProcessorAgent<T> {
    fn do_work(&mut self) -> usize {
        let commands = self.apply_commands();
        let events = self.dispatch_queues();
        commands + events
    }

    fn on_close(&mut self) {
        for processor in self.processors.values_mut() {
            processor.stop();
            processor.tear_down();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queue;
    use crate::lifecycle::LifecycleHooks;
    use std::sync::Mutex;

    struct RecordingProcessor {
        events: Arc<Mutex<Vec<i32>>>,
    }

    impl LifecycleHooks for RecordingProcessor {}

    impl EventProcessor<i32> for RecordingProcessor {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_event(&mut self, event: &i32) {
            self.events.lock().unwrap().push(*event);
        }
    }

    #[test]
    fn dispatches_events_to_subscribed_processor() {
        let (mut agent, handle) = ProcessorAgent::<i32>::new("group-1", 16, None);
        let events = Arc::new(Mutex::new(Vec::new()));
        handle.add_processor(
            "recorder",
            Box::new(RecordingProcessor {
                events: events.clone(),
            }),
        );

        let (producer, consumer) = queue::bounded(16);
        let key = SubscriptionKey::on_event("feed");
        handle.subscribe("recorder", key, consumer);

        producer.offer(Dispatched::Raw(1));
        producer.offer(Dispatched::Raw(2));

        agent.do_work(); // applies AddProcessor + Subscribe
        agent.do_work(); // drains the two events

        assert_eq!(*events.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn remove_processor_tears_down_and_stops_dispatch() {
        let (mut agent, handle) = ProcessorAgent::<i32>::new("group-1", 16, None);
        let events = Arc::new(Mutex::new(Vec::new()));
        handle.add_processor(
            "recorder",
            Box::new(RecordingProcessor {
                events: events.clone(),
            }),
        );
        let (producer, consumer) = queue::bounded(16);
        let key = SubscriptionKey::on_event("feed");
        handle.subscribe("recorder", key, consumer);
        agent.do_work();

        handle.remove_processor("recorder");
        agent.do_work();

        producer.offer(Dispatched::Raw(99));
        agent.do_work();

        assert!(events.lock().unwrap().is_empty());
    }

    struct NamedRecordingProcessor {
        name: &'static str,
        events: Arc<Mutex<Vec<i32>>>,
    }

    impl LifecycleHooks for NamedRecordingProcessor {}

    impl EventProcessor<i32> for NamedRecordingProcessor {
        fn name(&self) -> &str {
            self.name
        }

        fn on_event(&mut self, event: &i32) {
            self.events.lock().unwrap().push(*event);
        }
    }

    #[test]
    fn add_subscriber_attaches_a_second_processor_to_an_already_mapped_queue() {
        let (mut agent, handle) = ProcessorAgent::<i32>::new("group-1", 16, None);
        let events_a = Arc::new(Mutex::new(Vec::new()));
        let events_b = Arc::new(Mutex::new(Vec::new()));
        handle.add_processor(
            "a",
            Box::new(NamedRecordingProcessor {
                name: "a",
                events: events_a.clone(),
            }),
        );
        handle.add_processor(
            "b",
            Box::new(NamedRecordingProcessor {
                name: "b",
                events: events_b.clone(),
            }),
        );

        let (producer, consumer) = queue::bounded(16);
        let key = SubscriptionKey::on_event("feed");
        // "a" creates the queue via Subscribe; "b" attaches to the same
        // queue via AddSubscriber, carrying no consumer of its own.
        handle.subscribe("a", key.clone(), consumer);
        handle.add_subscriber("b", key);
        agent.do_work(); // applies AddProcessor x2 + Subscribe + AddSubscriber

        producer.offer(Dispatched::Raw(1));
        producer.offer(Dispatched::Raw(2));
        agent.do_work();

        assert_eq!(*events_a.lock().unwrap(), vec![1, 2]);
        assert_eq!(*events_b.lock().unwrap(), vec![1, 2]);
    }
}
