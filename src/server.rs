//! `Server` (§4.7): the orchestrator. Registers sources, sinks, services,
//! and processors; performs dependency injection; owns every agent; and
//! enforces the init → start → startComplete → stop → tearDown ordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::agent::processor_agent::{ProcessorAgent, ProcessorHandle};
use crate::agent::runtime::{Agent, AgentThread};
use crate::agent::sink_agent::SinkAgent;
use crate::core::queue::QueueConsumer;
use crate::core::wait::IdleStrategy;
use crate::error::Result;
use crate::event::Dispatched;
use crate::flow::FlowManager;
use crate::lifecycle::LifecycleHooks;
use crate::processor::EventProcessor;
use crate::report::{ErrorReporter, Listener, Severity};
use crate::service::{Injectable, Service, ServiceRegistry};
use crate::sink::EventSink;
use crate::source::SourceObject;
use crate::subscription::SubscriptionKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ServerState {
    Created = 0,
    Started = 1,
    StartCompleted = 2,
    Stopped = 3,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ServerState::Created,
            1 => ServerState::Started,
            2 => ServerState::StartCompleted,
            _ => ServerState::Stopped,
        }
    }
}

struct SourceEntry<T> {
    source: Arc<Mutex<Box<dyn SourceObject<T>>>>,
    agent_name: Arc<str>,
    idle_strategy: IdleStrategy,
    core_id: Option<usize>,
    is_worker: bool,
}

struct ProcessorGroupEntry<T> {
    agent: Option<ProcessorAgent<T>>,
    handle: ProcessorHandle<T>,
    idle_strategy: IdleStrategy,
    core_id: Option<usize>,
}

/// One instance per embedded server. Generic over a single event type `T`
/// shared by every source, processor, and sink it wires together; separate
/// event-type universes run as separate `Server` instances (see DESIGN.md
/// for the rationale — the same monomorphic-group decision as
/// `ProcessorAgent`, applied one level up).
pub struct Server<T> {
    flow: Arc<FlowManager<T>>,
    reporter: Arc<ErrorReporter>,
    registry: Arc<ServiceRegistry>,
    services: Mutex<Vec<(String, Arc<dyn Service>)>>,
    sources: Mutex<Vec<(String, SourceEntry<T>)>>,
    processor_groups: Mutex<HashMap<String, ProcessorGroupEntry<T>>>,
    sinks: Mutex<Vec<(String, SinkAgent<T>, IdleStrategy, Option<usize>)>>,
    agent_threads: Mutex<Vec<AgentThread>>,
    state: AtomicU8,
}

/// Drives a single worker source on its own agent thread, serializing
/// `do_work` against the orchestrator's own lifecycle calls on the same
/// source through the shared `Mutex` (§4.6; see DESIGN.md on why this
/// coarse lock is acceptable off a genuinely hot path).
struct SourceWorkerAgent<T> {
    name: Arc<str>,
    source: Arc<Mutex<Box<dyn SourceObject<T>>>>,
}

impl<T: Send + 'static> Agent for SourceWorkerAgent<T> {
    fn do_work(&mut self) -> usize {
        let mut guard = self.source.lock().unwrap();
        match guard.as_worker() {
            Some(worker) => worker.do_work(),
            None => 0,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Clone + Send + 'static> Default for Server<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Server<T> {
    pub fn new() -> Self {
        let reporter = Arc::new(ErrorReporter::default());
        Server {
            flow: Arc::new(FlowManager::new(Some(reporter.clone()))),
            reporter,
            registry: Arc::new(ServiceRegistry::new()),
            services: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
            processor_groups: Mutex::new(HashMap::new()),
            sinks: Mutex::new(Vec::new()),
            agent_threads: Mutex::new(Vec::new()),
            state: AtomicU8::new(ServerState::Created as u8),
        }
    }

    pub fn error_reporter(&self) -> Arc<ErrorReporter> {
        self.reporter.clone()
    }

    fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Registers `service` and immediately resolves its declared
    /// dependencies via `Injectable::wire` (§4.7, §9). Because wiring runs
    /// synchronously against the registry built up so far, a service can
    /// only resolve services registered *before* it — an explicit,
    /// documented simplification of the original reflection-scan-then-wire
    /// two-pass model (see DESIGN.md).
    pub fn register_service<S>(&self, name: impl Into<String>, mut service: S) -> Result<()>
    where
        S: Service + Injectable,
    {
        service.wire(&self.registry)?;
        let name = name.into();
        let arc = Arc::new(service);
        self.registry.register(name.clone(), arc.clone());
        self.services.lock().unwrap().push((name, arc));
        Ok(())
    }

    /// Registers a source and wires it to a freshly created (or existing,
    /// if `name` repeats) publisher. Worker sources (those returning
    /// `Some` from `SourceObject::as_worker`) are hosted on their own
    /// agent at `start()`; push sources are driven externally and never
    /// get an agent thread.
    pub fn register_event_source(
        &self,
        name: impl Into<String>,
        mut source: Box<dyn SourceObject<T>>,
        agent_name: impl Into<Arc<str>>,
        idle_strategy: IdleStrategy,
        core_id: Option<usize>,
    ) -> Arc<crate::publisher::QueuePublisher<T>> {
        let name = name.into();
        let publisher = self.flow.register_event_source(name.clone());
        source.set_publisher(publisher.clone());
        let is_worker = source.as_worker().is_some();

        self.sources.lock().unwrap().push((
            name,
            SourceEntry {
                source: Arc::new(Mutex::new(source)),
                agent_name: agent_name.into(),
                idle_strategy,
                core_id,
                is_worker,
            },
        ));
        publisher
    }

    /// Returns (creating the group's agent on first use) a handle to
    /// enqueue processor/subscription commands against `group`.
    fn group_handle(&self, group: &str, idle_strategy: IdleStrategy, core_id: Option<usize>) -> ProcessorHandle<T> {
        let mut groups = self.processor_groups.lock().unwrap();
        groups
            .entry(group.to_string())
            .or_insert_with(|| {
                let (agent, handle) = ProcessorAgent::new(group.to_string(), 256, Some(self.reporter.clone()));
                ProcessorGroupEntry {
                    agent: Some(agent),
                    handle,
                    idle_strategy,
                    core_id,
                }
            })
            .handle
            .clone()
    }

    /// Adds `processor` to `group` (creating the group's agent on first
    /// use) and subscribes it to every key in `subscriptions`. Safe to call
    /// both before `start()` (boot-time registration) and after (dynamic
    /// add-while-running, §4.5).
    pub fn add_event_processor(
        &self,
        group: &str,
        name: impl Into<String>,
        idle_strategy: IdleStrategy,
        processor: Box<dyn EventProcessor<T>>,
        subscriptions: Vec<SubscriptionKey>,
    ) {
        let handle = self.group_handle(group, idle_strategy, None);
        let name = name.into();
        handle.add_processor(name.clone(), processor);
        for key in subscriptions {
            self.subscribe_key(&handle, group, name.clone(), key);
        }
    }

    pub fn subscribe_processor(&self, group: &str, processor: impl Into<String>, key: SubscriptionKey) {
        let handle = self.group_handle(group, IdleStrategy::default(), None);
        self.subscribe_key(&handle, group, processor.into(), key);
    }

    /// Attaches `processor` to `key` within `group`, sharing the group's
    /// existing queue for `key` if one has already been mapped rather than
    /// creating a second one (§4.4: processors in the same group
    /// subscribed to the same key share one queue). Covers both a fresh
    /// subscription and re-subscribing a processor previously removed via
    /// `stop_processor` — the queue mapping, once created, lives for the
    /// life of the group.
    fn subscribe_key(&self, handle: &ProcessorHandle<T>, group: &str, processor: String, key: SubscriptionKey) {
        if self.flow.is_mapped(&key, group) {
            handle.add_subscriber(processor, key);
        } else {
            let consumer = self.flow.mapping_agent(&key, group.to_string());
            handle.subscribe(processor, key, consumer);
        }
    }

    pub fn stop_processor(&self, group: &str, name: impl Into<String>) {
        if let Some(entry) = self.processor_groups.lock().unwrap().get(group) {
            entry.handle.remove_processor(name);
        }
    }

    /// Registers a sink on its own agent, subscribing it to `keys`.
    pub fn register_sink(
        &self,
        name: impl Into<String>,
        sink: Box<dyn EventSink<T>>,
        agent_name: impl Into<Arc<str>>,
        idle_strategy: IdleStrategy,
        core_id: Option<usize>,
        keys: Vec<SubscriptionKey>,
    ) {
        let agent_name = agent_name.into();
        let mut sink_agent = SinkAgent::new(agent_name.clone(), sink);
        for key in keys {
            let consumer: QueueConsumer<Dispatched<T>> = self.flow.mapping_agent(&key, agent_name.clone());
            sink_agent.add_queue(consumer);
        }
        self.sinks
            .lock()
            .unwrap()
            .push((name.into(), sink_agent, idle_strategy, core_id));
    }

    /// Attaches a listener to the error reporter — typically used to wire
    /// up a `bootServer`-style log listener.
    pub fn add_log_listener(&self, listener: Listener) {
        self.reporter.add_listener(listener);
    }

    /// Deterministic init order: services, then sources. Processors are
    /// brought to life through their own `AddProcessor` command handling
    /// (§4.5), not a separate `init()` pass — see DESIGN.md.
    pub fn init(&self) -> Result<()> {
        for (_, service) in self.services.lock().unwrap().iter() {
            service.init();
        }
        for (_, entry) in self.sources.lock().unwrap().iter() {
            entry.source.lock().unwrap().init();
        }
        Ok(())
    }

    /// Spawns every agent thread, then brings services and sources through
    /// `start()`/`startComplete()` in registration order, then broadcasts
    /// `startComplete` to every processor group.
    pub fn start(&self) -> Result<()> {
        {
            let mut groups = self.processor_groups.lock().unwrap();
            let mut threads = self.agent_threads.lock().unwrap();
            for (name, entry) in groups.iter_mut() {
                if let Some(agent) = entry.agent.take() {
                    threads.push(AgentThread::spawn(agent, entry.idle_strategy.clone(), entry.core_id));
                    log::info!("agentmesh: processor group '{name}' agent started");
                }
            }
        }
        {
            let sources = self.sources.lock().unwrap();
            let mut threads = self.agent_threads.lock().unwrap();
            for (name, entry) in sources.iter() {
                if entry.is_worker {
                    let agent = SourceWorkerAgent {
                        name: entry.agent_name.clone(),
                        source: entry.source.clone(),
                    };
                    threads.push(AgentThread::spawn(agent, entry.idle_strategy.clone(), entry.core_id));
                    log::info!("agentmesh: source '{name}' worker agent started");
                }
            }
        }
        {
            let mut sinks = self.sinks.lock().unwrap();
            let mut threads = self.agent_threads.lock().unwrap();
            for (name, _, _, _) in sinks.iter() {
                log::info!("agentmesh: sink '{name}' agent starting");
            }
            for (_, agent, idle_strategy, core_id) in sinks.drain(..) {
                threads.push(AgentThread::spawn(agent, idle_strategy, core_id));
            }
        }

        for (_, service) in self.services.lock().unwrap().iter() {
            service.start();
        }
        for (_, entry) in self.sources.lock().unwrap().iter() {
            entry.source.lock().unwrap().start();
        }
        self.state.store(ServerState::Started as u8, Ordering::SeqCst);

        for (_, service) in self.services.lock().unwrap().iter() {
            service.start_complete();
        }
        for (_, entry) in self.sources.lock().unwrap().iter() {
            entry.source.lock().unwrap().start_complete();
        }
        for entry in self.processor_groups.lock().unwrap().values() {
            entry.handle.mark_server_start_complete();
            entry.handle.broadcast_start_complete();
        }
        self.state.store(ServerState::StartCompleted as u8, Ordering::SeqCst);
        Ok(())
    }

    pub fn start_service(&self, name: &str) {
        if let Some((_, service)) = self.services.lock().unwrap().iter().find(|(n, _)| n == name) {
            service.start();
        } else {
            self.reporter.report(
                Severity::Error,
                "server",
                format!("start_service: no such service '{name}'"),
            );
        }
    }

    pub fn stop_service(&self, name: &str) {
        if let Some((_, service)) = self.services.lock().unwrap().iter().find(|(n, _)| n == name) {
            service.stop();
        } else {
            self.reporter.report(
                Severity::Error,
                "server",
                format!("stop_service: no such service '{name}'"),
            );
        }
    }

    /// Stops sources and services directly, then stops every agent thread
    /// (whose `on_close` hook tears down the processors/sinks it hosts —
    /// §4.6 shutdown).
    pub fn stop(&self) -> Result<()> {
        for (_, entry) in self.sources.lock().unwrap().iter() {
            let mut source = entry.source.lock().unwrap();
            source.stop();
            source.tear_down();
        }
        for (_, service) in self.services.lock().unwrap().iter() {
            service.stop();
            service.tear_down();
        }
        let threads: Vec<AgentThread> = self.agent_threads.lock().unwrap().drain(..).collect();
        for thread in threads {
            thread.stop();
        }
        self.state.store(ServerState::Stopped as u8, Ordering::SeqCst);
        Ok(())
    }

    /// Convenience: attaches an optional log listener, then runs `init()`
    /// and `start()`. `ServerConfig`'s values are consumed by whichever
    /// loader calls the typed registration methods above — `Server` itself
    /// has no generic way to instantiate trait objects from plain data
    /// (object instantiation from config is external, per the
    /// specification's configuration-builder non-goal).
    pub fn boot_server(&self, log_listener: Option<Listener>) -> Result<()> {
        if let Some(listener) = log_listener {
            self.reporter.add_listener(listener);
        }
        self.init()?;
        self.start()
    }

    pub fn registered_services(&self) -> Vec<String> {
        self.services.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn registered_processors(&self) -> Vec<String> {
        self.processor_groups.lock().unwrap().keys().cloned().collect()
    }

    pub fn services_registered(&self) -> bool {
        !self.services.lock().unwrap().is_empty()
    }

    pub fn flow_manager(&self) -> Arc<FlowManager<T>> {
        self.flow.clone()
    }
}
