//! agentmesh — an embeddable, in-process event-processing server.
//!
//! Wires event sources, processors, and sinks onto dedicated worker
//! threads ("agents"), routes typed events between them through bounded
//! single-producer/single-consumer queues, and coordinates their shared
//! lifecycle: init → start → startComplete → stop → tearDown.
//!
//! The core is the event-dispatch and agent-runtime subsystem: the queue
//! fabric (`core::queue`) connecting sources to processors, the
//! subscription model (`subscription`), the per-source fan-out publisher
//! (`publisher`), the agent scheduler (`agent::runtime`), and the
//! orchestrator (`server`) that ties everything together.

pub mod admin;
pub mod agent;
pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod flow;
pub mod lifecycle;
pub mod pool;
pub mod processor;
pub mod publisher;
pub mod report;
pub mod scheduler;
pub mod server;
pub mod service;
pub mod sink;
pub mod sinks;
pub mod source;
pub mod sources;
pub mod subscription;

pub use error::{Error, Result};
pub use event::{Dispatched, EventWrapStrategy, FeedEvent};
pub use flow::FlowManager;
pub use lifecycle::LifecycleHooks;
pub use processor::EventProcessor;
pub use publisher::{QueuePublisher, SlowConsumerStrategy};
pub use server::Server;
pub use sink::EventSink;
pub use source::{EventSource, SourceState, WorkerSource};
pub use subscription::{CallbackType, SourceKey, SubscriptionKey};
