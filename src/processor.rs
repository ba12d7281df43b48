//! The processor interface (§6, §GLOSSARY): business logic hosted in a
//! group, receiving events via subscription.
//!
//! A processor agent (`crate::agent::ProcessorAgent`) is generic over a
//! single event type `T` — all processors hosted in one group, and all
//! queues they drain, carry the same event type. Heterogeneous event
//! types are handled by running separate groups/agents, each specialized
//! to its own `T`; see DESIGN.md for the open-question rationale.

use crate::lifecycle::LifecycleHooks;
use crate::subscription::SubscriptionKey;

pub trait EventProcessor<T>: LifecycleHooks + Send {
    fn name(&self) -> &str;

    /// Dispatched once per event matching one of this processor's
    /// subscriptions (§4.5 "Dispatch").
    fn on_event(&mut self, event: &T);

    /// Called when a processor subscribes itself to a feed rather than
    /// being wired externally (§6 "`addEventFeed` for processors that
    /// subscribe themselves"). Default no-op: most processors are wired
    /// declaratively via `Server::add_event_processor` plus an explicit
    /// `ProcessorAgentHandle::subscribe` call instead.
    fn add_event_feed(&mut self, _feed: SubscriptionKey) {}
}
