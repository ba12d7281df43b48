//! Event source capability traits and lifecycle state machine (§3, §6, §9).
//!
//! A source is "anything providing `{subscribe, unSubscribe, setPublisher}`
//! plus optional `{start, startComplete, stop, tearDown, doWork}`" (§9
//! design note: capability-set interfaces over class hierarchies). Worker
//! sources implement `do_work`; push-style sources only need the mandatory
//! methods and are driven externally (e.g. a network callback calling
//! `publish` directly).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::lifecycle::LifecycleHooks;
use crate::publisher::QueuePublisher;
use crate::subscription::SubscriptionKey;

/// CREATED → STARTED → START_COMPLETED → STOPPED → TORN_DOWN (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SourceState {
    Created = 0,
    Started = 1,
    StartCompleted = 2,
    Stopped = 3,
    TornDown = 4,
}

impl SourceState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SourceState::Created,
            1 => SourceState::Started,
            2 => SourceState::StartCompleted,
            3 => SourceState::Stopped,
            _ => SourceState::TornDown,
        }
    }
}

/// Atomic cursor over `SourceState`, shared between the orchestrator
/// thread (which drives transitions) and the source's own agent thread
/// (which reads it to decide cache-vs-dispatch, §3).
#[derive(Default)]
pub struct SourceLifecycle {
    state: AtomicU8,
}

impl SourceLifecycle {
    pub fn new() -> Self {
        SourceLifecycle {
            state: AtomicU8::new(SourceState::Created as u8),
        }
    }

    pub fn get(&self) -> SourceState {
        SourceState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: SourceState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Mandatory capabilities every event source must provide. `LifecycleHooks`
/// is a supertrait with no-op defaults, so implementers only override the
/// phases they care about (§9: "optional lifecycle methods").
pub trait EventSource<T>: LifecycleHooks + Send {
    /// Activates publishing for `key` (broadcast sources may ignore the
    /// key and always publish; keyed sources use it to gate output).
    fn subscribe(&mut self, key: &SubscriptionKey);

    /// Deactivates publishing for `key`.
    fn unsubscribe(&mut self, key: &SubscriptionKey);

    /// Wires the publisher the orchestrator created for this source.
    fn set_publisher(&mut self, publisher: Arc<QueuePublisher<T>>);
}

/// Worker sources (ones that generate events on their own schedule, e.g.
/// polling a file or a socket) implement `do_work` and are driven from a
/// dedicated agent's `doWork` loop, just like processor agents (§4.6).
pub trait WorkerSource {
    /// Does one unit of work, returning the number of events produced
    /// (fed to the hosting agent's idle strategy).
    fn do_work(&mut self) -> usize;
}

/// The trait object type the orchestrator stores for a registered source:
/// every source provides the mandatory capabilities plus its lifecycle
/// hooks; a worker source additionally exposes itself through
/// `as_worker` so the orchestrator can host it on an agent (§4.6 "each
/// source worker may be placed on its own agent"). Externally-pushed
/// sources (e.g. `MemorySource`) leave the default `None` and are driven
/// by whatever external caller invokes their `offer`/push method.
pub trait SourceObject<T>: EventSource<T> + LifecycleHooks + Send {
    fn as_worker(&mut self) -> Option<&mut dyn WorkerSource> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_starts_created() {
        let lifecycle = SourceLifecycle::new();
        assert_eq!(lifecycle.get(), SourceState::Created);
        lifecycle.set(SourceState::Started);
        assert_eq!(lifecycle.get(), SourceState::Started);
    }
}
