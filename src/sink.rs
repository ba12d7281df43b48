//! The sink interface (§6): the system boundary consumer, invoked on its
//! own agent.

use crate::lifecycle::LifecycleHooks;

pub trait EventSink<T>: LifecycleHooks + Send {
    fn accept(&mut self, event: T);
}
