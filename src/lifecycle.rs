//! The shared lifecycle every participant (source, sink, processor,
//! service) implements: init → start → startComplete → stop → tearDown
//! (§3, §4.7). Each phase has a no-op default so implementers only
//! override what matters to them.

pub trait LifecycleHooks {
    fn init(&mut self) {}
    fn start(&mut self) {}
    fn start_complete(&mut self) {}
    fn stop(&mut self) {}
    fn tear_down(&mut self) {}
}
