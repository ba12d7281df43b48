//! A sink that just collects everything it receives — useful for tests and
//! the demo binary; real sinks write to a socket, a file, a metrics
//! exporter, etc.

use std::sync::{Arc, Mutex};

use crate::lifecycle::LifecycleHooks;
use crate::sink::EventSink;

#[derive(Clone, Default)]
pub struct CollectingSink<T> {
    received: Arc<Mutex<Vec<T>>>,
}

impl<T: Send> CollectingSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.received.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> LifecycleHooks for CollectingSink<T> {}

impl<T: Send> EventSink<T> for CollectingSink<T> {
    fn accept(&mut self, event: T) {
        self.received.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_appends_in_order() {
        let mut sink = CollectingSink::new();
        sink.accept(1);
        sink.accept(2);
        sink.accept(3);
        assert_eq!(sink.received(), vec![1, 2, 3]);
    }
}
