//! Hosts a single sink on its own agent, draining whatever queues it has
//! been wired to and calling `accept` for each event (§6 "invoked on the
//! sink's agent").

use std::sync::Arc;

use crate::agent::runtime::Agent;
use crate::core::queue::QueueConsumer;
use crate::event::Dispatched;
use crate::lifecycle::LifecycleHooks;
use crate::sink::EventSink;

const MAX_BATCH_PER_QUEUE: usize = 64;

pub struct SinkAgent<T> {
    name: Arc<str>,
    sink: Box<dyn EventSink<T>>,
    queues: Vec<QueueConsumer<Dispatched<T>>>,
}

impl<T: Send + 'static> SinkAgent<T> {
    pub fn new(name: impl Into<Arc<str>>, sink: Box<dyn EventSink<T>>) -> Self {
        SinkAgent {
            name: name.into(),
            sink,
            queues: Vec::new(),
        }
    }

    pub fn add_queue(&mut self, consumer: QueueConsumer<Dispatched<T>>) {
        self.queues.push(consumer);
    }
}

impl<T: Send + 'static> Agent for SinkAgent<T> {
    fn do_work(&mut self) -> usize {
        let mut total = 0;
        for queue in &self.queues {
            let mut batch = Vec::new();
            queue.drain_to(MAX_BATCH_PER_QUEUE, |d| batch.push(d.into_inner()));
            total += batch.len();
            for event in batch {
                self.sink.accept(event);
            }
        }
        total
    }

    fn on_close(&mut self) {
        self.sink.stop();
        self.sink.tear_down();
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queue;
    use crate::sinks::memory::CollectingSink;

    #[test]
    fn drains_queue_into_sink_in_order() {
        let collecting = CollectingSink::new();
        let mut agent = SinkAgent::new("sink-agent", Box::new(collecting.clone()));
        let (producer, consumer) = queue::bounded(16);
        agent.add_queue(consumer);

        producer.offer(Dispatched::Raw(1));
        producer.offer(Dispatched::Raw(2));
        agent.do_work();

        assert_eq!(collecting.received(), vec![1, 2]);
    }
}
