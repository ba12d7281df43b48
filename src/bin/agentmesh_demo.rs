//! Boots a tiny in-memory source → processor → sink pipeline so the crate
//! can be exercised from the command line.

use std::time::Duration;

use clap::Parser;

use agentmesh::core::wait::IdleStrategy;
use agentmesh::lifecycle::LifecycleHooks;
use agentmesh::processor::EventProcessor;
use agentmesh::server::Server;
use agentmesh::sinks::CollectingSink;
use agentmesh::sources::MemorySource;
use agentmesh::subscription::SubscriptionKey;

#[derive(Parser)]
struct Args {
    /// Number of demo events to publish.
    #[arg(long, default_value_t = 5)]
    count: usize,
}

struct PrintingProcessor {
    label: String,
}

impl LifecycleHooks for PrintingProcessor {
    fn init(&mut self) {
        log::info!("processor '{}' initialized", self.label);
    }
}

impl EventProcessor<String> for PrintingProcessor {
    fn name(&self) -> &str {
        &self.label
    }

    fn on_event(&mut self, event: &String) {
        println!("[{}] {event}", self.label);
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let server: Server<String> = Server::new();

    let source = MemorySource::<String>::new();
    let publisher = server.register_event_source(
        "demo-feed",
        Box::new(source),
        "source-agent",
        IdleStrategy::Yielding,
        None,
    );

    server.add_event_processor(
        "demo-group",
        "printer",
        IdleStrategy::Yielding,
        Box::new(PrintingProcessor {
            label: "printer".to_string(),
        }),
        vec![SubscriptionKey::on_event("demo-feed")],
    );

    server.register_sink(
        "demo-sink",
        Box::new(CollectingSink::<String>::new()),
        "sink-agent",
        IdleStrategy::Yielding,
        None,
        vec![SubscriptionKey::on_event("demo-feed")],
    );

    server.boot_server(None).expect("server failed to boot");

    for i in 0..args.count {
        publisher.publish(format!("demo event {i}"));
    }

    std::thread::sleep(Duration::from_millis(200));
    server.stop().expect("server failed to stop cleanly");
}
