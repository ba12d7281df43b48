//! Agent runtime and the processor agent that hosts business logic (§4.5,
//! §4.6).

pub mod processor_agent;
pub mod runtime;
pub mod sink_agent;

pub use processor_agent::{ProcessorAgent, ProcessorCommand, ProcessorHandle};
pub use runtime::{Agent, AgentThread};
pub use sink_agent::SinkAgent;
