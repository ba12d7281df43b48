//! Low-level primitives: the queue fabric, idle strategies, clock sources,
//! and CPU pinning that the rest of the crate is built on.

pub mod affinity;
pub mod clock;
pub mod queue;
pub mod wait;

pub use clock::{Clock, QuantaClock, SystemClock};
pub use queue::{bounded, QueueConsumer, QueueProducer, DEFAULT_CAPACITY};
pub use wait::{IdleStrategy, Idler};
