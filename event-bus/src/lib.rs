//! Tick-synchronized, priority-ordered event bus for decoupling components.
//!
//! Producers post events tagged by topic; each call to [`Bus::tick`] promotes
//! everything staged since the previous tick into one batch and routes it, in
//! priority order, to the subscribers of each event's topic. Handlers run
//! concurrently on a bounded worker pool and a post made from inside a
//! handler always lands in the next batch.

pub mod bus;
pub mod event;
pub mod pool;
pub mod pqueue;
pub mod priority;
mod registry;
pub mod subscriber;

pub use bus::{Bus, BusOptions, ErrorBuilder};
pub use event::{Envelope, Event};
pub use pool::WorkerPool;
pub use pqueue::PairingHeap;
pub use subscriber::{Stamp, Subscriber};
