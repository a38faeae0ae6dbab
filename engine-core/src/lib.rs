//! Engine lifecycle on top of the event bus: a fixed-rate clock drives one
//! bus tick per beat, components contribute subscribers at startup, and the
//! lifecycle itself (start, pre-tick, post-tick, stop, error) is published as
//! ordinary events on reserved topics.

pub mod component;
pub mod config;
pub mod engine;
pub mod events;

pub use component::Component;
pub use config::EngineOptions;
pub use engine::{Engine, EngineError};
