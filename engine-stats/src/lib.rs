//! Tick statistics for the engine.
//!
//! [`Stats`] is a [`Component`]: hand a clone to the engine options and read
//! the achieved tick rate from the original while the engine runs.
//!
//! ```no_run
//! use engine_core::{Engine, EngineOptions};
//! use engine_stats::Stats;
//!
//! let stats = Stats::new();
//! let engine = Engine::new(EngineOptions::new().with_component(Box::new(stats.clone())));
//! engine.start().unwrap();
//! // ... later ...
//! println!("{:.2} ticks/s", stats.per_second());
//! ```

mod ticks;
mod welford;

pub use ticks::Ticks;
pub use welford::WelfordMean;

use std::sync::Arc;

use parking_lot::Mutex;

use engine_core::events::{PostTickEvent, POST_TICK_TOPIC};
use engine_core::Component;
use event_bus::{Event, Stamp, Subscriber};

/// Measures the engine's achieved tick rate by listening on the post-tick
/// topic. Cloning shares the underlying tracker.
#[derive(Clone)]
pub struct Stats {
    ticks: Arc<Mutex<Ticks>>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            ticks: Arc::new(Mutex::new(Ticks::new())),
        }
    }

    /// Mean ticks per second over the current window.
    pub fn per_second(&self) -> f64 {
        self.ticks.lock().per_second()
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Stats {
    fn bootstrap(&self) -> anyhow::Result<Vec<Arc<dyn Subscriber>>> {
        Ok(vec![Arc::new(PostTickProbe {
            stamp: Stamp::default(),
            ticks: Arc::clone(&self.ticks),
        })])
    }
}

struct PostTickProbe {
    stamp: Stamp,
    ticks: Arc<Mutex<Ticks>>,
}

impl Subscriber for PostTickProbe {
    fn stamp(&self) -> &Stamp {
        &self.stamp
    }

    fn topic(&self) -> &str {
        POST_TICK_TOPIC
    }

    fn handle(&self, event: &dyn Event) -> anyhow::Result<()> {
        if let Some(post_tick) = event.as_any().downcast_ref::<PostTickEvent>() {
            self.ticks.lock().record(post_tick.tick());
        }
        Ok(())
    }
}
