use std::time::{Duration, Instant};

use crate::welford::WelfordMean;

/// Rolling tick-rate tracker fed with the clock beat of each finished tick.
///
/// Gaps between consecutive beats feed a Welford mean that resets once per
/// second, so the readout follows the engine's current rate rather than the
/// lifetime average.
#[derive(Debug)]
pub struct Ticks {
    gaps: WelfordMean,
    last_tick: Option<Instant>,
    last_gap: Duration,
    last_reset: Instant,
}

impl Ticks {
    pub fn new() -> Self {
        Self {
            gaps: WelfordMean::default(),
            last_tick: None,
            last_gap: Duration::ZERO,
            last_reset: Instant::now(),
        }
    }

    pub fn record(&mut self, tick: Instant) {
        if let Some(last) = self.last_tick {
            self.last_gap = tick.saturating_duration_since(last);
        }
        self.last_tick = Some(tick);

        if tick.saturating_duration_since(self.last_reset) > Duration::from_secs(1) {
            self.gaps.reset();
            self.last_reset = tick;
        }

        if self.last_gap > Duration::ZERO {
            self.gaps.record(self.last_gap.as_secs_f64());
        }
    }

    /// Mean ticks per second over the current window; zero until two beats
    /// have been recorded.
    pub fn per_second(&self) -> f64 {
        let mean = self.gaps.mean();
        if mean > 0.0 {
            1.0 / mean
        } else {
            0.0
        }
    }

    /// Gap between the two most recent beats.
    pub fn last_gap(&self) -> Duration {
        self.last_gap
    }
}

impl Default for Ticks {
    fn default() -> Self {
        Self::new()
    }
}
