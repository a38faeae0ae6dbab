/// Welford's online algorithm: a running mean and variance over a stream of
/// samples, without keeping the samples.
#[derive(Debug, Default, Clone)]
pub struct WelfordMean {
    mean: f64,
    variance_sum: f64,
    count: u64,
}

impl WelfordMean {
    pub fn record(&mut self, sample: f64) {
        self.count += 1;
        if self.count > 1 {
            let delta = sample - self.mean;
            self.mean += delta / self.count as f64;
            self.variance_sum += delta * (sample - self.mean);
        } else {
            self.mean = sample;
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance; zero until at least two samples arrive.
    pub fn variance(&self) -> f64 {
        if self.count > 1 {
            self.variance_sum / (self.count - 1) as f64
        } else {
            0.0
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
