//! Round-trip-time smoothing.

use std::time::Duration;

/// Below this the estimate counts as unset.
const UNSET_EPSILON: f32 = 1e-5;

/// Exponential moving average over round-trip-time samples.
///
/// The first sample is taken verbatim; later samples move the estimate
/// by the smoothing factor toward the new measurement.
#[derive(Debug, Clone)]
pub struct LatencyEstimator {
    lag_seconds: f32,
    smoothing: f32,
}

impl LatencyEstimator {
    /// Creates an unset estimator with the given smoothing factor (0..1).
    pub fn new(smoothing: f32) -> Self {
        Self { lag_seconds: 0.0, smoothing }
    }

    /// Feeds one round-trip sample into the average.
    pub fn record(&mut self, rtt: Duration) {
        let sample = rtt.as_secs_f32();
        if self.lag_seconds.abs() < UNSET_EPSILON {
            self.lag_seconds = sample;
        } else {
            self.lag_seconds += self.smoothing * (sample - self.lag_seconds);
        }
    }

    /// The smoothed round trip, or `None` before the first sample.
    pub fn latency(&self) -> Option<Duration> {
        if self.lag_seconds.abs() < UNSET_EPSILON {
            None
        } else {
            Some(Duration::from_secs_f32(self.lag_seconds))
        }
    }
}

impl Default for LatencyEstimator {
    fn default() -> Self {
        Self::new(0.2)
    }
}
