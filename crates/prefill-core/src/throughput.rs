//! Buffering throughput estimation
//!
//! Rates are expressed in media-seconds buffered per wall-clock second.
//! Only growth of the buffered extent produces a sample, so stalls never
//! drag the average toward zero.

use std::collections::VecDeque;
use tokio::time::Instant;
use tracing::trace;

/// A measured buffering rate
#[derive(Debug, Clone, Copy)]
pub struct ThroughputSample {
    /// Media-seconds per second
    pub rate: f64,
    pub timestamp: Instant,
}

/// Rolling average over the last N buffering rates
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    samples: VecDeque<ThroughputSample>,
    capacity: usize,
    /// Extent/time pair the next delta is measured from
    baseline: Option<(f64, Instant)>,
}

impl ThroughputEstimator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            baseline: None,
        }
    }

    /// Feed the current buffered extent observed at `now`
    pub fn update(&mut self, extent: f64, now: Instant) {
        let Some((last_extent, last_time)) = self.baseline else {
            self.baseline = Some((extent, now));
            return;
        };

        let elapsed = now.saturating_duration_since(last_time).as_secs_f64();
        if elapsed <= 0.0 || extent <= last_extent {
            return;
        }

        let rate = (extent - last_extent) / elapsed;
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(ThroughputSample { rate, timestamp: now });
        self.baseline = Some((extent, now));

        trace!(rate, average = self.average_rate(), "Throughput sample");
    }

    /// Arithmetic mean of the window, or 0 when empty
    pub fn average_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.rate).sum::<f64>() / self.samples.len() as f64
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.baseline = None;
    }
}
