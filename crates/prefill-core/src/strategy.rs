//! Success/failure feedback controller for seek aggressiveness

use crate::types::StrategyMode;
use tracing::debug;

/// Failure run that switches to aggressive mode
pub const AGGRESSIVE_THRESHOLD: u32 = 5;
/// Failure run that escalates to the maximum multiplier
pub const ESCALATION_THRESHOLD: u32 = 10;

const AGGRESSIVE_MULTIPLIER: f64 = 1.5;
const ESCALATED_MULTIPLIER: f64 = 2.0;
const DECAY_PER_SUCCESS: f64 = 0.1;
const FLOOR_TOLERANCE: f64 = 1e-9;

/// Escalates the step multiplier on failure runs and decays it on success.
///
/// Invariant: `mode == Normal` exactly when `multiplier == 1.0`.
#[derive(Debug, Clone)]
pub struct StrategyAdapter {
    mode: StrategyMode,
    multiplier: f64,
    consecutive_failures: u32,
}

impl StrategyAdapter {
    pub fn new() -> Self {
        Self {
            mode: StrategyMode::Normal,
            multiplier: 1.0,
            consecutive_failures: 0,
        }
    }

    /// Feed the outcome of one attempt
    pub fn record(&mut self, made_progress: bool) {
        if made_progress {
            self.on_success();
        } else {
            self.on_failure();
        }
    }

    fn on_success(&mut self) {
        self.consecutive_failures = 0;
        if self.mode != StrategyMode::Aggressive {
            return;
        }

        let next = self.multiplier - DECAY_PER_SUCCESS;
        if next <= 1.0 + FLOOR_TOLERANCE {
            self.mode = StrategyMode::Normal;
            self.multiplier = 1.0;
            debug!("Strategy back to normal");
        } else {
            // Round to the decay granularity so repeated steps do not drift
            self.multiplier = (next * 10.0).round() / 10.0;
        }
    }

    fn on_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures >= ESCALATION_THRESHOLD {
            if self.multiplier < ESCALATED_MULTIPLIER {
                debug!(failures = self.consecutive_failures, "Strategy escalated");
            }
            self.mode = StrategyMode::Aggressive;
            self.multiplier = ESCALATED_MULTIPLIER;
        } else if self.consecutive_failures >= AGGRESSIVE_THRESHOLD {
            if self.mode == StrategyMode::Normal {
                debug!(failures = self.consecutive_failures, "Strategy aggressive");
            }
            self.mode = StrategyMode::Aggressive;
            self.multiplier = AGGRESSIVE_MULTIPLIER;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn mode(&self) -> StrategyMode {
        self.mode
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

impl Default for StrategyAdapter {
    fn default() -> Self {
        Self::new()
    }
}
