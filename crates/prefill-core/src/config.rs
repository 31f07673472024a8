//! Controller configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Static configuration supplied when a controller is constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForcerConfig {
    /// Period of the control loop tick (milliseconds)
    pub tick_interval_ms: u64,
    /// Assets at or below this duration are short-form (seconds)
    pub short_form_threshold_seconds: f64,
    /// Lower bound for a forward seek step (seconds)
    pub min_step_seconds: f64,
    /// Upper bound for a forward seek step (seconds)
    pub max_step_seconds: f64,
    /// Fixed step used for short-form assets (seconds)
    pub short_form_step_seconds: f64,
    /// Attempt budget per session
    pub max_attempts: u32,
    /// Extra settle delay per consecutive failure (milliseconds)
    pub retry_delay_increment_ms: u64,
    /// Number of rate samples averaged by the throughput estimator
    pub throughput_sample_window: usize,
    /// Pause between stop and restart after a quality change (milliseconds)
    pub quality_change_settle_ms: u64,
    /// Base wait between a seek and the progress measurement (milliseconds)
    pub settle_delay_ms: u64,
    /// Extra pause inserted every fifth attempt while failures persist (milliseconds)
    pub recovery_delay_ms: u64,
    /// Consecutive source faults that end a session
    pub fault_ceiling: u32,
    /// Buffered-extent growth that counts as progress (seconds)
    pub progress_threshold_seconds: f64,
    /// Distance from the end at which the asset counts as fully buffered (seconds)
    pub completion_epsilon_seconds: f64,
}

impl Default for ForcerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            short_form_threshold_seconds: 60.0,
            min_step_seconds: 5.0,
            max_step_seconds: 60.0,
            short_form_step_seconds: 5.0,
            max_attempts: 500,
            retry_delay_increment_ms: 50,
            throughput_sample_window: 5,
            quality_change_settle_ms: 500,
            settle_delay_ms: 150,
            recovery_delay_ms: 500,
            fault_ceiling: 10,
            progress_threshold_seconds: 1.0,
            completion_epsilon_seconds: 0.5,
        }
    }
}

impl ForcerConfig {
    /// Parse a (possibly partial) JSON document over the defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ForcerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check that the values describe a runnable control loop
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(Error::InvalidConfig("tick_interval_ms must be > 0".into()));
        }
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig("max_attempts must be > 0".into()));
        }
        if self.throughput_sample_window == 0 {
            return Err(Error::InvalidConfig(
                "throughput_sample_window must be > 0".into(),
            ));
        }
        if self.fault_ceiling == 0 {
            return Err(Error::InvalidConfig("fault_ceiling must be > 0".into()));
        }
        if !(self.min_step_seconds > 0.0) || !self.max_step_seconds.is_finite() {
            return Err(Error::InvalidConfig(
                "step bounds must be positive and finite".into(),
            ));
        }
        if self.min_step_seconds > self.max_step_seconds {
            return Err(Error::InvalidConfig(format!(
                "min_step_seconds ({}) exceeds max_step_seconds ({})",
                self.min_step_seconds, self.max_step_seconds
            )));
        }
        if !(self.min_step_seconds..=self.max_step_seconds).contains(&self.short_form_step_seconds) {
            return Err(Error::InvalidConfig(format!(
                "short_form_step_seconds ({}) outside [{}, {}]",
                self.short_form_step_seconds, self.min_step_seconds, self.max_step_seconds
            )));
        }
        if self.completion_epsilon_seconds < 0.0 || self.progress_threshold_seconds < 0.0 {
            return Err(Error::InvalidConfig("thresholds must not be negative".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn quality_change_settle(&self) -> Duration {
        Duration::from_millis(self.quality_change_settle_ms)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }

    /// Settle delay after a seek, inflated by the current failure run
    pub fn settle_delay(&self, consecutive_failures: u32) -> Duration {
        let extra = self
            .retry_delay_increment_ms
            .saturating_mul(consecutive_failures as u64);
        Duration::from_millis(self.settle_delay_ms.saturating_add(extra))
    }
}
