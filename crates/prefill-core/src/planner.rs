//! Forward-seek step planning
//!
//! Step = duration band base × throughput factor × strategy multiplier,
//! then clamped to the configured bounds. The clamp is applied last so no
//! combination of factors can stall the loop or overshoot.

use crate::config::ForcerConfig;

/// Computes the seek distance for the next attempt
#[derive(Debug, Clone, Copy)]
pub struct StepPlanner {
    min_step: f64,
    max_step: f64,
    short_form_step: f64,
}

impl StepPlanner {
    pub fn new(config: &ForcerConfig) -> Self {
        Self {
            min_step: config.min_step_seconds,
            max_step: config.max_step_seconds,
            short_form_step: config.short_form_step_seconds,
        }
    }

    /// Base step for a duration band, in seconds
    pub fn base_step(duration: f64) -> f64 {
        match duration {
            d if d < 60.0 => 5.0,
            d if d < 300.0 => 10.0,
            d if d < 900.0 => 20.0,
            d if d < 1800.0 => 30.0,
            _ => 45.0,
        }
    }

    /// Scale factor for the measured throughput.
    ///
    /// A rate of zero means no samples yet and leaves the step untouched.
    pub fn throughput_factor(rate: f64) -> f64 {
        if !(rate > 0.0) {
            return 1.0;
        }
        match rate {
            r if r > 5.0 => 1.5,
            r if r > 2.0 => 1.2,
            r if r < 0.5 => 0.6,
            r if r < 1.0 => 0.8,
            _ => 1.0,
        }
    }

    /// Step size in seconds, always within `[min_step, max_step]`
    pub fn step(&self, duration: f64, short_form: bool, throughput: f64, multiplier: f64) -> f64 {
        if short_form {
            return self.short_form_step.clamp(self.min_step, self.max_step);
        }

        let step = Self::base_step(duration) * Self::throughput_factor(throughput) * multiplier;
        if step.is_nan() {
            return self.min_step;
        }
        step.clamp(self.min_step, self.max_step)
    }
}

impl Default for StepPlanner {
    fn default() -> Self {
        Self::new(&ForcerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medium_asset_without_samples() {
        let planner = StepPlanner::default();
        assert_eq!(planner.step(200.0, false, 0.0, 1.0), 10.0);
    }

    #[test]
    fn test_long_asset_fast_and_aggressive_is_capped() {
        let planner = StepPlanner::default();
        // 45 × 1.5 × 2.0 = 135
        assert_eq!(planner.step(2000.0, false, 6.0, 2.0), 60.0);
    }

    #[test]
    fn test_short_form_uses_fixed_step() {
        let planner = StepPlanner::default();
        assert_eq!(planner.step(2000.0, true, 6.0, 2.0), 5.0);
    }

    #[test]
    fn test_short_form_step_is_clamped() {
        // Planner built from an unvalidated config
        let config = ForcerConfig {
            short_form_step_seconds: 2.0,
            ..Default::default()
        };
        let planner = StepPlanner::new(&config);
        assert_eq!(planner.step(30.0, true, 0.0, 1.0), 5.0);
    }

    #[test]
    fn test_slow_connection_floors_at_min() {
        let planner = StepPlanner::default();
        // 5 × 0.6 = 3 → clamped up
        assert_eq!(planner.step(30.0, false, 0.2, 1.0), 5.0);
        // 30 × 0.8 = 24
        assert!((planner.step(1000.0, false, 0.7, 1.0) - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_bands() {
        assert_eq!(StepPlanner::base_step(59.9), 5.0);
        assert_eq!(StepPlanner::base_step(60.0), 10.0);
        assert_eq!(StepPlanner::base_step(899.0), 20.0);
        assert_eq!(StepPlanner::base_step(1799.0), 30.0);
        assert_eq!(StepPlanner::base_step(1800.0), 45.0);
    }

    #[test]
    fn test_step_always_within_bounds() {
        let planner = StepPlanner::default();
        let durations = [1.0, 45.0, 120.0, 600.0, 1200.0, 7200.0, f64::MAX];
        let rates = [0.0, 0.1, 0.6, 1.5, 3.0, 50.0, f64::INFINITY];
        let multipliers = [1.0, 1.5, 2.0, 100.0];

        for &d in &durations {
            for &r in &rates {
                for &m in &multipliers {
                    let step = planner.step(d, false, r, m);
                    assert!((5.0..=60.0).contains(&step), "d={d} r={r} m={m} step={step}");
                }
            }
        }
    }
}
