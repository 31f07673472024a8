//! Core types for Prefill

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a source binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A buffered time interval reported by the media source, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Classify a vertical resolution into a named quality bucket.
///
/// Heights below the smallest bucket keep their raw value.
pub fn quality_for_height(height: u32) -> String {
    let name = match height {
        h if h >= 2160 => "4K",
        h if h >= 1440 => "1440p",
        h if h >= 1080 => "1080p",
        h if h >= 720 => "720p",
        h if h >= 480 => "480p",
        h if h >= 360 => "360p",
        h if h >= 240 => "240p",
        h => return format!("{}p", h),
    };
    name.to_string()
}

/// Controller state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerStatus {
    /// Not forcing; the player follows its own buffering policy
    Idle,
    /// Seek-and-restore cycles are running
    Buffering,
}

impl std::fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerStatus::Idle => write!(f, "idle"),
            ControllerStatus::Buffering => write!(f, "buffering"),
        }
    }
}

/// Aggressiveness mode of the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    Normal,
    Aggressive,
}

impl std::fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyMode::Normal => write!(f, "normal"),
            StrategyMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// Why a forcing session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The whole asset is cached
    FullyBuffered,
    /// The attempt budget ran out
    AttemptsExhausted,
    /// Consecutive source faults hit the ceiling
    PersistentFault,
    /// Stopped to restart after a quality change
    QualityRestart,
    /// The source was unbound
    Unbound,
}

impl StopReason {
    /// True if this reason latches the controller until the next trigger
    pub fn halts(&self) -> bool {
        matches!(self, StopReason::AttemptsExhausted | StopReason::PersistentFault)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::FullyBuffered => write!(f, "fully_buffered"),
            StopReason::AttemptsExhausted => write!(f, "attempts_exhausted"),
            StopReason::PersistentFault => write!(f, "persistent_fault"),
            StopReason::QualityRestart => write!(f, "quality_restart"),
            StopReason::Unbound => write!(f, "unbound"),
        }
    }
}

/// Playback properties captured at session start and restored at stop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub position: f64,
    pub playback_rate: f64,
    pub paused: bool,
}

/// Point-in-time view of a controller, for hosts and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSnapshot {
    pub status: ControllerStatus,
    pub strategy: StrategyMode,
    pub step_multiplier: f64,
    pub consecutive_failures: u32,
    pub attempts: u32,
    pub speed: f64,
    pub quality: Option<String>,
    pub halted: Option<StopReason>,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_buckets() {
        assert_eq!(quality_for_height(2160), "4K");
        assert_eq!(quality_for_height(1600), "1440p");
        assert_eq!(quality_for_height(1080), "1080p");
        assert_eq!(quality_for_height(719), "480p");
        assert_eq!(quality_for_height(240), "240p");
        assert_eq!(quality_for_height(144), "144p");
    }

    #[test]
    fn test_time_range() {
        assert!(!TimeRange::new(10.0, 25.0).is_empty());
        assert!(TimeRange::new(5.0, 5.0).is_empty());
    }

    #[test]
    fn test_stop_reason_halts() {
        assert!(StopReason::AttemptsExhausted.halts());
        assert!(StopReason::PersistentFault.halts());
        assert!(!StopReason::FullyBuffered.halts());
        assert!(!StopReason::QualityRestart.halts());
    }
}
