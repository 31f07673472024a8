//! Media source capability and read-only state queries
//!
//! The controller never owns the media source. It reads the playback cursor,
//! duration, buffered ranges and quality signals through [`MediaSource`], and
//! only mutates position, playback rate and pause state.

use crate::{types::*, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

/// Host-owned media element or player instance
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Current playback position in seconds
    async fn position(&self) -> Result<f64>;

    /// Move the playback cursor
    async fn set_position(&self, position: f64) -> Result<()>;

    /// Asset duration in seconds (may be NaN or infinite while unknown)
    async fn duration(&self) -> Result<f64>;

    /// Disjoint buffered intervals, ordered by start time
    async fn buffered_ranges(&self) -> Result<Vec<TimeRange>>;

    async fn playback_rate(&self) -> Result<f64>;

    async fn set_playback_rate(&self, rate: f64) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn is_paused(&self) -> Result<bool>;

    /// Quality label exposed by the player itself
    async fn playback_quality(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Quality label shown by the active entry of a quality selector
    async fn selected_quality(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Vertical resolution of the decoded video
    async fn video_height(&self) -> Result<Option<u32>> {
        Ok(None)
    }

    /// Host-side classification of the asset as short-form
    async fn short_form_hint(&self) -> Option<bool> {
        None
    }

    /// Raised whenever the rendered resolution changes
    fn resize_notifier(&self) -> Option<Arc<Notify>> {
        None
    }

    /// False once the host has torn the source down
    fn is_attached(&self) -> bool {
        true
    }
}

/// Furthest end across all buffered ranges, or 0 if none
pub fn furthest_end(ranges: &[TimeRange]) -> f64 {
    ranges.iter().map(|r| r.end).fold(0.0, f64::max)
}

/// True if one range spans from at or before `position` to within `epsilon` of `duration`
pub fn covers_to_end(ranges: &[TimeRange], position: f64, duration: f64, epsilon: f64) -> bool {
    duration.is_finite()
        && ranges
            .iter()
            .any(|r| r.start <= position && r.end >= duration - epsilon)
}

/// Read-only queries against a media source.
///
/// Every read fault is swallowed and reported as "no information".
#[derive(Debug, Clone, Copy)]
pub struct MediaStateReader {
    epsilon: f64,
}

impl MediaStateReader {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Finite, positive duration or `None`
    pub async fn duration(&self, source: &dyn MediaSource) -> Option<f64> {
        match source.duration().await {
            Ok(d) if d.is_finite() && d > 0.0 => Some(d),
            Ok(_) => None,
            Err(e) => {
                trace!(error = %e, "Duration unavailable");
                None
            }
        }
    }

    pub async fn furthest_buffered_end(&self, source: &dyn MediaSource) -> f64 {
        match source.buffered_ranges().await {
            Ok(ranges) => furthest_end(&ranges),
            Err(e) => {
                trace!(error = %e, "Buffered ranges unavailable");
                0.0
            }
        }
    }

    pub async fn is_fully_buffered(&self, source: &dyn MediaSource) -> bool {
        let Some(duration) = self.duration(source).await else {
            return false;
        };
        let Ok(position) = source.position().await else {
            return false;
        };
        match source.buffered_ranges().await {
            Ok(ranges) => covers_to_end(&ranges, position, duration, self.epsilon),
            Err(_) => false,
        }
    }

    /// Nothing left to force: fully buffered from the cursor, or the
    /// furthest buffered end is within epsilon of the duration.
    ///
    /// The second arm holds for fragmented buffers whose tail range reaches
    /// the end without covering the cursor.
    pub async fn is_complete(&self, source: &dyn MediaSource) -> bool {
        let Some(duration) = self.duration(source).await else {
            return false;
        };
        if self.is_fully_buffered(source).await {
            return true;
        }
        duration - self.furthest_buffered_end(source).await <= self.epsilon
    }

    /// Best-effort quality label: player accessor, then selector UI, then resolution bucket
    pub async fn quality(&self, source: &dyn MediaSource) -> Option<String> {
        if let Ok(Some(label)) = source.playback_quality().await {
            if !label.is_empty() {
                return Some(label);
            }
        }
        if let Ok(Some(label)) = source.selected_quality().await {
            if !label.is_empty() {
                return Some(label);
            }
        }
        match source.video_height().await {
            Ok(Some(height)) if height > 0 => Some(quality_for_height(height)),
            _ => None,
        }
    }

    /// Short-form if the host says so, else by duration threshold
    pub async fn is_short_form(
        &self,
        source: &dyn MediaSource,
        duration: f64,
        threshold: f64,
    ) -> bool {
        match source.short_form_hint().await {
            Some(hint) => hint,
            None => duration < threshold,
        }
    }
}
