//! Simulated media source
//!
//! Models a conservative player cache: the buffered extent grows
//! contiguously from the start of the asset at `fetch_rate` media-seconds
//! per wall-clock second, but only up to a fetch horizon of `lookahead`
//! seconds past the furthest cursor position the player was asked for.
//! Time is read from `tokio::time::Instant`, so tests with a paused clock
//! are deterministic.

use crate::{media::MediaSource, types::*, Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug)]
struct SimState {
    duration: f64,
    position: f64,
    playback_rate: f64,
    paused: bool,
    quality: Option<String>,
    short_form: Option<bool>,
    fetch_rate: f64,
    lookahead: f64,
    buffered_start: f64,
    buffered_end: f64,
    /// Disjoint ranges beyond the contiguous head, left by earlier seeks
    fragments: Vec<TimeRange>,
    horizon: f64,
    last_update: Instant,
    fail_reads: bool,
    fail_writes: bool,
    attached: bool,
    seeks: Vec<f64>,
}

impl SimState {
    /// Grow the buffered extent for the time elapsed since the last call
    fn advance(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.last_update = now;

        if self.buffered_end < self.horizon {
            self.buffered_end = (self.buffered_end + self.fetch_rate * elapsed)
                .min(self.horizon)
                .min(self.duration);
        }
    }

    fn request(&mut self, position: f64) {
        self.horizon = self.horizon.max(position + self.lookahead).min(self.duration);
    }

    fn check_read(&self, what: &'static str) -> Result<()> {
        if !self.attached {
            return Err(Error::SourceDetached);
        }
        if self.fail_reads {
            return Err(Error::read(what));
        }
        Ok(())
    }

    fn check_write(&self, what: &'static str) -> Result<()> {
        if !self.attached {
            return Err(Error::SourceDetached);
        }
        if self.fail_writes {
            return Err(Error::write(what));
        }
        Ok(())
    }
}

/// In-memory stand-in for a player, with fault injection
#[derive(Debug)]
pub struct SimulatedSource {
    state: Mutex<SimState>,
    resized: Arc<Notify>,
}

impl SimulatedSource {
    /// A paused, unbuffered asset of `duration` seconds
    pub fn new(duration: f64) -> Self {
        let lookahead = 10.0;
        Self {
            state: Mutex::new(SimState {
                duration,
                position: 0.0,
                playback_rate: 1.0,
                paused: true,
                quality: None,
                short_form: None,
                fetch_rate: 10.0,
                lookahead,
                buffered_start: 0.0,
                buffered_end: 0.0,
                fragments: Vec::new(),
                horizon: lookahead.min(duration),
                last_update: Instant::now(),
                fail_reads: false,
                fail_writes: false,
                attached: true,
                seeks: Vec::new(),
            }),
            resized: Arc::new(Notify::new()),
        }
    }

    pub fn with_fetch_rate(self, rate: f64) -> Self {
        self.lock().fetch_rate = rate.max(0.0);
        self
    }

    pub fn with_lookahead(self, seconds: f64) -> Self {
        {
            let mut state = self.lock();
            state.lookahead = seconds.max(0.0);
            let position = state.position;
            state.horizon = 0.0;
            state.request(position);
        }
        self
    }

    pub fn with_position(self, position: f64) -> Self {
        {
            let mut state = self.lock();
            state.position = position;
            state.request(position);
        }
        self
    }

    pub fn with_playback_rate(self, rate: f64) -> Self {
        self.lock().playback_rate = rate;
        self
    }

    pub fn with_paused(self, paused: bool) -> Self {
        self.lock().paused = paused;
        self
    }

    pub fn with_quality(self, label: impl Into<String>) -> Self {
        self.lock().quality = Some(label.into());
        self
    }

    pub fn with_short_form(self, short_form: bool) -> Self {
        self.lock().short_form = Some(short_form);
        self
    }

    /// Switch rendition: the cache ahead of the cursor is discarded
    pub fn switch_quality(&self, label: impl Into<String>) {
        {
            let mut state = self.lock();
            state.advance();
            state.quality = Some(label.into());
            let position = state.position;
            state.buffered_end = state.buffered_end.min(position).max(state.buffered_start);
            state.fragments.clear();
            state.horizon = 0.0;
            state.request(position);
        }
        self.resized.notify_one();
    }

    /// Overwrite the buffered interval
    pub fn set_buffered(&self, start: f64, end: f64) {
        let mut state = self.lock();
        state.advance();
        state.buffered_start = start;
        state.buffered_end = end;
    }

    /// Add a disjoint buffered range that the contiguous fill never joins
    pub fn add_fragment(&self, start: f64, end: f64) {
        self.lock().fragments.push(TimeRange::new(start, end));
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn detach(&self) {
        self.lock().attached = false;
    }

    pub fn current_position(&self) -> f64 {
        self.lock().position
    }

    /// Current buffered end, after accounting for elapsed time
    pub fn buffered_end(&self) -> f64 {
        let mut state = self.lock();
        state.advance();
        state.buffered_end
    }

    /// Every position written through `set_position`, in order
    pub fn seeks(&self) -> Vec<f64> {
        self.lock().seeks.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MediaSource for SimulatedSource {
    async fn position(&self) -> Result<f64> {
        let state = self.lock();
        state.check_read("position")?;
        Ok(state.position)
    }

    async fn set_position(&self, position: f64) -> Result<()> {
        let mut state = self.lock();
        state.check_write("position")?;
        state.advance();
        let position = position.clamp(0.0, state.duration);
        state.position = position;
        state.seeks.push(position);
        state.request(position);
        Ok(())
    }

    async fn duration(&self) -> Result<f64> {
        let state = self.lock();
        state.check_read("duration")?;
        Ok(state.duration)
    }

    async fn buffered_ranges(&self) -> Result<Vec<TimeRange>> {
        let mut state = self.lock();
        state.check_read("buffered ranges")?;
        state.advance();
        let head = TimeRange::new(state.buffered_start, state.buffered_end);
        let mut ranges: Vec<TimeRange> = std::iter::once(head)
            .chain(state.fragments.iter().copied())
            .filter(|r| !r.is_empty())
            .collect();
        ranges.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(ranges)
    }

    async fn playback_rate(&self) -> Result<f64> {
        let state = self.lock();
        state.check_read("playback rate")?;
        Ok(state.playback_rate)
    }

    async fn set_playback_rate(&self, rate: f64) -> Result<()> {
        let mut state = self.lock();
        state.check_write("playback rate")?;
        state.playback_rate = rate;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut state = self.lock();
        state.check_write("paused")?;
        state.paused = true;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut state = self.lock();
        state.check_write("paused")?;
        state.paused = false;
        Ok(())
    }

    async fn is_paused(&self) -> Result<bool> {
        let state = self.lock();
        state.check_read("paused")?;
        Ok(state.paused)
    }

    async fn playback_quality(&self) -> Result<Option<String>> {
        let state = self.lock();
        state.check_read("quality")?;
        Ok(state.quality.clone())
    }

    async fn short_form_hint(&self) -> Option<bool> {
        self.lock().short_form
    }

    fn resize_notifier(&self) -> Option<Arc<Notify>> {
        Some(self.resized.clone())
    }

    fn is_attached(&self) -> bool {
        self.lock().attached
    }
}
