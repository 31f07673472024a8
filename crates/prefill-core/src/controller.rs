//! Buffer-forcing controller - the control loop state machine
//!
//! Each attempt nudges the playback cursor past the furthest buffered end,
//! waits for the player's cache to react, measures the growth and puts the
//! cursor back. Outcomes feed the strategy adapter, which widens the next
//! step while the player keeps failing to fetch.
//!
//! ```text
//!            start                      stop
//!   Idle ───────────────▶ Buffering ───────────────▶ Idle
//!                         │      ▲
//!                         └──────┘ attempt (per tick)
//! ```

use crate::{
    config::ForcerConfig,
    events::{BufferEvent, Emitter, EventSink, EventStatus},
    media::{MediaSource, MediaStateReader},
    planner::StepPlanner,
    quality::{QualityChange, QualityMonitor},
    strategy::{StrategyAdapter, AGGRESSIVE_THRESHOLD},
    throughput::ThroughputEstimator,
    types::*,
    Error, Result,
};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

/// Seeks land this far before the end so the player never hits "ended"
const END_MARGIN_SECONDS: f64 = 0.1;

/// Mutable per-binding session state
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub status: ControllerStatus,
    /// Playback properties captured at the most recent start
    pub original: Option<PlaybackSnapshot>,
    pub attempts: u32,
    pub consecutive_faults: u32,
    /// Bumped on every start; delayed work checks it before touching state
    pub generation: u64,
    /// Set when a session ended in a way that must not auto-restart
    pub halted: Option<StopReason>,
    pub is_short: bool,
    pub duration: f64,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            status: ControllerStatus::Idle,
            original: None,
            attempts: 0,
            consecutive_faults: 0,
            generation: 0,
            halted: None,
            is_short: false,
            duration: 0.0,
        }
    }
}

/// Result of one seek-and-restore cycle
#[derive(Debug, Clone, Copy)]
struct SeekCycle {
    progress: bool,
    furthest: f64,
}

/// Drives one bound media source toward being fully buffered
pub struct BufferForcer {
    config: ForcerConfig,
    source: Arc<dyn MediaSource>,
    reader: MediaStateReader,
    planner: StepPlanner,
    strategy: StrategyAdapter,
    throughput: ThroughputEstimator,
    quality: QualityMonitor,
    emitter: Emitter,
    state: ControllerState,
}

impl BufferForcer {
    /// Bind a controller to a source
    pub fn new(
        config: ForcerConfig,
        source: Arc<dyn MediaSource>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            reader: MediaStateReader::new(config.completion_epsilon_seconds),
            planner: StepPlanner::new(&config),
            strategy: StrategyAdapter::new(),
            throughput: ThroughputEstimator::new(config.throughput_sample_window),
            quality: QualityMonitor::new(),
            emitter: Emitter::new(SessionId::new(), sink),
            state: ControllerState::default(),
            source,
            config,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.emitter.session_id()
    }

    pub fn status(&self) -> ControllerStatus {
        self.state.status
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn strategy(&self) -> &StrategyAdapter {
        &self.strategy
    }

    pub fn config(&self) -> &ForcerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            status: self.state.status,
            strategy: self.strategy.mode(),
            step_multiplier: self.strategy.multiplier(),
            consecutive_failures: self.strategy.consecutive_failures(),
            attempts: self.state.attempts,
            speed: self.throughput.average_rate(),
            quality: self.quality.current().map(str::to_string),
            halted: self.state.halted,
            generation: self.state.generation,
        }
    }

    /// Periodic control-loop entry point
    #[instrument(skip_all, fields(generation = self.state.generation))]
    pub async fn tick(&mut self) {
        match self.state.status {
            ControllerStatus::Idle => {
                self.watch_quality_idle().await;
                if self.should_start().await {
                    self.start().await;
                }
            }
            ControllerStatus::Buffering => self.drive().await,
        }
    }

    /// React to a resolution change signalled by the source
    #[instrument(skip_all, fields(generation = self.state.generation))]
    pub async fn on_resize(&mut self) {
        match self.state.status {
            ControllerStatus::Idle => self.watch_quality_idle().await,
            ControllerStatus::Buffering => {
                if self.detect_quality_change().await.is_some() {
                    self.restart_after_quality_change().await;
                }
            }
        }
    }

    /// Begin forcing and perform the first attempt right away
    pub async fn start(&mut self) {
        if self.state.status == ControllerStatus::Buffering {
            return;
        }
        match self.begin_session().await {
            Ok(()) => self.drive().await,
            Err(e) => debug!(code = e.error_code(), error = %e, "Not starting"),
        }
    }

    /// Clear a halt latch so the next tick may start a new session
    pub fn resume(&mut self) {
        if let Some(reason) = self.state.halted.take() {
            info!(reason = %reason, "Halt latch cleared");
        }
    }

    /// The source is going away: stop unconditionally
    pub async fn unbind(&mut self) {
        self.stop(StopReason::Unbound).await;
    }

    /// Restore playback and return to `Idle`. No-op when already idle.
    #[instrument(skip(self), fields(generation = self.state.generation))]
    pub async fn stop(&mut self, reason: StopReason) {
        if self.state.status == ControllerStatus::Idle {
            return;
        }

        // Cleared only once restored, so an aborted stop is redone by unbind
        if let Some(original) = self.state.original {
            self.restore(original).await;
            self.state.original = None;
        }

        let furthest = self.reader.furthest_buffered_end(&*self.source).await;
        let speed = self.throughput.average_rate();
        let attempts = self.state.attempts;

        self.state.status = ControllerStatus::Idle;
        self.state.consecutive_faults = 0;
        if reason.halts() {
            self.state.halted = Some(reason);
        }
        self.quality.clear_flag();
        self.strategy.reset();
        self.throughput.reset();

        let mut event = self.event(EventStatus::Complete, furthest, speed);
        event.attempts = attempts;
        event.reason = Some(reason);
        self.emitter.emit(event);

        self.state.attempts = 0;

        info!(
            reason = %reason,
            attempts,
            furthest,
            events = self.emitter.emitted(),
            "Buffer forcing stopped"
        );
    }

    async fn should_start(&self) -> bool {
        if self.state.halted.is_some() || !self.source.is_attached() {
            return false;
        }
        if self.reader.duration(&*self.source).await.is_none() {
            return false;
        }
        !self.reader.is_complete(&*self.source).await
    }

    /// Idle -> Buffering
    async fn begin_session(&mut self) -> Result<()> {
        let duration = self
            .reader
            .duration(&*self.source)
            .await
            .ok_or(Error::UnknownDuration)?;

        let original = self.capture().await.map_err(|e| {
            warn!(code = e.error_code(), error = %e, "Could not capture playback state");
            e
        })?;

        let is_short = self
            .reader
            .is_short_form(&*self.source, duration, self.config.short_form_threshold_seconds)
            .await;
        let label = self.reader.quality(&*self.source).await;

        self.state.status = ControllerStatus::Buffering;
        self.state.original = Some(original);
        self.state.attempts = 0;
        self.state.consecutive_faults = 0;
        self.state.generation += 1;
        self.state.is_short = is_short;
        self.state.duration = duration;
        self.strategy.reset();
        self.throughput.reset();
        self.quality.clear_flag();
        self.quality.prime(label);

        let furthest = self.reader.furthest_buffered_end(&*self.source).await;
        let event = self.event(EventStatus::Started, furthest, 0.0);
        self.emitter.emit(event);

        info!(
            generation = self.state.generation,
            duration,
            is_short,
            quality = self.quality.current().unwrap_or("unknown"),
            position = original.position,
            "Buffer forcing started"
        );
        Ok(())
    }

    async fn drive(&mut self) {
        self.attempt().await;
        if self.quality.changed() {
            self.restart_after_quality_change().await;
        }
    }

    /// Hard restart: stop, let the new stream settle, start from scratch.
    ///
    /// Loops while the fresh session immediately sees yet another switch.
    async fn restart_after_quality_change(&mut self) {
        loop {
            self.stop(StopReason::QualityRestart).await;

            let generation = self.state.generation;
            sleep(self.config.quality_change_settle()).await;
            if self.ensure_live(generation).is_err() || !self.should_start().await {
                return;
            }
            if let Err(e) = self.begin_session().await {
                debug!(code = e.error_code(), error = %e, "Restart abandoned");
                return;
            }
            self.attempt().await;
            if !self.quality.changed() {
                return;
            }
        }
    }

    /// One control-loop iteration inside `Buffering`
    async fn attempt(&mut self) {
        if self.state.status != ControllerStatus::Buffering {
            return;
        }
        let generation = self.state.generation;

        if self.reader.is_fully_buffered(&*self.source).await {
            self.stop(StopReason::FullyBuffered).await;
            return;
        }
        if self.state.attempts >= self.config.max_attempts {
            self.stop(StopReason::AttemptsExhausted).await;
            return;
        }

        if self.detect_quality_change().await.is_some() {
            return;
        }

        if let Some(duration) = self.reader.duration(&*self.source).await {
            self.state.duration = duration;
        }
        let duration = self.state.duration;

        let furthest = self.reader.furthest_buffered_end(&*self.source).await;
        self.throughput.update(furthest, Instant::now());

        let remaining = duration - furthest;
        if remaining <= self.config.completion_epsilon_seconds {
            self.stop(StopReason::FullyBuffered).await;
            return;
        }

        let speed = self.throughput.average_rate();
        let step = self
            .planner
            .step(duration, self.state.is_short, speed, self.strategy.multiplier());
        let target = (furthest + step).min(duration - END_MARGIN_SECONDS);

        let measured = match self.seek_cycle(generation, furthest, target).await {
            Ok(cycle) => {
                self.state.consecutive_faults = 0;
                self.strategy.record(cycle.progress);
                self.state.attempts += 1;
                debug!(
                    attempt = self.state.attempts,
                    step,
                    target,
                    furthest = cycle.furthest,
                    progress = cycle.progress,
                    speed,
                    multiplier = self.strategy.multiplier(),
                    "Attempt finished"
                );
                cycle.furthest
            }
            Err(e) => {
                self.state.consecutive_faults += 1;
                self.strategy.record(false);
                self.state.attempts += 1;
                warn!(
                    attempt = self.state.attempts,
                    faults = self.state.consecutive_faults,
                    code = e.error_code(),
                    error = %e,
                    "Attempt faulted"
                );
                if !e.is_recoverable() || self.state.consecutive_faults >= self.config.fault_ceiling {
                    warn!(faults = self.state.consecutive_faults, "Persistent source fault, giving up");
                    self.stop(StopReason::PersistentFault).await;
                    return;
                }
                furthest
            }
        };

        let event = self.event(EventStatus::Progress, measured, self.throughput.average_rate());
        self.emitter.emit(event);

        if self.strategy.consecutive_failures() > AGGRESSIVE_THRESHOLD
            && self.state.attempts % 5 == 0
        {
            debug!(attempt = self.state.attempts, "Recovery pause");
            sleep(self.config.recovery_delay()).await;
            if self.ensure_live(generation).is_err() {
                return;
            }
        }
    }

    /// Seek past the buffered end, wait, measure, restore the cursor
    async fn seek_cycle(&self, generation: u64, previous: f64, target: f64) -> Result<SeekCycle> {
        let saved = self.source.position().await?;
        self.source.set_position(target).await?;

        sleep(self.config.settle_delay(self.strategy.consecutive_failures())).await;
        self.ensure_live(generation)?;

        let furthest = self.reader.furthest_buffered_end(&*self.source).await;
        let progress = furthest - previous > self.config.progress_threshold_seconds;

        self.source.set_position(saved).await?;

        Ok(SeekCycle { progress, furthest })
    }

    /// Liveness guard for work resumed after a delay
    fn ensure_live(&self, generation: u64) -> Result<()> {
        if self.state.generation != generation || !self.source.is_attached() {
            return Err(Error::SourceDetached);
        }
        Ok(())
    }

    async fn detect_quality_change(&mut self) -> Option<QualityChange> {
        let label = self.reader.quality(&*self.source).await;
        let change = self.quality.observe(label)?;

        self.strategy.reset();
        let furthest = self.reader.furthest_buffered_end(&*self.source).await;
        let mut event = self.event(EventStatus::QualityChange, furthest, self.throughput.average_rate());
        event.previous_quality = Some(change.from.clone());
        self.emitter.emit(event);

        Some(change)
    }

    /// Quality tracking while idle; a switch clears any halt latch
    async fn watch_quality_idle(&mut self) {
        if self.detect_quality_change().await.is_some() {
            self.quality.clear_flag();
            self.resume();
        }
    }

    async fn capture(&self) -> Result<PlaybackSnapshot> {
        Ok(PlaybackSnapshot {
            position: self.source.position().await?,
            playback_rate: self.source.playback_rate().await?,
            paused: self.source.is_paused().await?,
        })
    }

    async fn restore(&self, original: PlaybackSnapshot) {
        if let Err(e) = self.source.set_position(original.position).await {
            warn!(error = %e, "Failed to restore position");
        }
        if let Err(e) = self.source.set_playback_rate(original.playback_rate).await {
            warn!(error = %e, "Failed to restore playback rate");
        }
        match self.source.is_paused().await {
            Ok(paused) if paused == original.paused => {}
            Ok(_) => {
                let result = if original.paused {
                    self.source.pause().await
                } else {
                    self.source.play().await
                };
                if let Err(e) = result {
                    warn!(error = %e, "Failed to restore pause state");
                }
            }
            Err(e) => warn!(error = %e, "Failed to read pause state"),
        }
    }

    fn event(&self, status: EventStatus, furthest: f64, speed: f64) -> BufferEvent {
        let progress = if self.state.duration > 0.0 {
            (furthest / self.state.duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        BufferEvent {
            status,
            quality: self.quality.current().map(str::to_string),
            previous_quality: None,
            is_short: self.state.is_short,
            progress,
            speed,
            attempts: self.state.attempts,
            reason: None,
        }
    }
}
