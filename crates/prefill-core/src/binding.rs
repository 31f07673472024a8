//! Source binding and the periodic control loop task
//!
//! Exactly one source is bound at a time. Each binding owns a fresh
//! [`BufferForcer`] and one tokio task that ticks it. The task holds the
//! controller lock for a whole tick, so a tick never overlaps a pending
//! settle delay from the previous one.

use crate::{
    config::ForcerConfig,
    controller::BufferForcer,
    events::EventSink,
    media::MediaSource,
    types::*,
    Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

struct ActiveBinding {
    session_id: SessionId,
    forcer: Arc<Mutex<BufferForcer>>,
    task: JoinHandle<()>,
}

/// Receives source availability from the host's discovery layer
pub struct Binder {
    config: ForcerConfig,
    sink: Arc<dyn EventSink>,
    active: Option<ActiveBinding>,
}

impl Binder {
    pub fn new(config: ForcerConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            active: None,
        })
    }

    /// Bind a new source, replacing any previous binding
    #[instrument(skip_all)]
    pub async fn on_source_available(&mut self, source: Arc<dyn MediaSource>) -> Result<SessionId> {
        self.on_source_removed().await;

        let forcer = BufferForcer::new(self.config.clone(), source.clone(), self.sink.clone())?;
        let session_id = forcer.session_id();
        let forcer = Arc::new(Mutex::new(forcer));

        let task = tokio::spawn(run_loop(
            forcer.clone(),
            self.config.tick_interval(),
            source.resize_notifier(),
        ));

        info!(session_id = %session_id, "Source bound");
        self.active = Some(ActiveBinding {
            session_id,
            forcer,
            task,
        });
        Ok(session_id)
    }

    /// Unbind the current source, cancelling pending work before stopping
    #[instrument(skip_all)]
    pub async fn on_source_removed(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.task.abort();
        if let Err(e) = active.task.await {
            if !e.is_cancelled() {
                debug!(error = %e, "Control loop ended abnormally");
            }
        }

        active.forcer.lock().await.unbind().await;
        info!(session_id = %active.session_id, "Source unbound");
    }

    pub fn is_bound(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.session_id)
    }

    /// Controller state of the current binding; waits for an in-flight tick
    pub async fn snapshot(&self) -> Option<ControllerSnapshot> {
        let active = self.active.as_ref()?;
        let forcer = active.forcer.lock().await;
        Some(forcer.snapshot())
    }

    /// Clear a halt latch on the current binding
    pub async fn resume(&self) {
        if let Some(active) = self.active.as_ref() {
            active.forcer.lock().await.resume();
        }
    }
}

impl Drop for Binder {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

async fn run_loop(forcer: Arc<Mutex<BufferForcer>>, period: Duration, resized: Option<Arc<Notify>>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                forcer.lock().await.tick().await;
            }
            _ = wait_resized(resized.as_deref()) => {
                forcer.lock().await.on_resize().await;
            }
        }
    }
}

async fn wait_resized(notify: Option<&Notify>) {
    match notify {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}
