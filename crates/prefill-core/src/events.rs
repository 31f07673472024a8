//! Lifecycle and progress events
//!
//! Delivery is fire-and-forget: a sink that is full, closed or failing never
//! changes controller state. Failures are logged and dropped.

use crate::{types::*, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Event status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Started,
    Progress,
    QualityChange,
    Complete,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Started => write!(f, "started"),
            EventStatus::Progress => write!(f, "progress"),
            EventStatus::QualityChange => write!(f, "quality_change"),
            EventStatus::Complete => write!(f, "complete"),
        }
    }
}

/// Status event emitted by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferEvent {
    pub status: EventStatus,
    /// Current quality label, if known
    pub quality: Option<String>,
    /// Label before a quality change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_quality: Option<String>,
    pub is_short: bool,
    /// Percent of the duration covered by the furthest buffered end
    pub progress: f64,
    /// Throughput estimate in media-seconds per second
    pub speed: f64,
    pub attempts: u32,
    /// Why the session ended (complete events only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopReason>,
}

/// Event with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Unique event ID
    pub id: Uuid,
    /// Binding the event belongs to
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    /// Sequence number within the binding
    pub sequence: u64,
    #[serde(flatten)]
    pub event: BufferEvent,
}

/// Receiver of controller events
pub trait EventSink: Send + Sync {
    /// Hand over one record. Must not block.
    fn deliver(&self, record: EventRecord) -> Result<()>;
}

/// Forwards records into a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<EventRecord>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EventRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, record: EventRecord) -> Result<()> {
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::SinkUnavailable("channel full".into()),
            mpsc::error::TrySendError::Closed(_) => Error::SinkClosed,
        })
    }
}

/// Logs every record through tracing
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn deliver(&self, record: EventRecord) -> Result<()> {
        let event = &record.event;
        info!(
            session_id = %record.session_id,
            sequence = record.sequence,
            status = %event.status,
            quality = event.quality.as_deref().unwrap_or("unknown"),
            progress = event.progress,
            speed = event.speed,
            attempts = event.attempts,
            "Buffer event"
        );
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn deliver(&self, _record: EventRecord) -> Result<()> {
        Ok(())
    }
}

/// Stamps events and hands them to a sink, swallowing delivery failures
pub struct Emitter {
    session_id: SessionId,
    sequence: u64,
    sink: Arc<dyn EventSink>,
}

impl Emitter {
    pub fn new(session_id: SessionId, sink: Arc<dyn EventSink>) -> Self {
        Self {
            session_id,
            sequence: 0,
            sink,
        }
    }

    pub fn emit(&mut self, event: BufferEvent) {
        self.sequence += 1;
        let status = event.status;
        let record = EventRecord {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            timestamp: Utc::now(),
            sequence: self.sequence,
            event,
        };

        if let Err(e) = self.sink.deliver(record) {
            debug!(status = %status, code = e.error_code(), error = %e, "Event dropped");
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Number of events emitted so far, delivered or not
    pub fn emitted(&self) -> u64 {
        self.sequence
    }
}
