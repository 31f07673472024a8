//! Detection of asynchronous quality/resolution switches
//!
//! A switch re-requests the stream at a new bitrate, so buffered-extent
//! bookkeeping from before it can no longer be trusted.

use serde::{Deserialize, Serialize};
use tracing::info;

/// A detected switch between two known quality labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityChange {
    pub from: String,
    pub to: String,
}

/// Tracks the last known quality label of the bound source
#[derive(Debug, Clone, Default)]
pub struct QualityMonitor {
    current: Option<String>,
    changed: bool,
}

impl QualityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the label observed at session start without raising a change
    pub fn prime(&mut self, label: Option<String>) {
        if label.is_some() {
            self.current = label;
        }
    }

    /// Compare a freshly observed label with the last known one.
    ///
    /// A change needs both labels to be known; an unknown reading keeps the
    /// previous label.
    pub fn observe(&mut self, label: Option<String>) -> Option<QualityChange> {
        let label = label?;
        match self.current.as_deref() {
            Some(previous) if previous != label => {
                let change = QualityChange {
                    from: previous.to_string(),
                    to: label.clone(),
                };
                info!(from = %change.from, to = %change.to, "Quality change detected");
                self.current = Some(label);
                self.changed = true;
                Some(change)
            }
            Some(_) => None,
            None => {
                self.current = Some(label);
                None
            }
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// True between a detected change and the next `clear_flag`
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn clear_flag(&mut self) {
        self.changed = false;
    }
}
