//! Output formatting for CLI

use prefill_core::EventRecord;
use serde::Serialize;

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Format output based on selected format
pub fn format_output<T: Serialize>(data: &T, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => {
            format!("{:?}", serde_json::to_value(data).unwrap_or_default())
        }
    }
}

/// One event per line: JSON lines or a compact text row
pub fn format_event(record: &EventRecord, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Text => {
            let event = &record.event;
            let mut line = format!(
                "#{:<4} {:<14} {:>6.1}%  speed {:>5.2}  attempts {:>3}  quality {}",
                record.sequence,
                event.status.to_string(),
                event.progress,
                event.speed,
                event.attempts,
                event.quality.as_deref().unwrap_or("-"),
            );
            if let Some(previous) = &event.previous_quality {
                line.push_str(&format!(" (was {})", previous));
            }
            if let Some(reason) = event.reason {
                line.push_str(&format!("  [{}]", reason));
            }
            if event.is_short {
                line.push_str("  short");
            }
            line
        }
    }
}
