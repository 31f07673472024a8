//! Error types for Prefill Core

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Controller error types
#[derive(Error, Debug)]
pub enum Error {
    // Media source errors
    #[error("Media source is no longer attached")]
    SourceDetached,

    #[error("Failed to read {what} from media source")]
    SourceRead { what: &'static str },

    #[error("Failed to write {what} to media source")]
    SourceWrite { what: &'static str },

    #[error("Media duration is unknown or not finite")]
    UnknownDuration,

    // Event sink errors
    #[error("Event sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Event sink closed")]
    SinkClosed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Host collaborator errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a read fault for the named media property
    pub fn read(what: &'static str) -> Self {
        Error::SourceRead { what }
    }

    /// Create a write fault for the named media property
    pub fn write(what: &'static str) -> Self {
        Error::SourceWrite { what }
    }

    /// Returns true if this error is a transient media source fault
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SourceRead { .. } | Error::SourceWrite { .. } | Error::UnknownDuration
        )
    }

    /// Returns the error code for logs and telemetry
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::SourceDetached => "SOURCE_DETACHED",
            Error::SourceRead { .. } => "SOURCE_READ",
            Error::SourceWrite { .. } => "SOURCE_WRITE",
            Error::UnknownDuration => "UNKNOWN_DURATION",
            Error::SinkUnavailable(_) => "SINK_UNAVAILABLE",
            Error::SinkClosed => "SINK_CLOSED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
            Error::Other(_) => "OTHER",
        }
    }
}
