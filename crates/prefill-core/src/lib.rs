//! Prefill Core - Buffer-forcing controller for streaming media players
//!
//! This crate drives a player's own cache layer to prefetch an entire asset
//! ahead of the playback position:
//! - Read-only media state queries (buffered extent, quality label)
//! - Rolling buffering-throughput estimation
//! - Seek step planning by duration band, throughput and strategy
//! - Success/failure feedback on seek aggressiveness
//! - Quality-change detection with controlled restart
//! - Best-effort lifecycle and progress events
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Prefill Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │  Throughput  │  │  Step-Size   │  │   Strategy   │          │
//! │  │  Estimator   │  │   Planner    │  │   Adapter    │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │   Buffer    │                              │
//! │                    │   Forcer    │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐           │
//! │  │   Quality    │  │ Media State │  │    Event     │           │
//! │  │   Monitor    │  │   Reader    │  │   Emitter    │           │
//! │  └──────────────┘  └─────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod media;
pub mod throughput;
pub mod planner;
pub mod strategy;
pub mod quality;
pub mod events;
pub mod controller;
pub mod binding;
pub mod sim;

pub use error::{Error, Result};
pub use types::*;
pub use config::ForcerConfig;
pub use media::{MediaSource, MediaStateReader};
pub use throughput::ThroughputEstimator;
pub use planner::StepPlanner;
pub use strategy::StrategyAdapter;
pub use quality::{QualityChange, QualityMonitor};
pub use events::{BufferEvent, ChannelSink, EventRecord, EventSink, EventStatus, NullSink, TracingSink};
pub use controller::BufferForcer;
pub use binding::Binder;
pub use sim::SimulatedSource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Prefill Core initialized");
}
