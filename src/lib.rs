//! Synheart Pulse - Exercise session detection from heart-rate telemetry
//!
//! Pulse turns a time-ordered stream of heart-rate samples into discrete
//! exercise sessions through a deterministic pipeline: sample selection →
//! segmentation → per-session metrics → response encoding.
//!
//! ## Modules
//!
//! - **Zones**: five heart-rate bands derived from a max heart rate
//! - **Segmenter**: gap / activity-change session boundaries, batch or streaming
//! - **Metrics**: zone minutes, energy estimate, variability and load scores
//! - **Source**: the sample supply seam and JSON parsers
//!
//! The engine is synchronous and holds no shared state; callers may run
//! independent batches in parallel.

pub mod config;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod segmenter;
pub mod source;
pub mod types;
pub mod zones;

pub use config::{ConfigError, EngineConfig, SessionDetectionConfig, ZoneAllocation};
pub use error::ComputeError;
pub use metrics::{summarize, SessionSummarizer};
pub use pipeline::{detect_sessions, sessions_to_json, SessionEngine, StreamingSessionEngine};
pub use segmenter::{segment, StreamingSegmenter};
pub use source::{MemorySampleSource, SampleParser, SampleQuery, SampleSource};
pub use types::{Sample, SessionRecord, SessionResponse};
pub use zones::{zone_of, zones_for, ZoneModel};

/// Pulse version embedded in CLI reports
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for CLI reports
pub const PRODUCER_NAME: &str = "synheart-pulse";
