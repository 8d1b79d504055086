//! Error types for Synheart Pulse

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur at the engine boundary.
///
/// Session detection itself is total; these only surface while building the
/// configuration, fetching samples or encoding output.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Sample source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid sample query: {0}")]
    InvalidQuery(String),

    #[error("Failed to parse samples: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
