//! Sample sources
//!
//! The engine does not own telemetry storage. A [`SampleSource`] hands it a
//! time-ordered, plausibility-filtered batch selected by a [`SampleQuery`].
//! [`MemorySampleSource`] is the in-process implementation; stores backed by
//! a database implement the same trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_MAX_HEART_RATE, DEFAULT_MIN_HEART_RATE};
use crate::error::ComputeError;
use crate::types::Sample;

/// Selection criteria for one fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleQuery {
    /// Inclusive range start
    pub start: DateTime<Utc>,
    /// Inclusive range end
    pub end: DateTime<Utc>,
    /// Exact activity tag to keep, or every tag when `None`
    pub activity: Option<String>,
    /// Maximum number of samples returned
    pub limit: Option<usize>,
    /// Inclusive plausible heart-rate range (bpm)
    pub heart_rate_range: (f64, f64),
}

impl SampleQuery {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            activity: None,
            limit: None,
            heart_rate_range: (DEFAULT_MIN_HEART_RATE, DEFAULT_MAX_HEART_RATE),
        }
    }

    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_heart_rate_range(mut self, min: f64, max: f64) -> Self {
        self.heart_rate_range = (min, max);
        self
    }

    /// Reject queries whose range runs backwards
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.start > self.end {
            return Err(ComputeError::InvalidQuery(format!(
                "start {} is after end {}",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// Whether a sample satisfies every criterion except the limit
    pub fn matches(&self, sample: &Sample) -> bool {
        let (min_hr, max_hr) = self.heart_rate_range;
        let in_range = sample.timestamp >= self.start && sample.timestamp <= self.end;
        let tag_matches = match &self.activity {
            Some(tag) => sample.activity.as_deref() == Some(tag.as_str()),
            None => true,
        };
        let plausible = sample
            .heart_rate
            .is_some_and(|hr| hr >= min_hr && hr <= max_hr);
        in_range && tag_matches && plausible
    }
}

/// Supplier of heart-rate samples
pub trait SampleSource {
    /// Fetch matching samples sorted ascending by timestamp.
    ///
    /// Storage failures surface as [`ComputeError::SourceUnavailable`]; the
    /// engine does not retry.
    fn fetch(&self, query: &SampleQuery) -> Result<Vec<Sample>, ComputeError>;
}

/// Samples held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySampleSource {
    samples: Vec<Sample>,
}

impl MemorySampleSource {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSource for MemorySampleSource {
    fn fetch(&self, query: &SampleQuery) -> Result<Vec<Sample>, ComputeError> {
        query.validate()?;

        let mut selected: Vec<Sample> = self
            .samples
            .iter()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        selected.sort_by_key(|s| s.timestamp);

        if let Some(limit) = query.limit {
            selected.truncate(limit);
        }

        Ok(selected)
    }
}

/// Parser for JSON sample payloads
pub struct SampleParser;

impl SampleParser {
    /// Parse a JSON array of samples
    pub fn parse_array(json: &str) -> Result<Vec<Sample>, ComputeError> {
        let samples: Vec<Sample> = serde_json::from_str(json)?;
        Ok(samples)
    }

    /// Parse NDJSON (one sample per line); blank lines are skipped
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Sample>, ComputeError> {
        ndjson
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(line_num, line)| Self::parse_line(line, line_num + 1))
            .collect()
    }

    /// Parse a single NDJSON line; `line_num` is 1-based and only used in errors
    pub fn parse_line(line: &str, line_num: usize) -> Result<Sample, ComputeError> {
        serde_json::from_str::<Sample>(line.trim()).map_err(|e| {
            ComputeError::ParseError(format!("Failed to parse line {line_num}: {e}"))
        })
    }
}
