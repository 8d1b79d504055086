//! Session segmentation
//!
//! Splits a time-ordered sample stream into session candidates. A session
//! ends when the gap to the next sample is strictly larger than the
//! configured maximum, or when the activity tag changes. Candidates spanning
//! less than the minimum session duration are dropped.
//!
//! Input is expected to be sorted and plausibility-filtered already; nothing
//! here re-sorts or re-filters.

use chrono::Duration;
use tracing::debug;

use crate::config::SessionDetectionConfig;
use crate::types::{Sample, SessionCandidate};

/// Incremental segmenter holding at most one open candidate.
///
/// Emits each session as soon as its boundary fires, so only the open
/// candidate has to stay resident.
#[derive(Debug, Clone)]
pub struct StreamingSegmenter {
    min_duration: Duration,
    max_gap: Duration,
    open: Option<SessionCandidate>,
}

impl StreamingSegmenter {
    pub fn new(config: &SessionDetectionConfig) -> Self {
        Self {
            min_duration: config.min_session_duration(),
            max_gap: config.max_gap(),
            open: None,
        }
    }

    /// Feed the next sample; returns a finished session if this sample closed one
    pub fn push(&mut self, sample: Sample) -> Option<SessionCandidate> {
        match self.open.take() {
            Some(mut candidate) if !self.is_boundary(&candidate, &sample) => {
                candidate.push(sample);
                self.open = Some(candidate);
                None
            }
            closed => {
                self.open = Some(SessionCandidate::open(sample));
                closed.and_then(|candidate| self.close(candidate))
            }
        }
    }

    /// Close the trailing candidate once input is exhausted
    pub fn finish(&mut self) -> Option<SessionCandidate> {
        self.open.take().and_then(|candidate| self.close(candidate))
    }

    /// Start time of the currently open candidate
    pub fn open_since(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.open.as_ref().map(|c| c.start_time)
    }

    fn is_boundary(&self, candidate: &SessionCandidate, sample: &Sample) -> bool {
        let gap = sample.timestamp - candidate.last_sample_time;
        gap > self.max_gap || sample.activity != candidate.activity
    }

    /// Zero-span candidates (a lone sample) never qualify, even with a zero minimum
    fn close(&self, candidate: SessionCandidate) -> Option<SessionCandidate> {
        let span = candidate.span();
        if span > Duration::zero() && span >= self.min_duration {
            Some(candidate)
        } else {
            debug!(
                activity = candidate.activity.as_deref().unwrap_or("untagged"),
                start = %candidate.start_time,
                span_sec = candidate.span().num_seconds(),
                samples = candidate.samples.len(),
                "Discarding candidate shorter than minimum session duration"
            );
            None
        }
    }
}

/// Partition an ordered sample slice into session candidates.
///
/// Candidates come out ordered by start time, never overlap, and each spans
/// at least the minimum session duration and more than zero. Empty input
/// gives empty output.
pub fn segment(samples: &[Sample], config: &SessionDetectionConfig) -> Vec<SessionCandidate> {
    let mut segmenter = StreamingSegmenter::new(config);
    let mut sessions: Vec<SessionCandidate> = samples
        .iter()
        .filter_map(|sample| segmenter.push(sample.clone()))
        .collect();
    sessions.extend(segmenter.finish());
    sessions
}
