//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Pulse.
//! It wires sample selection, segmentation, summarization and encoding.

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::encoder::SessionEncoder;
use crate::error::ComputeError;
use crate::metrics::SessionSummarizer;
use crate::segmenter::{segment, StreamingSegmenter};
use crate::source::{SampleQuery, SampleSource};
use crate::types::{Sample, SessionRecord};

/// Detect and summarize sessions in an ordered, pre-filtered sample batch.
///
/// The configuration is taken as given; use [`SessionEngine::new`] to have it
/// validated first.
///
/// # Example
/// ```ignore
/// let sessions = detect_sessions(&samples, &EngineConfig::default());
/// ```
pub fn detect_sessions(samples: &[Sample], config: &EngineConfig) -> Vec<SessionRecord> {
    let summarizer = SessionSummarizer::from_config(config);
    let records: Vec<SessionRecord> = segment(samples, &config.detection)
        .iter()
        .map(|candidate| summarizer.summarize(candidate))
        .collect();

    info!(
        samples = samples.len(),
        sessions = records.len(),
        "Session detection complete"
    );

    records
}

/// Detect sessions and encode them as a JSON array of responses
pub fn sessions_to_json(samples: &[Sample], config: &EngineConfig) -> Result<String, ComputeError> {
    let records = detect_sessions(samples, config);
    SessionEncoder::new().encode_all_to_json(&records)
}

/// Session engine bound to one validated configuration.
///
/// Holds no per-call state, so one engine can serve any number of batches.
#[derive(Debug, Clone)]
pub struct SessionEngine {
    config: EngineConfig,
    summarizer: SessionSummarizer,
    encoder: SessionEncoder,
}

impl SessionEngine {
    /// Create an engine, rejecting invalid configuration up front
    pub fn new(config: EngineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            summarizer: SessionSummarizer::from_config(&config),
            encoder: SessionEncoder::new(),
            config,
        })
    }

    /// Engine configured from `PULSE_*` environment variables
    pub fn from_env() -> Result<Self, ComputeError> {
        Self::new(EngineConfig::from_env())
    }

    /// Use the given encoder for JSON output
    pub fn with_encoder(mut self, encoder: SessionEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Segment and summarize an ordered, pre-filtered batch
    pub fn process(&self, samples: &[Sample]) -> Vec<SessionRecord> {
        segment(samples, &self.config.detection)
            .iter()
            .map(|candidate| self.summarizer.summarize(candidate))
            .collect()
    }

    /// Fetch samples from a source and process them.
    ///
    /// The query's heart-rate range is replaced by the configured plausible
    /// range. Source failures are returned unchanged.
    pub fn process_source(
        &self,
        source: &dyn SampleSource,
        query: SampleQuery,
    ) -> Result<Vec<SessionRecord>, ComputeError> {
        let detection = &self.config.detection;
        let query = query.with_heart_rate_range(detection.min_heart_rate, detection.max_heart_rate);
        let samples = source.fetch(&query)?;
        let records = self.process(&samples);

        info!(
            activity = query.activity.as_deref().unwrap_or("any"),
            samples = samples.len(),
            sessions = records.len(),
            "Processed sample source"
        );

        Ok(records)
    }

    /// Process a batch and encode the sessions as a JSON array
    pub fn process_to_json(&self, samples: &[Sample]) -> Result<String, ComputeError> {
        self.encoder.encode_all_to_json(&self.process(samples))
    }

    /// Start a streaming run sharing this engine's configuration
    pub fn streaming(&self) -> StreamingSessionEngine {
        StreamingSessionEngine {
            segmenter: StreamingSegmenter::new(&self.config.detection),
            summarizer: self.summarizer.clone(),
            config: self.config.clone(),
            last_timestamp: None,
            dropped: 0,
        }
    }
}

/// Incremental engine that emits each session as soon as it closes.
///
/// Unlike the batch path it acts as its own sample source: implausible
/// heart rates are filtered and out-of-order samples are dropped.
#[derive(Debug, Clone)]
pub struct StreamingSessionEngine {
    segmenter: StreamingSegmenter,
    summarizer: SessionSummarizer,
    config: EngineConfig,
    last_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    dropped: usize,
}

impl StreamingSessionEngine {
    /// Feed one sample; returns a session if this sample closed one
    pub fn push(&mut self, sample: Sample) -> Option<SessionRecord> {
        let plausible = sample
            .heart_rate
            .is_some_and(|hr| self.config.detection.is_plausible(hr));
        if !plausible {
            self.dropped += 1;
            return None;
        }

        if let Some(last) = self.last_timestamp {
            if sample.timestamp < last {
                warn!(
                    timestamp = %sample.timestamp,
                    last = %last,
                    "Dropping out-of-order sample"
                );
                self.dropped += 1;
                return None;
            }
        }
        self.last_timestamp = Some(sample.timestamp);

        self.segmenter
            .push(sample)
            .map(|candidate| self.summarizer.summarize(&candidate))
    }

    /// Close the trailing session once input ends
    pub fn finish(&mut self) -> Option<SessionRecord> {
        self.segmenter
            .finish()
            .map(|candidate| self.summarizer.summarize(&candidate))
    }

    /// Samples rejected as implausible or out of order
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SessionDetectionConfig, ZoneAllocation};
    use crate::source::MemorySampleSource;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap()
    }

    fn run(start_min: i64, minutes: i64, hr: f64, activity: &str) -> Vec<Sample> {
        (0..=minutes)
            .map(|m| Sample::new(t0() + Duration::minutes(start_min + m), Some(hr), Some(activity)))
            .collect()
    }

    fn alternating(start_min: i64, minutes: i64, activity: &str) -> Vec<Sample> {
        (0..=minutes)
            .map(|m| {
                let hr = if m % 2 == 0 { 100.0 } else { 200.0 };
                Sample::new(t0() + Duration::minutes(start_min + m), Some(hr), Some(activity))
            })
            .collect()
    }

    /// Mixed day: gaps, tag changes, a short run and an alternating block
    fn mixed_day() -> Vec<Sample> {
        let mut samples = run(0, 14, 140.0, "Run");
        samples.extend(run(21, 12, 125.0, "Run"));
        samples.extend(run(34, 8, 160.0, "Ride"));
        samples.extend(alternating(50, 20, "Ride"));
        samples.extend(run(71, 30, 175.0, "Swim"));
        samples
    }

    fn assert_session_properties(records: &[SessionRecord]) {
        for pair in records.windows(2) {
            assert!(pair[0].start_time < pair[1].start_time);
            assert!(pair[0].end_time <= pair[1].start_time);
        }
        for record in records {
            let expected = ((record.end_time - record.start_time).num_milliseconds() as f64
                / 60_000.0)
                .round() as u32;
            assert_eq!(record.duration_minutes, expected);

            if record.zone_minutes.total() > 0 {
                assert!((record.fat_burn_ratio + record.cardio_ratio - 1.0).abs() <= 0.01 + 1e-9);
            } else {
                assert_eq!((record.fat_burn_ratio, record.cardio_ratio), (0.0, 0.0));
            }
        }
    }

    #[test]
    fn test_steady_run_scenario() {
        let records = detect_sessions(&run(0, 14, 140.0, "Run"), &EngineConfig::default());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_minutes, 14);
        assert_eq!(records[0].avg_heart_rate, Some(140));
        assert_eq!(records[0].intensity_score, Some(74));
    }

    #[test]
    fn test_gap_splits_two_runs() {
        // 0..12, then a 6-minute gap, then 18..30
        let mut samples = run(0, 12, 140.0, "Run");
        samples.extend(run(18, 12, 140.0, "Run"));
        let records = detect_sessions(&samples, &EngineConfig::default());

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.duration_minutes >= 10));
    }

    #[test]
    fn test_short_run_yields_nothing() {
        let records = detect_sessions(&run(0, 8, 140.0, "Run"), &EngineConfig::default());
        assert!(records.is_empty());
    }

    #[test]
    fn test_alternating_heart_rates() {
        let records = detect_sessions(&alternating(0, 20, "Ride"), &EngineConfig::default());

        assert_eq!(records.len(), 1);
        // 11 samples at 100, 10 at 200
        let expected_avg = (11.0 * 100.0 + 10.0 * 200.0) / 21.0_f64;
        assert_eq!(records[0].avg_heart_rate, Some(expected_avg.round() as u32));
        let std_dev = records[0].heart_rate_std_dev.unwrap();
        assert!((std_dev - 49.9).abs() < 0.05);
    }

    #[test]
    fn test_mixed_day_properties() {
        let records = detect_sessions(&mixed_day(), &EngineConfig::default());

        let activities: Vec<&str> = records
            .iter()
            .map(|r| r.activity.as_deref().unwrap_or(""))
            .collect();
        // Run 0-14; Run 21-33; Ride 34-42 is too short; Ride 50-70; Swim 71-101
        assert_eq!(activities, vec!["Run", "Run", "Ride", "Swim"]);
        assert_session_properties(&records);
    }

    #[test]
    fn test_idempotent() {
        let config = EngineConfig::default();
        let samples = mixed_day();
        assert_eq!(detect_sessions(&samples, &config), detect_sessions(&samples, &config));
        assert_eq!(
            sessions_to_json(&samples, &config).unwrap(),
            sessions_to_json(&samples, &config).unwrap()
        );
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let config = EngineConfig::default().with_detection(SessionDetectionConfig {
            max_gap_minutes: -5.0,
            ..Default::default()
        });
        assert!(matches!(
            SessionEngine::new(config),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_engine_matches_free_function() {
        let config = EngineConfig::default().with_zone_allocation(ZoneAllocation::Uniform);
        let engine = SessionEngine::new(config.clone()).unwrap();
        let samples = mixed_day();
        assert_eq!(engine.process(&samples), detect_sessions(&samples, &config));
    }

    #[test]
    fn test_alternate_profile() {
        // Shorter sessions and a lower max heart rate shift everything up a zone
        let config = EngineConfig::default()
            .with_detection(SessionDetectionConfig {
                min_session_minutes: 5.0,
                ..Default::default()
            })
            .with_zone_max_heart_rate(160.0);
        let engine = SessionEngine::new(config).unwrap();
        let records = engine.process(&run(0, 8, 140.0, "Run"));

        assert_eq!(records.len(), 1);
        // 140 / 160 = 0.875 -> Z4 (128..144)
        assert_eq!(records[0].zone_minutes.0, [0, 0, 0, 8, 0]);
        assert_eq!(records[0].intensity_score, Some(88));
    }

    #[test]
    fn test_process_source_applies_query() {
        let mut samples = mixed_day();
        samples.reverse();
        samples.push(Sample::new(t0() + Duration::minutes(5), Some(30.0), Some("Run")));
        let source = MemorySampleSource::new(samples);

        let engine = SessionEngine::new(EngineConfig::default()).unwrap();
        let query = SampleQuery::new(t0(), t0() + Duration::hours(3)).with_activity("Run");
        let records = engine.process_source(&source, query).unwrap();

        assert_eq!(records.len(), 2);
        assert_session_properties(&records);
    }

    struct FailingSource;

    impl SampleSource for FailingSource {
        fn fetch(&self, _query: &SampleQuery) -> Result<Vec<Sample>, ComputeError> {
            Err(ComputeError::SourceUnavailable("database offline".to_string()))
        }
    }

    #[test]
    fn test_source_failure_propagates() {
        let engine = SessionEngine::new(EngineConfig::default()).unwrap();
        let result = engine.process_source(&FailingSource, SampleQuery::new(t0(), t0()));
        assert!(matches!(result, Err(ComputeError::SourceUnavailable(_))));
    }

    #[test]
    fn test_process_to_json() {
        let engine = SessionEngine::new(EngineConfig::default()).unwrap();
        let json = engine.process_to_json(&run(0, 14, 140.0, "Run")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["sport"], "Run");
        assert_eq!(value[0]["duration_min"], 14);
        assert!(value[0]["warmup_duration_sec"].is_null());

        let empty = engine.process_to_json(&[]).unwrap();
        assert_eq!(empty, "[]");
    }

    #[test]
    fn test_process_to_json_with_pretty_encoder() {
        let engine = SessionEngine::new(EngineConfig::default())
            .unwrap()
            .with_encoder(SessionEncoder::pretty());
        let samples = run(0, 14, 140.0, "Run");
        let json = engine.process_to_json(&samples).unwrap();
        assert!(json.contains("\n  "));

        let compact = SessionEngine::new(EngineConfig::default())
            .unwrap()
            .process_to_json(&samples)
            .unwrap();
        let pretty: serde_json::Value = serde_json::from_str(&json).unwrap();
        let plain: serde_json::Value = serde_json::from_str(&compact).unwrap();
        assert_eq!(pretty, plain);
    }

    #[test]
    fn test_streaming_engine_matches_batch() {
        let engine = SessionEngine::new(EngineConfig::default()).unwrap();
        let samples = mixed_day();

        let mut streaming = engine.streaming();
        let mut records = Vec::new();
        for sample in samples.clone() {
            records.extend(streaming.push(sample));
        }
        records.extend(streaming.finish());

        assert_eq!(records, engine.process(&samples));
        assert_eq!(streaming.dropped(), 0);
    }

    #[test]
    fn test_streaming_engine_drops_bad_samples() {
        let engine = SessionEngine::new(EngineConfig::default()).unwrap();
        let mut streaming = engine.streaming();

        let mut samples = run(0, 12, 140.0, "Run");
        samples.insert(3, Sample::new(t0() + Duration::minutes(2), Some(250.0), Some("Run")));
        samples.insert(6, Sample::new(t0(), Some(140.0), Some("Run")));
        samples.push(Sample::new(t0() + Duration::minutes(13), None, Some("Run")));

        let mut records = Vec::new();
        for sample in samples {
            records.extend(streaming.push(sample));
        }
        records.extend(streaming.finish());

        assert_eq!(streaming.dropped(), 3);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sample_count, 13);
    }
}
