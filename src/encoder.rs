//! Session encoding
//!
//! Maps internal session records to the response shape returned to clients.
//! Timestamps are ISO-8601 UTC with millisecond precision.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::ComputeError;
use crate::types::{SessionRecord, SessionResponse};

/// Encoder for session responses
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionEncoder {
    pretty: bool,
}

impl SessionEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder that indents JSON output
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Map one record to its response shape
    pub fn encode(&self, record: &SessionRecord) -> SessionResponse {
        SessionResponse {
            sport: record.activity.clone(),
            session_start: iso8601(record.start_time),
            session_end: iso8601(record.end_time),
            duration_min: record.duration_minutes,
            avg_heart_rate: record.avg_heart_rate,
            calories_burned: record.calories_estimate,
            zones: record.zone_minutes.into(),
            recovery_drop_bpm: record.recovery_drop,
            intensity_score: record.intensity_score,
            trimp_score: record.training_load_score,
            fat_burn_ratio: record.fat_burn_ratio,
            cardio_ratio: record.cardio_ratio,
            bpm_std_dev: record.heart_rate_std_dev,
            warmup_duration_sec: record.warmup_duration,
        }
    }

    pub fn encode_all(&self, records: &[SessionRecord]) -> Vec<SessionResponse> {
        records.iter().map(|r| self.encode(r)).collect()
    }

    /// Encode one record to JSON
    pub fn encode_to_json(&self, record: &SessionRecord) -> Result<String, ComputeError> {
        self.to_json(&self.encode(record))
    }

    /// Encode records to a JSON array
    pub fn encode_all_to_json(&self, records: &[SessionRecord]) -> Result<String, ComputeError> {
        self.to_json(&self.encode_all(records))
    }

    fn to_json<T: serde::Serialize + ?Sized>(&self, value: &T) -> Result<String, ComputeError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        json.map_err(ComputeError::JsonError)
    }
}

fn iso8601(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Modeled, ZoneMinutes};
    use chrono::TimeZone;

    fn record() -> SessionRecord {
        SessionRecord {
            activity: Some("Run".to_string()),
            start_time: Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 1, 15, 7, 14, 0).unwrap(),
            duration_minutes: 14,
            sample_count: 15,
            avg_heart_rate: Some(140),
            peak_heart_rate: Some(140.0),
            calories_estimate: Some(224.0),
            zone_minutes: ZoneMinutes([0, 0, 14, 0, 0]),
            intensity_score: Some(74),
            training_load_score: Some(1032),
            fat_burn_ratio: 0.0,
            cardio_ratio: 1.0,
            heart_rate_std_dev: Some(0.0),
            recovery_drop: Modeled::NotModeled,
            warmup_duration: Modeled::NotModeled,
        }
    }

    #[test]
    fn test_encode_wire_shape() {
        let json = SessionEncoder::new().encode_to_json(&record()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["sport"], "Run");
        assert_eq!(value["session_start"], "2024-01-15T07:00:00.000Z");
        assert_eq!(value["session_end"], "2024-01-15T07:14:00.000Z");
        assert_eq!(value["duration_min"], 14);
        assert_eq!(value["avg_heart_rate"], 140);
        assert_eq!(value["calories_burned"], 224.0);
        assert_eq!(value["zones"]["Z3"], 14);
        assert_eq!(value["zones"]["Z5"], 0);
        assert_eq!(value["intensity_score"], 74);
        assert_eq!(value["trimp_score"], 1032);
        assert_eq!(value["cardio_ratio"], 1.0);
        assert_eq!(value["bpm_std_dev"], 0.0);
        assert!(value["recovery_drop_bpm"].is_null());
        assert!(value["warmup_duration_sec"].is_null());
    }

    #[test]
    fn test_missing_values_encode_as_null() {
        let mut r = record();
        r.activity = None;
        r.avg_heart_rate = None;
        r.calories_estimate = None;
        r.intensity_score = None;
        r.training_load_score = None;
        r.heart_rate_std_dev = None;

        let value = serde_json::to_value(SessionEncoder::new().encode(&r)).unwrap();
        for key in [
            "sport",
            "avg_heart_rate",
            "calories_burned",
            "intensity_score",
            "trimp_score",
            "bpm_std_dev",
        ] {
            assert!(value[key].is_null(), "{key} should be null");
        }
    }

    #[test]
    fn test_encode_all_to_json_array() {
        let json = SessionEncoder::pretty()
            .encode_all_to_json(&[record(), record()])
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert!(json.contains('\n'));
    }
}
