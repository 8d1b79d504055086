//! Core types for the Synheart Pulse engine
//!
//! This module defines the data structures that flow through each stage of
//! session detection: raw samples, open session candidates, summarized
//! session records and the wire response shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single heart-rate telemetry sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the sample was recorded (UTC)
    pub timestamp: DateTime<Utc>,
    /// Heart rate (bpm)
    #[serde(default, alias = "bpm")]
    pub heart_rate: Option<f64>,
    /// Activity / sport label attached by the recording device
    #[serde(default, alias = "sport")]
    pub activity: Option<String>,
    /// Latitude (degrees)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude (degrees)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Speed (m/s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl Sample {
    /// Create a sample carrying only a timestamp, heart rate and activity tag
    pub fn new(timestamp: DateTime<Utc>, heart_rate: Option<f64>, activity: Option<&str>) -> Self {
        Self {
            timestamp,
            heart_rate,
            activity: activity.map(str::to_string),
            latitude: None,
            longitude: None,
            speed: None,
        }
    }

    /// Heart rate if it is usable for averaging (present and above zero)
    pub fn valid_heart_rate(&self) -> Option<f64> {
        self.heart_rate.filter(|hr| hr.is_finite() && *hr > 0.0)
    }
}

/// Heart-rate zone, lowest (recovery) to highest (near-maximal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Zone {
    Z1,
    Z2,
    Z3,
    Z4,
    Z5,
}

impl Zone {
    /// All zones in ascending order
    pub const ALL: [Zone; 5] = [Zone::Z1, Zone::Z2, Zone::Z3, Zone::Z4, Zone::Z5];

    /// Zero-based index into per-zone arrays
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Zone::Z1 => "Z1",
            Zone::Z2 => "Z2",
            Zone::Z3 => "Z3",
            Zone::Z4 => "Z4",
            Zone::Z5 => "Z5",
        }
    }

    /// Whether time in this zone counts toward the fat-burn share
    pub fn is_fat_burn(self) -> bool {
        matches!(self, Zone::Z1 | Zone::Z2)
    }
}

/// Whole minutes spent in each zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneMinutes(pub [u32; 5]);

impl ZoneMinutes {
    pub fn get(&self, zone: Zone) -> u32 {
        self.0[zone.index()]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Minutes in Z1 + Z2
    pub fn fat_burn(&self) -> u32 {
        Zone::ALL
            .iter()
            .filter(|z| z.is_fat_burn())
            .map(|z| self.get(*z))
            .sum()
    }

    /// Minutes in Z3 + Z4 + Z5
    pub fn cardio(&self) -> u32 {
        self.total() - self.fat_burn()
    }
}

/// A value the engine declares in its output but does not compute yet.
///
/// `NotModeled` serializes as `null`, keeping the field in the schema
/// without pretending a zero was measured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Modeled<T> {
    NotModeled,
    Value(T),
}

impl<T> Default for Modeled<T> {
    fn default() -> Self {
        Modeled::NotModeled
    }
}

impl<T: Copy> Modeled<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Modeled::NotModeled => None,
            Modeled::Value(v) => Some(*v),
        }
    }
}

/// An open session while the segmenter is building it
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCandidate {
    /// Activity tag shared by every sample in the candidate
    pub activity: Option<String>,
    /// Timestamp of the first sample
    pub start_time: DateTime<Utc>,
    /// Timestamp of the most recent sample
    pub last_sample_time: DateTime<Utc>,
    /// Samples in arrival order
    pub samples: Vec<Sample>,
}

impl SessionCandidate {
    /// Open a candidate seeded by its first sample
    pub fn open(sample: Sample) -> Self {
        Self {
            activity: sample.activity.clone(),
            start_time: sample.timestamp,
            last_sample_time: sample.timestamp,
            samples: vec![sample],
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.last_sample_time = sample.timestamp;
        self.samples.push(sample);
    }

    /// Elapsed time between first and last sample
    pub fn span(&self) -> chrono::Duration {
        self.last_sample_time - self.start_time
    }
}

/// Summary of one detected exercise session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Activity / sport tag
    pub activity: Option<String>,
    /// First sample time (UTC)
    pub start_time: DateTime<Utc>,
    /// Last sample time (UTC)
    pub end_time: DateTime<Utc>,
    /// Rounded whole minutes between start and end
    pub duration_minutes: u32,
    /// Number of samples in the session
    pub sample_count: usize,
    /// Mean heart rate over valid samples (bpm, rounded)
    pub avg_heart_rate: Option<u32>,
    /// Highest valid heart rate (bpm)
    pub peak_heart_rate: Option<f64>,
    /// Estimated energy expenditure (kcal)
    pub calories_estimate: Option<f64>,
    /// Minutes per heart-rate zone
    pub zone_minutes: ZoneMinutes,
    /// Average heart rate as a percentage of max heart rate
    pub intensity_score: Option<u32>,
    /// Duration-weighted relative intensity
    pub training_load_score: Option<u32>,
    /// Share of zone time in Z1-Z2 (2 decimals)
    pub fat_burn_ratio: f64,
    /// Share of zone time in Z3-Z5 (2 decimals)
    pub cardio_ratio: f64,
    /// Population standard deviation of heart rate (1 decimal)
    pub heart_rate_std_dev: Option<f64>,
    /// Heart-rate drop after effort (bpm)
    pub recovery_drop: Modeled<f64>,
    /// Time to reach working intensity (seconds)
    pub warmup_duration: Modeled<u32>,
}

/// Per-zone minutes on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneBreakdown {
    #[serde(rename = "Z1")]
    pub z1: u32,
    #[serde(rename = "Z2")]
    pub z2: u32,
    #[serde(rename = "Z3")]
    pub z3: u32,
    #[serde(rename = "Z4")]
    pub z4: u32,
    #[serde(rename = "Z5")]
    pub z5: u32,
}

impl From<ZoneMinutes> for ZoneBreakdown {
    fn from(minutes: ZoneMinutes) -> Self {
        let [z1, z2, z3, z4, z5] = minutes.0;
        Self { z1, z2, z3, z4, z5 }
    }
}

/// Session as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub sport: Option<String>,
    pub session_start: String,
    pub session_end: String,
    pub duration_min: u32,
    pub avg_heart_rate: Option<u32>,
    pub calories_burned: Option<f64>,
    pub zones: ZoneBreakdown,
    pub recovery_drop_bpm: Modeled<f64>,
    pub intensity_score: Option<u32>,
    pub trimp_score: Option<u32>,
    pub fat_burn_ratio: f64,
    pub cardio_ratio: f64,
    pub bpm_std_dev: Option<f64>,
    pub warmup_duration_sec: Modeled<u32>,
}
