//! Engine configuration
//!
//! Detection thresholds, zone fractions, the calorie table and the zone
//! allocation strategy are carried as one injectable value. Every value is
//! validated before any sample is processed.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Default minimum session length (minutes)
pub const DEFAULT_MIN_SESSION_MINUTES: f64 = 10.0;
/// Default largest gap tolerated inside a session (minutes)
pub const DEFAULT_MAX_GAP_MINUTES: f64 = 5.0;
/// Default lowest plausible heart rate (bpm)
pub const DEFAULT_MIN_HEART_RATE: f64 = 50.0;
/// Default highest plausible heart rate (bpm)
pub const DEFAULT_MAX_HEART_RATE: f64 = 220.0;
/// Default max heart rate used to derive zones (bpm)
pub const DEFAULT_ZONE_MAX_HEART_RATE: f64 = 190.0;

/// Lower bound of each zone as a fraction of max heart rate
pub const DEFAULT_ZONE_FRACTIONS: [f64; 5] = [0.50, 0.60, 0.70, 0.80, 0.90];
/// Energy expenditure per zone, low to high (kcal/min)
pub const DEFAULT_CALORIES_PER_MINUTE: [f64; 5] = [8.0, 12.0, 16.0, 20.0, 25.0];

const MS_PER_MINUTE: f64 = 60_000.0;

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative finite number of minutes, got {value}")]
    InvalidDuration { name: &'static str, value: f64 },

    #[error("{name} must be a positive finite heart rate, got {value}")]
    InvalidHeartRate { name: &'static str, value: f64 },

    #[error("Heart-rate range is inverted: min {min} > max {max}")]
    InvertedHeartRateRange { min: f64, max: f64 },

    #[error("Zone fractions must be strictly ascending within (0, 1], got {0:?}")]
    InvalidZoneFractions([f64; 5]),

    #[error("Calorie rates must be non-negative finite numbers, got {0:?}")]
    InvalidCalorieTable([f64; 5]),

    #[error("Unknown zone allocation strategy: {0}")]
    UnknownAllocation(String),
}

/// Thresholds for splitting a sample stream into sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetectionConfig {
    /// Candidates spanning less than this are discarded (minutes)
    pub min_session_minutes: f64,
    /// A gap strictly larger than this closes the session (minutes)
    pub max_gap_minutes: f64,
    /// Samples below this heart rate are not plausible (bpm)
    pub min_heart_rate: f64,
    /// Samples above this heart rate are not plausible (bpm)
    pub max_heart_rate: f64,
}

impl Default for SessionDetectionConfig {
    fn default() -> Self {
        Self {
            min_session_minutes: DEFAULT_MIN_SESSION_MINUTES,
            max_gap_minutes: DEFAULT_MAX_GAP_MINUTES,
            min_heart_rate: DEFAULT_MIN_HEART_RATE,
            max_heart_rate: DEFAULT_MAX_HEART_RATE,
        }
    }
}

impl SessionDetectionConfig {
    pub fn min_session_duration(&self) -> chrono::Duration {
        minutes_to_duration(self.min_session_minutes)
    }

    pub fn max_gap(&self) -> chrono::Duration {
        minutes_to_duration(self.max_gap_minutes)
    }

    /// Whether a heart rate lies inside the plausible range (inclusive)
    pub fn is_plausible(&self, heart_rate: f64) -> bool {
        heart_rate >= self.min_heart_rate && heart_rate <= self.max_heart_rate
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_minutes("min_session_minutes", self.min_session_minutes)?;
        check_minutes("max_gap_minutes", self.max_gap_minutes)?;
        check_heart_rate("min_heart_rate", self.min_heart_rate)?;
        check_heart_rate("max_heart_rate", self.max_heart_rate)?;
        if self.min_heart_rate > self.max_heart_rate {
            return Err(ConfigError::InvertedHeartRateRange {
                min: self.min_heart_rate,
                max: self.max_heart_rate,
            });
        }
        Ok(())
    }
}

/// Zone lower bounds as fractions of max heart rate, Z1 to Z5
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneFractions(pub [f64; 5]);

impl Default for ZoneFractions {
    fn default() -> Self {
        Self(DEFAULT_ZONE_FRACTIONS)
    }
}

impl ZoneFractions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = self.0.iter().all(|f| f.is_finite() && *f > 0.0 && *f <= 1.0);
        let ascending = self.0.windows(2).all(|w| w[0] < w[1]);
        if in_range && ascending {
            Ok(())
        } else {
            Err(ConfigError::InvalidZoneFractions(self.0))
        }
    }
}

/// Energy expenditure per zone (kcal/min), Z1 to Z5
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalorieTable(pub [f64; 5]);

impl Default for CalorieTable {
    fn default() -> Self {
        Self(DEFAULT_CALORIES_PER_MINUTE)
    }
}

impl CalorieTable {
    pub fn per_minute(&self, zone: crate::types::Zone) -> f64 {
        self.0[zone.index()]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.0.iter().all(|r| r.is_finite() && *r >= 0.0) {
            Ok(())
        } else {
            Err(ConfigError::InvalidCalorieTable(self.0))
        }
    }
}

/// How elapsed session time is credited to zones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneAllocation {
    /// Session duration split evenly across samples
    Uniform,
    /// Each sample credited with the time until the next sample
    #[default]
    SampleInterval,
}

impl FromStr for ZoneAllocation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(ZoneAllocation::Uniform),
            "sample_interval" | "interval" => Ok(ZoneAllocation::SampleInterval),
            other => Err(ConfigError::UnknownAllocation(other.to_string())),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Session detection thresholds
    pub detection: SessionDetectionConfig,
    /// Max heart rate the zone model is derived from (bpm)
    pub zone_max_heart_rate: f64,
    /// Zone lower bounds as fractions of `zone_max_heart_rate`
    pub zone_fractions: ZoneFractions,
    /// kcal/min per zone
    pub calorie_table: CalorieTable,
    /// Zone-minute allocation strategy
    pub zone_allocation: ZoneAllocation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detection: SessionDetectionConfig::default(),
            zone_max_heart_rate: DEFAULT_ZONE_MAX_HEART_RATE,
            zone_fractions: ZoneFractions::default(),
            calorie_table: CalorieTable::default(),
            zone_allocation: ZoneAllocation::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `PULSE_*` environment variables.
    ///
    /// Unset variables keep their defaults; unparsable ones are logged and
    /// ignored. The result still needs [`EngineConfig::validate`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detection: SessionDetectionConfig {
                min_session_minutes: env_or(
                    "PULSE_MIN_SESSION_MINUTES",
                    defaults.detection.min_session_minutes,
                ),
                max_gap_minutes: env_or("PULSE_MAX_GAP_MINUTES", defaults.detection.max_gap_minutes),
                min_heart_rate: env_or("PULSE_MIN_HEART_RATE", defaults.detection.min_heart_rate),
                max_heart_rate: env_or("PULSE_MAX_HEART_RATE", defaults.detection.max_heart_rate),
            },
            zone_max_heart_rate: env_or("PULSE_ZONE_MAX_HEART_RATE", defaults.zone_max_heart_rate),
            zone_allocation: env_or("PULSE_ZONE_ALLOCATION", defaults.zone_allocation),
            ..defaults
        }
    }

    pub fn with_detection(mut self, detection: SessionDetectionConfig) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_zone_max_heart_rate(mut self, max_heart_rate: f64) -> Self {
        self.zone_max_heart_rate = max_heart_rate;
        self
    }

    pub fn with_zone_fractions(mut self, fractions: ZoneFractions) -> Self {
        self.zone_fractions = fractions;
        self
    }

    pub fn with_calorie_table(mut self, table: CalorieTable) -> Self {
        self.calorie_table = table;
        self
    }

    pub fn with_zone_allocation(mut self, allocation: ZoneAllocation) -> Self {
        self.zone_allocation = allocation;
        self
    }

    /// Check every field; the first violation wins
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;
        check_heart_rate("zone_max_heart_rate", self.zone_max_heart_rate)?;
        self.zone_fractions.validate()?;
        self.calorie_table.validate()
    }
}

fn minutes_to_duration(minutes: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((minutes * MS_PER_MINUTE).round() as i64)
}

fn check_minutes(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDuration { name, value })
    }
}

fn check_heart_rate(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidHeartRate { name, value })
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection.min_session_duration(), chrono::Duration::minutes(10));
        assert_eq!(config.detection.max_gap(), chrono::Duration::minutes(5));
        assert_eq!(config.zone_max_heart_rate, 190.0);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let detection = SessionDetectionConfig {
            min_session_minutes: -1.0,
            ..Default::default()
        };
        let config = EngineConfig::default().with_detection(detection);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidDuration {
                name: "min_session_minutes",
                value: -1.0
            })
        );
    }

    #[test]
    fn test_non_finite_gap_rejected() {
        let detection = SessionDetectionConfig {
            max_gap_minutes: f64::NAN,
            ..Default::default()
        };
        assert!(detection.validate().is_err());
    }

    #[test]
    fn test_inverted_heart_rate_range_rejected() {
        let detection = SessionDetectionConfig {
            min_heart_rate: 180.0,
            max_heart_rate: 120.0,
            ..Default::default()
        };
        assert_eq!(
            detection.validate(),
            Err(ConfigError::InvertedHeartRateRange {
                min: 180.0,
                max: 120.0
            })
        );
    }

    #[test]
    fn test_zone_fractions_must_ascend() {
        assert!(ZoneFractions([0.5, 0.6, 0.6, 0.8, 0.9]).validate().is_err());
        assert!(ZoneFractions([0.5, 0.6, 0.7, 0.8, 1.1]).validate().is_err());
        assert!(ZoneFractions([0.55, 0.65, 0.75, 0.85, 0.95]).validate().is_ok());
    }

    #[test]
    fn test_negative_calorie_rate_rejected() {
        let config = EngineConfig::default()
            .with_calorie_table(CalorieTable([8.0, 12.0, -1.0, 20.0, 25.0]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCalorieTable(_))
        ));
    }

    #[test]
    fn test_zero_zone_max_heart_rate_rejected() {
        let config = EngineConfig::default().with_zone_max_heart_rate(0.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHeartRate {
                name: "zone_max_heart_rate",
                ..
            })
        ));
    }

    #[test]
    fn test_plausible_range_is_inclusive() {
        let detection = SessionDetectionConfig::default();
        assert!(detection.is_plausible(50.0));
        assert!(detection.is_plausible(220.0));
        assert!(!detection.is_plausible(49.9));
        assert!(!detection.is_plausible(220.5));
    }

    #[test]
    fn test_parse_zone_allocation() {
        assert_eq!("uniform".parse::<ZoneAllocation>(), Ok(ZoneAllocation::Uniform));
        assert_eq!(
            "Sample_Interval".parse::<ZoneAllocation>(),
            Ok(ZoneAllocation::SampleInterval)
        );
        assert!("weighted".parse::<ZoneAllocation>().is_err());
    }

    // Every PULSE_* variable is touched by this test alone; tests run in parallel
    #[test]
    fn test_from_env_overrides_and_fallbacks() {
        env::set_var("PULSE_MAX_GAP_MINUTES", "abc");
        env::set_var("PULSE_ZONE_ALLOCATION", "uniform");
        env::set_var("PULSE_ZONE_MAX_HEART_RATE", "185");
        env::remove_var("PULSE_MIN_SESSION_MINUTES");

        let config = EngineConfig::from_env();
        let engine = crate::pipeline::SessionEngine::from_env();

        env::remove_var("PULSE_MAX_GAP_MINUTES");
        env::remove_var("PULSE_ZONE_ALLOCATION");
        env::remove_var("PULSE_ZONE_MAX_HEART_RATE");

        assert_eq!(config.detection.max_gap_minutes, DEFAULT_MAX_GAP_MINUTES);
        assert_eq!(config.detection.min_session_minutes, DEFAULT_MIN_SESSION_MINUTES);
        assert_eq!(config.zone_allocation, ZoneAllocation::Uniform);
        assert_eq!(config.zone_max_heart_rate, 185.0);

        let engine = engine.unwrap();
        assert_eq!(engine.config(), &config);
    }

    #[test]
    fn test_config_json_roundtrip_shape() {
        let json = serde_json::to_value(EngineConfig::default()).unwrap();
        assert_eq!(json["detection"]["max_gap_minutes"], 5.0);
        assert_eq!(json["zone_allocation"], "sample_interval");
        assert_eq!(json["calorie_table"][4], 25.0);
    }
}
