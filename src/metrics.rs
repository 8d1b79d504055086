//! Session metrics
//!
//! Turns one session candidate into a [`SessionRecord`]:
//! - Heart-rate average, peak and population standard deviation
//! - Time in each heart-rate zone
//! - Energy estimate from the per-zone calorie table
//! - Fat-burn / cardio split
//! - Intensity and training-load scores
//!
//! Nothing here fails. A metric without enough data is `None`.

use tracing::debug;

use crate::config::{CalorieTable, EngineConfig, ZoneAllocation};
use crate::types::{Modeled, Sample, SessionCandidate, SessionRecord, Zone, ZoneMinutes};
use crate::zones::{zone_of, ZoneModel};

const MS_PER_MINUTE: f64 = 60_000.0;

/// Summarizer bound to one zone model, calorie table and allocation strategy
#[derive(Debug, Clone)]
pub struct SessionSummarizer {
    zones: ZoneModel,
    calories: CalorieTable,
    allocation: ZoneAllocation,
}

impl SessionSummarizer {
    pub fn new(zones: ZoneModel, calories: CalorieTable, allocation: ZoneAllocation) -> Self {
        Self {
            zones,
            calories,
            allocation,
        }
    }

    /// Build the zone model and table described by an engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            ZoneModel::with_fractions(config.zone_max_heart_rate, &config.zone_fractions),
            config.calorie_table,
            config.zone_allocation,
        )
    }

    pub fn zones(&self) -> &ZoneModel {
        &self.zones
    }

    /// Summarize one session candidate
    pub fn summarize(&self, candidate: &SessionCandidate) -> SessionRecord {
        let valid: Vec<f64> = candidate
            .samples
            .iter()
            .filter_map(Sample::valid_heart_rate)
            .collect();

        let duration_ms = candidate.span().num_milliseconds().max(0);
        let duration_minutes = (duration_ms as f64 / MS_PER_MINUTE).round() as u32;

        let avg_heart_rate = compute_average(&valid);
        let zone_minutes = match self.allocation {
            ZoneAllocation::Uniform => allocate_uniform(candidate, duration_ms, &self.zones),
            ZoneAllocation::SampleInterval => allocate_by_interval(candidate, &self.zones),
        };
        let calories_estimate = avg_heart_rate.map(|_| compute_calories(&zone_minutes, &self.calories));
        let (fat_burn_ratio, cardio_ratio) = compute_ratios(&zone_minutes);

        let max_hr = self.zones.max_heart_rate;
        let intensity_score =
            avg_heart_rate.map(|avg| (f64::from(avg) / max_hr * 100.0).round() as u32);
        let training_load_score = avg_heart_rate
            .map(|avg| (f64::from(duration_minutes) * (f64::from(avg) / max_hr) * 100.0).round() as u32);

        let record = SessionRecord {
            activity: candidate.activity.clone(),
            start_time: candidate.start_time,
            end_time: candidate.last_sample_time,
            duration_minutes,
            sample_count: candidate.samples.len(),
            avg_heart_rate,
            peak_heart_rate: valid.iter().copied().reduce(f64::max),
            calories_estimate,
            zone_minutes,
            intensity_score,
            training_load_score,
            fat_burn_ratio,
            cardio_ratio,
            heart_rate_std_dev: compute_std_dev(&valid),
            recovery_drop: Modeled::NotModeled,
            warmup_duration: Modeled::NotModeled,
        };

        debug!(
            activity = record.activity.as_deref().unwrap_or("untagged"),
            start = %record.start_time,
            duration_min = record.duration_minutes,
            avg_hr = ?record.avg_heart_rate,
            "Summarized session"
        );

        record
    }
}

/// Summarize a candidate with an explicit zone model and calorie table.
///
/// Zone time is credited per sample interval; use [`SessionSummarizer`] to
/// pick another allocation strategy.
pub fn summarize(
    candidate: &SessionCandidate,
    zones: &ZoneModel,
    calories: &CalorieTable,
) -> SessionRecord {
    SessionSummarizer::new(zones.clone(), *calories, ZoneAllocation::default()).summarize(candidate)
}

/// Mean of valid heart rates rounded to whole beats
fn compute_average(valid: &[f64]) -> Option<u32> {
    if valid.is_empty() {
        return None;
    }
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    Some(mean.round() as u32)
}

/// Population standard deviation (divides by N, not N - 1), one decimal
fn compute_std_dev(valid: &[f64]) -> Option<f64> {
    if valid.len() < 2 {
        return None;
    }
    let n = valid.len() as f64;
    let mean = valid.iter().sum::<f64>() / n;
    let variance = valid.iter().map(|hr| (hr - mean).powi(2)).sum::<f64>() / n;
    Some(round_to(variance.sqrt(), 1))
}

/// Split elapsed time evenly across samples and credit each to its zone.
///
/// Assumes roughly even sampling; irregular spacing biases the totals.
fn allocate_uniform(candidate: &SessionCandidate, duration_ms: i64, zones: &ZoneModel) -> ZoneMinutes {
    let mut zone_ms = [0.0_f64; 5];
    let per_sample_ms = duration_ms as f64 / candidate.samples.len().max(1) as f64;

    for sample in &candidate.samples {
        if let Some(zone) = sample.valid_heart_rate().and_then(|hr| zone_of(hr, zones)) {
            zone_ms[zone.index()] += per_sample_ms;
        }
    }

    to_minutes(zone_ms)
}

/// Credit each sample with the time until the next sample.
///
/// The last sample closes the session and contributes nothing.
fn allocate_by_interval(candidate: &SessionCandidate, zones: &ZoneModel) -> ZoneMinutes {
    let mut zone_ms = [0.0_f64; 5];

    for pair in candidate.samples.windows(2) {
        let interval_ms = (pair[1].timestamp - pair[0].timestamp).num_milliseconds().max(0);
        if let Some(zone) = pair[0].valid_heart_rate().and_then(|hr| zone_of(hr, zones)) {
            zone_ms[zone.index()] += interval_ms as f64;
        }
    }

    to_minutes(zone_ms)
}

fn to_minutes(zone_ms: [f64; 5]) -> ZoneMinutes {
    ZoneMinutes(zone_ms.map(|ms| (ms / MS_PER_MINUTE).round() as u32))
}

fn compute_calories(minutes: &ZoneMinutes, table: &CalorieTable) -> f64 {
    Zone::ALL
        .iter()
        .map(|zone| f64::from(minutes.get(*zone)) * table.per_minute(*zone))
        .sum()
}

/// Fat-burn (Z1-Z2) and cardio (Z3-Z5) shares of zone time
fn compute_ratios(minutes: &ZoneMinutes) -> (f64, f64) {
    let total = minutes.total();
    if total == 0 {
        return (0.0, 0.0);
    }
    let total = f64::from(total);
    (
        round_to(f64::from(minutes.fat_burn()) / total, 2),
        round_to(f64::from(minutes.cardio()) / total, 2),
    )
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
