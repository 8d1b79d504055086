//! Heart-rate zone model
//!
//! Five ascending bands derived from a maximum heart rate. Bounds are fixed
//! fractions of the maximum, each rounded to the nearest whole beat.

use serde::{Deserialize, Serialize};

use crate::config::ZoneFractions;
use crate::types::Zone;

/// One heart-rate band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBand {
    pub zone: Zone,
    /// Inclusive lower bound (bpm)
    pub lower_bound: f64,
    /// Exclusive upper bound (bpm); inclusive for Z5
    pub upper_bound: f64,
}

/// Zone bands derived from a max heart rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneModel {
    pub max_heart_rate: f64,
    pub bands: [ZoneBand; 5],
}

impl ZoneModel {
    /// Build zones with custom lower-bound fractions.
    ///
    /// Each band runs from its own fraction to the next band's fraction; Z5
    /// ends at `max_heart_rate`.
    pub fn with_fractions(max_heart_rate: f64, fractions: &ZoneFractions) -> Self {
        let bound = |fraction: f64| (max_heart_rate * fraction).round();
        let bands = Zone::ALL.map(|zone| {
            let i = zone.index();
            let upper_bound = match fractions.0.get(i + 1) {
                Some(next) => bound(*next),
                None => max_heart_rate,
            };
            ZoneBand {
                zone,
                lower_bound: bound(fractions.0[i]),
                upper_bound,
            }
        });

        Self {
            max_heart_rate,
            bands,
        }
    }

    pub fn band(&self, zone: Zone) -> &ZoneBand {
        &self.bands[zone.index()]
    }

    /// Classify a heart rate; see [`zone_of`]
    pub fn classify(&self, heart_rate: f64) -> Option<Zone> {
        zone_of(heart_rate, self)
    }
}

/// Standard five-zone model (50/60/70/80/90 % of max)
pub fn zones_for(max_heart_rate: f64) -> ZoneModel {
    ZoneModel::with_fractions(max_heart_rate, &ZoneFractions::default())
}

/// Zone a heart rate falls in, or `None` below Z1.
///
/// Bands are checked from highest to lowest, so anything at or above Z5's
/// lower bound (including values above the model maximum) is Z5.
pub fn zone_of(heart_rate: f64, model: &ZoneModel) -> Option<Zone> {
    model
        .bands
        .iter()
        .rev()
        .find(|band| heart_rate >= band.lower_bound)
        .map(|band| band.zone)
}
