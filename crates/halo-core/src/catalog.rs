// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{HaloError, SUN_L1_DISTANCE_KM, TRAVEL_TIME_FACTOR};

/// One halo CME catalog entry, produced by the catalog collaborator and
/// read-only to the pipeline.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CmeEvent {
    onset_s: i64,
    speed_km_s: f64,
    angular_width_deg: f64,
    source_location: String,
}

impl CmeEvent {
    /// Constructs a validated catalog entry.
    ///
    /// `speed_km_s` must be finite and positive; the arrival estimate
    /// divides by it.
    pub fn new(
        onset_s: i64,
        speed_km_s: f64,
        angular_width_deg: f64,
        source_location: impl Into<String>,
    ) -> Result<Self, HaloError> {
        if !speed_km_s.is_finite() || speed_km_s <= 0.0 {
            return Err(HaloError::invalid_input(format!(
                "CME speed must be finite and > 0 km/s, got {speed_km_s}"
            )));
        }
        if !angular_width_deg.is_finite() || !(0.0..=360.0).contains(&angular_width_deg) {
            return Err(HaloError::invalid_input(format!(
                "CME angular width must be in [0, 360] degrees, got {angular_width_deg}"
            )));
        }

        Ok(Self {
            onset_s,
            speed_km_s,
            angular_width_deg,
            source_location: source_location.into(),
        })
    }

    pub fn onset_s(&self) -> i64 {
        self.onset_s
    }

    pub fn speed_km_s(&self) -> f64 {
        self.speed_km_s
    }

    pub fn angular_width_deg(&self) -> f64 {
        self.angular_width_deg
    }

    pub fn source_location(&self) -> &str {
        &self.source_location
    }

    /// Estimated L1 arrival in Unix epoch seconds, from the empirical
    /// kinematic model `arrival = onset + 1.4 * distance / speed`.
    pub fn estimated_arrival_s(&self) -> i64 {
        let travel_s = TRAVEL_TIME_FACTOR * SUN_L1_DISTANCE_KM / self.speed_km_s;
        self.onset_s + travel_s.round() as i64
    }
}
