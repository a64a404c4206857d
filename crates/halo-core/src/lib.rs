// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared data model for the halo CME detection pipeline: solar-wind
//! samples, uniform-cadence series, catalog events, physical constants,
//! and the pipeline error taxonomy.

mod catalog;
mod error;
mod notes;
mod sample;
mod series;

pub use catalog::CmeEvent;
pub use error::HaloError;
pub use notes::RunNotes;
pub use sample::{Parameter, Sample};
pub use series::Series;

/// Proton rest mass in kilograms.
pub const PROTON_MASS_KG: f64 = 1.673e-27;

/// Boltzmann constant in joules per kelvin.
pub const BOLTZMANN_J_PER_K: f64 = 1.381e-23;

/// Sun to L1 propagation distance in kilometers.
pub const SUN_L1_DISTANCE_KM: f64 = 1.496e8;

/// Empirical slowdown factor applied to the ballistic travel time.
pub const TRAVEL_TIME_FACTOR: f64 = 1.4;

/// Seconds per minute, used when converting window lengths to samples.
pub const SECONDS_PER_MINUTE: i64 = 60;
