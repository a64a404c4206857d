// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-scale feature extraction for cleaned solar-wind series.
//!
//! Produces the [`FeatureMatrix`] consumed by labeling, calibration,
//! and detection: rolling statistics across several time scales,
//! physics-derived scalars, cross-parameter correlations, wavelet
//! detail variances, and the composite enhancement scores the
//! statistical policy thresholds.

#![forbid(unsafe_code)]

mod ids;
mod matrix;
mod rolling;
mod wavelet;

pub use ids::{
    CorrPair, FeatureId, CORR_WINDOWS_M, GRADIENT_LAGS_M, KEY_FEATURES, MA_WINDOWS_M,
    STAT_WINDOWS_M, WAVELET_DETAIL_LEVELS, WAVELET_PARAMETERS,
};
pub use matrix::{FeatureColumn, FeatureMatrix};

use halo_core::{
    HaloError, Parameter, RunNotes, Series, BOLTZMANN_J_PER_K, PROTON_MASS_KG, SECONDS_PER_MINUTE,
};
use tracing::info;

/// Configuration for feature extraction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureConfig {
    /// Compute wavelet detail-variance columns. Even when set, the
    /// columns are omitted for series shorter than the decomposition
    /// minimum.
    pub wavelet: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { wavelet: true }
    }
}

/// Number of rows covered by a window of `minutes` at the series
/// cadence.
fn rows_per(minutes: u32, cadence_s: i64) -> Result<usize, HaloError> {
    let span_s = i64::from(minutes) * SECONDS_PER_MINUTE;
    if span_s < cadence_s || span_s % cadence_s != 0 {
        return Err(HaloError::invalid_input(format!(
            "cadence {cadence_s} s does not divide the {minutes} m feature window"
        )));
    }
    Ok((span_s / cadence_s) as usize)
}

fn column_of<'a>(
    columns: &'a [(FeatureId, Vec<f64>)],
    id: FeatureId,
) -> Result<&'a [f64], HaloError> {
    columns
        .iter()
        .find(|(candidate, _)| *candidate == id)
        .map(|(_, values)| values.as_slice())
        .ok_or_else(|| HaloError::numerical_issue(format!("column {} not computed", id.name())))
}

/// Extracts the full feature matrix from a cleaned series.
///
/// Columns are produced in [`FeatureId::schema`] order. Rolling windows
/// are centered and strict; composites are computed before the terminal
/// forward/backward fill so that fabricated boundary values never feed
/// into them. The fill itself is recorded in the matrix notes because
/// boundary rows carry copied, not measured, values.
pub fn extract_features(
    series: &Series,
    config: &FeatureConfig,
) -> Result<FeatureMatrix, HaloError> {
    let mut notes = RunNotes::new();
    let cadence_s = series.cadence_s();
    let mut columns: Vec<(FeatureId, Vec<f64>)> = Vec::with_capacity(72);

    for &p in &Parameter::ALL {
        columns.push((FeatureId::Raw(p), series.column(p).to_vec()));
    }

    for &w in &MA_WINDOWS_M {
        let width = rows_per(w, cadence_s)?;
        for &p in &Parameter::ALL {
            columns.push((
                FeatureId::MovingAverage(p, w),
                rolling::rolling_mean(series.column(p), width),
            ));
        }
    }

    for &p in &Parameter::ALL {
        for &lag_m in &GRADIENT_LAGS_M {
            let lag = rows_per(lag_m, cadence_s)?;
            columns.push((
                FeatureId::Gradient(p, lag_m),
                rolling::diff(series.column(p), lag),
            ));
        }
        for &lag_m in &GRADIENT_LAGS_M {
            let lag = rows_per(lag_m, cadence_s)?;
            columns.push((
                FeatureId::PctChange(p, lag_m),
                rolling::pct_change(series.column(p), lag),
            ));
        }
    }

    for &w in &STAT_WINDOWS_M {
        let width = rows_per(w, cadence_s)?;
        for &p in &Parameter::ALL {
            columns.push((
                FeatureId::MovingStd(p, w),
                rolling::rolling_std(series.column(p), width),
            ));
            columns.push((
                FeatureId::CoefVariation(p, w),
                rolling::rolling_cv(series.column(p), width),
            ));
        }
    }

    let velocity = series.column(Parameter::Velocity);
    let density = series.column(Parameter::Density);
    let temperature = series.column(Parameter::Temperature);

    let pressure: Vec<f64> = velocity
        .iter()
        .zip(density)
        .map(|(&v, &n)| dynamic_pressure_npa(v, n))
        .collect();
    columns.push((FeatureId::DynamicPressure, pressure));

    let thermal: Vec<f64> = temperature
        .iter()
        .map(|&t| thermal_speed_km_s(t))
        .collect();
    let ratio: Vec<f64> = velocity
        .iter()
        .zip(&thermal)
        .map(|(&v, &w)| finite_or_nan(v / w))
        .collect();
    columns.push((FeatureId::ThermalSpeed, thermal));
    columns.push((FeatureId::VelocityRatio, ratio));

    for &w in &CORR_WINDOWS_M {
        let width = rows_per(w, cadence_s)?;
        for &pair in &CorrPair::ALL {
            let (a, b) = pair.parameters();
            columns.push((
                FeatureId::Correlation(pair, w),
                rolling::rolling_corr(series.column(a), series.column(b), width),
            ));
        }
    }

    if config.wavelet {
        if series.n() < wavelet::MIN_SAMPLES {
            notes.note(format!(
                "wavelet columns omitted: {} rows below the {}-row minimum",
                series.n(),
                wavelet::MIN_SAMPLES
            ));
        } else {
            for &p in &WAVELET_PARAMETERS {
                let mut gap_free = series.column(p).to_vec();
                rolling::ffill_bfill(&mut gap_free);
                if let Some(variances) =
                    wavelet::detail_variances(&gap_free, usize::from(WAVELET_DETAIL_LEVELS))
                {
                    for (level, variance) in (1..).zip(variances) {
                        columns.push((
                            FeatureId::WaveletDetail(p, level),
                            vec![variance; series.n()],
                        ));
                    }
                }
            }
        }
    } else {
        notes.note("wavelet columns disabled by configuration");
    }

    // Composites come before the terminal fill so they only ever see
    // measured values.
    let velocity_ma_6h = column_of(&columns, FeatureId::MovingAverage(Parameter::Velocity, 360))?;
    let density_ma_6h = column_of(&columns, FeatureId::MovingAverage(Parameter::Density, 360))?;
    let velocity_gradient_3h =
        column_of(&columns, FeatureId::Gradient(Parameter::Velocity, 180))?;

    let velocity_enhancement: Vec<f64> = velocity
        .iter()
        .zip(velocity_ma_6h)
        .map(|(&v, &ma)| finite_or_nan(v / ma - 1.0))
        .collect();
    let density_enhancement: Vec<f64> = density
        .iter()
        .zip(density_ma_6h)
        .map(|(&n, &ma)| finite_or_nan(n / ma - 1.0))
        .collect();

    let mean_velocity = nan_mean(velocity);
    let anomaly: Vec<f64> = velocity_enhancement
        .iter()
        .zip(&density_enhancement)
        .zip(velocity_gradient_3h)
        .map(|((&ve, &de), &grad)| finite_or_nan(ve.abs() + de.abs() + (grad / mean_velocity).abs()))
        .collect();

    columns.push((FeatureId::VelocityEnhancement, velocity_enhancement));
    columns.push((FeatureId::DensityEnhancement, density_enhancement));
    columns.push((FeatureId::AnomalyScore, anomaly));

    let mut filled = 0;
    for (_, values) in &mut columns {
        filled += rolling::ffill_bfill(values);
    }
    if filled > 0 {
        notes.note(format!(
            "{filled} boundary or gap values copied by forward/backward fill"
        ));
    }

    info!(
        rows = series.n(),
        columns = columns.len(),
        filled,
        "extracted feature matrix"
    );
    FeatureMatrix::new(series.t0_s(), cadence_s, columns, notes)
}

/// Ram pressure of the proton flow in nPa, from density in cm^-3 and
/// bulk speed in km/s.
fn dynamic_pressure_npa(velocity_km_s: f64, density_cm3: f64) -> f64 {
    let density_m3 = density_cm3 * 1.0e6;
    let velocity_m_s = velocity_km_s * 1.0e3;
    density_m3 * PROTON_MASS_KG * velocity_m_s * velocity_m_s * 1.0e9
}

/// Most-probable proton thermal speed in km/s for a temperature in K.
fn thermal_speed_km_s(temperature_k: f64) -> f64 {
    (2.0 * BOLTZMANN_J_PER_K * temperature_k / PROTON_MASS_KG).sqrt() / 1.0e3
}

fn finite_or_nan(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        f64::NAN
    }
}

/// Mean of the finite values, NaN when there are none.
fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &value in values {
        if value.is_finite() {
            sum += value;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
