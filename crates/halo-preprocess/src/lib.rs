// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cleaning and uniform resampling of raw solar-wind samples.
//!
//! The preprocessor takes instrument readings in arbitrary order, with
//! duplicates, physically impossible values, and gaps, and produces a
//! [`Series`] on a fixed cadence together with a [`QualityReport`]
//! describing what the cleaning removed and what remains missing.

#![forbid(unsafe_code)]

use halo_core::{HaloError, Parameter, RunNotes, Sample, Series};
use tracing::{debug, info};

/// Configuration for the cleaning and resampling stage.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PreprocessConfig {
    /// Output cadence in seconds.
    pub cadence_s: i64,
    /// Longest interior gap, in seconds, filled by linear interpolation.
    pub max_gap_s: i64,
    /// Z-score magnitude beyond which a value is rejected as an outlier.
    pub outlier_sigma: f64,
    /// Outlier rejection runs only when a parameter has strictly more
    /// valid values than this; statistics on tiny columns are noise.
    pub min_outlier_samples: usize,
    /// Shortest all-parameter gap, in seconds, recorded in the quality
    /// report.
    pub significant_gap_s: i64,
    /// Per-parameter availability below which an issue is reported.
    pub low_completeness: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            cadence_s: 60,
            max_gap_s: 1800,
            outlier_sigma: 5.0,
            min_outlier_samples: 10,
            significant_gap_s: 600,
            low_completeness: 0.7,
        }
    }
}

impl PreprocessConfig {
    fn validate(&self) -> Result<(), HaloError> {
        if self.cadence_s <= 0 {
            return Err(HaloError::invalid_config(format!(
                "cadence_s must be > 0, got {}",
                self.cadence_s
            )));
        }
        if self.max_gap_s < 0 {
            return Err(HaloError::invalid_config(format!(
                "max_gap_s must be >= 0, got {}",
                self.max_gap_s
            )));
        }
        if !self.outlier_sigma.is_finite() || self.outlier_sigma <= 0.0 {
            return Err(HaloError::invalid_config(format!(
                "outlier_sigma must be finite and > 0, got {}",
                self.outlier_sigma
            )));
        }
        if self.significant_gap_s < self.cadence_s {
            return Err(HaloError::invalid_config(format!(
                "significant_gap_s must be >= cadence_s, got {}",
                self.significant_gap_s
            )));
        }
        if !(0.0..=1.0).contains(&self.low_completeness) {
            return Err(HaloError::invalid_config(format!(
                "low_completeness must be in [0, 1], got {}",
                self.low_completeness
            )));
        }
        Ok(())
    }
}

/// A run of consecutive rows where every parameter is missing.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GapSpan {
    /// Timestamp of the first missing row.
    pub start_s: i64,
    /// Timestamp of the first row after the gap.
    pub end_s: i64,
    /// Number of missing rows in the gap.
    pub missing_rows: usize,
}

/// Data-quality summary for a preprocessed series.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct QualityReport {
    completeness: [f64; 4],
    gaps: Vec<GapSpan>,
    issues: Vec<String>,
}

impl QualityReport {
    fn from_series(series: &Series, config: &PreprocessConfig) -> Self {
        let mut completeness = [0.0; 4];
        let mut issues = Vec::new();
        for &parameter in &Parameter::ALL {
            let availability = series.availability(parameter);
            completeness[parameter.index()] = availability;
            if availability < config.low_completeness {
                issues.push(format!(
                    "{} availability {:.2} below {:.2}",
                    parameter.label(),
                    availability,
                    config.low_completeness
                ));
            }
        }

        let gaps = find_gaps(series, config.significant_gap_s);
        if !gaps.is_empty() {
            issues.push(format!(
                "{} gaps of {} s or longer with no data at all",
                gaps.len(),
                config.significant_gap_s
            ));
        }

        Self {
            completeness,
            gaps,
            issues,
        }
    }

    /// Fraction of rows with a present value for `parameter`.
    pub fn availability(&self, parameter: Parameter) -> f64 {
        self.completeness[parameter.index()]
    }

    /// Mean per-parameter availability.
    pub fn overall_completeness(&self) -> f64 {
        self.completeness.iter().sum::<f64>() / self.completeness.len() as f64
    }

    /// Spans where every parameter is missing, in time order.
    pub fn gaps(&self) -> &[GapSpan] {
        &self.gaps
    }

    /// Human-readable quality problems, empty when the series is clean.
    pub fn issues(&self) -> &[String] {
        &self.issues
    }
}

/// Output of [`preprocess`]: the cleaned series plus its quality report
/// and the notes accumulated while cleaning.
#[derive(Clone, Debug, PartialEq)]
pub struct Preprocessed {
    pub series: Series,
    pub quality: QualityReport,
    pub notes: RunNotes,
}

/// Cleans and resamples raw samples onto a uniform cadence.
///
/// Steps, in order: rows with no valid parameter are dropped;
/// out-of-range values become missing while the rest of the row
/// survives; per-parameter outliers beyond `outlier_sigma` standard
/// deviations become missing; rows are sorted by timestamp and
/// duplicate timestamps keep the first occurrence; rows are averaged
/// into cadence-aligned buckets; interior gaps up to `max_gap_s` are
/// filled by linear interpolation. Gaps at either end are never
/// extrapolated.
///
/// Returns [`HaloError::DataUnavailable`] when no valid value survives
/// cleaning.
pub fn preprocess(samples: &[Sample], config: &PreprocessConfig) -> Result<Preprocessed, HaloError> {
    config.validate()?;
    let mut notes = RunNotes::new();

    let mut rows: Vec<(i64, [f64; 4])> = Vec::with_capacity(samples.len());
    for sample in samples {
        if sample.is_all_missing() {
            continue;
        }
        let mut row = [f64::NAN; 4];
        for &parameter in &Parameter::ALL {
            if let Some(value) = sample.value(parameter) {
                if value.is_finite() {
                    row[parameter.index()] = value;
                }
            }
        }
        rows.push((sample.epoch_s, row));
    }
    let dropped_empty = samples.len() - rows.len();
    if dropped_empty > 0 {
        notes.note(format!(
            "dropped {dropped_empty} rows with no valid parameter"
        ));
    }

    let range_rejected = reject_out_of_range(&mut rows);
    for &parameter in &Parameter::ALL {
        let rejected = range_rejected[parameter.index()];
        if rejected > 0 {
            let (lo, hi) = parameter.bounds();
            notes.note(format!(
                "{}: {rejected} values outside [{lo}, {hi}] {} removed",
                parameter.label(),
                parameter.unit()
            ));
        }
    }

    let outliers = reject_outliers(&mut rows, config.outlier_sigma, config.min_outlier_samples);
    for &parameter in &Parameter::ALL {
        let rejected = outliers[parameter.index()];
        if rejected > 0 {
            notes.note(format!(
                "{}: {rejected} outliers beyond {} sigma removed",
                parameter.label(),
                config.outlier_sigma
            ));
        }
    }

    rows.sort_by_key(|&(epoch_s, _)| epoch_s);
    let before_dedup = rows.len();
    rows.dedup_by_key(|&mut (epoch_s, _)| epoch_s);
    let duplicates = before_dedup - rows.len();
    if duplicates > 0 {
        notes.warn(format!(
            "{duplicates} duplicate timestamps dropped, first occurrence kept"
        ));
    }

    let any_valid = rows
        .iter()
        .any(|(_, row)| row.iter().any(|v| v.is_finite()));
    if rows.is_empty() || !any_valid {
        return Err(HaloError::data_unavailable(
            "no valid samples remain after cleaning",
        ));
    }
    debug!(
        input = samples.len(),
        kept = rows.len(),
        dropped_empty,
        duplicates,
        "cleaned raw samples"
    );

    let (t0_s, mut columns) = resample(&rows, config.cadence_s);
    let mut filled = 0;
    for column in &mut columns {
        filled += interpolate_column(column, config.cadence_s, config.max_gap_s);
    }
    if filled > 0 {
        notes.note(format!(
            "{filled} missing values filled by interpolation across gaps <= {} s",
            config.max_gap_s
        ));
    }

    let series = Series::new(t0_s, config.cadence_s, columns)?;
    let quality = QualityReport::from_series(&series, config);
    info!(
        rows = series.n(),
        completeness = quality.overall_completeness(),
        gaps = quality.gaps().len(),
        issues = quality.issues().len(),
        "preprocessed series"
    );

    Ok(Preprocessed {
        series,
        quality,
        notes,
    })
}

fn reject_out_of_range(rows: &mut [(i64, [f64; 4])]) -> [usize; 4] {
    let mut rejected = [0usize; 4];
    for (_, row) in rows.iter_mut() {
        for &parameter in &Parameter::ALL {
            let idx = parameter.index();
            let value = row[idx];
            if !value.is_finite() {
                continue;
            }
            let (lo, hi) = parameter.bounds();
            if value < lo || value > hi {
                row[idx] = f64::NAN;
                rejected[idx] += 1;
            }
        }
    }
    rejected
}

/// Marks values with |z| > `sigma` missing, per parameter. Columns with
/// at most `min_samples` valid values, or with zero spread, are left
/// untouched.
fn reject_outliers(rows: &mut [(i64, [f64; 4])], sigma: f64, min_samples: usize) -> [usize; 4] {
    let mut rejected = [0usize; 4];
    for &parameter in &Parameter::ALL {
        let idx = parameter.index();
        let valid: Vec<f64> = rows
            .iter()
            .map(|(_, row)| row[idx])
            .filter(|v| v.is_finite())
            .collect();
        if valid.len() <= min_samples {
            continue;
        }
        let n = valid.len() as f64;
        let mean = valid.iter().sum::<f64>() / n;
        let variance = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        if !(std.is_finite() && std > 0.0) {
            continue;
        }
        for (_, row) in rows.iter_mut() {
            let value = row[idx];
            if value.is_finite() && ((value - mean) / std).abs() > sigma {
                row[idx] = f64::NAN;
                rejected[idx] += 1;
            }
        }
    }
    rejected
}

/// Averages sorted, deduplicated rows into cadence-aligned buckets.
/// Buckets with no contributing value for a parameter stay NaN.
fn resample(rows: &[(i64, [f64; 4])], cadence_s: i64) -> (i64, [Vec<f64>; 4]) {
    let first_bucket = rows[0].0.div_euclid(cadence_s);
    let last_bucket = rows[rows.len() - 1].0.div_euclid(cadence_s);
    let n = (last_bucket - first_bucket + 1) as usize;

    let mut sums = [vec![0.0f64; n], vec![0.0; n], vec![0.0; n], vec![0.0; n]];
    let mut counts = [vec![0u32; n], vec![0; n], vec![0; n], vec![0; n]];
    for &(epoch_s, row) in rows {
        let bucket = (epoch_s.div_euclid(cadence_s) - first_bucket) as usize;
        for idx in 0..4 {
            if row[idx].is_finite() {
                sums[idx][bucket] += row[idx];
                counts[idx][bucket] += 1;
            }
        }
    }

    let columns = [0, 1, 2, 3].map(|idx| {
        sums[idx]
            .iter()
            .zip(&counts[idx])
            .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { f64::NAN })
            .collect()
    });
    (first_bucket * cadence_s, columns)
}

/// Fills interior NaN runs no longer than `max_gap_s` by linear
/// interpolation between the surrounding valid values. Runs touching
/// either end of the column are left missing. Returns the number of
/// values filled.
fn interpolate_column(column: &mut [f64], cadence_s: i64, max_gap_s: i64) -> usize {
    let mut filled = 0;
    let mut i = 0;
    while i < column.len() {
        if column[i].is_finite() {
            i += 1;
            continue;
        }
        let start = i;
        while i < column.len() && !column[i].is_finite() {
            i += 1;
        }
        if start == 0 || i == column.len() {
            continue;
        }
        let run = i - start;
        if run as i64 * cadence_s > max_gap_s {
            continue;
        }
        let lo = start - 1;
        let hi = i;
        let span = (hi - lo) as f64;
        for k in start..hi {
            let frac = (k - lo) as f64 / span;
            column[k] = column[lo] + (column[hi] - column[lo]) * frac;
        }
        filled += run;
    }
    filled
}

/// Finds runs of rows where every parameter is missing, lasting at
/// least `significant_gap_s`.
fn find_gaps(series: &Series, significant_gap_s: i64) -> Vec<GapSpan> {
    let all_missing: Vec<bool> = (0..series.n())
        .map(|i| {
            Parameter::ALL
                .iter()
                .all(|&p| !series.column(p)[i].is_finite())
        })
        .collect();

    let mut gaps = Vec::new();
    let mut i = 0;
    while i < all_missing.len() {
        if !all_missing[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < all_missing.len() && all_missing[i] {
            i += 1;
        }
        let missing_rows = i - start;
        if missing_rows as i64 * series.cadence_s() >= significant_gap_s {
            gaps.push(GapSpan {
                start_s: series.timestamp_at(start),
                end_s: series.t0_s() + series.cadence_s() * i as i64,
                missing_rows,
            });
        }
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::{preprocess, PreprocessConfig};
    use halo_core::{HaloError, Parameter, Sample};

    fn velocity_sample(epoch_s: i64, velocity: f64) -> Sample {
        Sample {
            velocity: Some(velocity),
            density: Some(5.0),
            temperature: Some(1.0e5),
            flux: Some(2.0e9),
            ..Sample::empty(epoch_s)
        }
    }

    #[test]
    fn default_config_matches_operational_settings() {
        let config = PreprocessConfig::default();
        assert_eq!(config.cadence_s, 60);
        assert_eq!(config.max_gap_s, 1800);
        assert_eq!(config.outlier_sigma, 5.0);
        assert_eq!(config.min_outlier_samples, 10);
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = PreprocessConfig::default();
        config.cadence_s = 0;
        let err = preprocess(&[velocity_sample(0, 400.0)], &config)
            .expect_err("zero cadence must fail");
        assert!(matches!(err, HaloError::InvalidConfig(_)));

        let mut config = PreprocessConfig::default();
        config.outlier_sigma = f64::NAN;
        let err = preprocess(&[velocity_sample(0, 400.0)], &config)
            .expect_err("NaN sigma must fail");
        assert!(matches!(err, HaloError::InvalidConfig(_)));
    }

    #[test]
    fn empty_input_is_data_unavailable() {
        let err = preprocess(&[], &PreprocessConfig::default())
            .expect_err("no samples must fail");
        assert!(matches!(err, HaloError::DataUnavailable(_)));
    }

    #[test]
    fn all_out_of_range_input_is_data_unavailable() {
        let samples = [
            Sample {
                velocity: Some(5000.0),
                ..Sample::empty(0)
            },
            Sample {
                velocity: Some(30.0),
                ..Sample::empty(60)
            },
        ];
        let err = preprocess(&samples, &PreprocessConfig::default())
            .expect_err("only impossible values must fail");
        assert!(matches!(err, HaloError::DataUnavailable(_)));
    }

    #[test]
    fn sorts_dedups_and_interpolates_single_gaps() {
        // Out of order, with a duplicate timestamp whose first
        // occurrence must win, and no sample in the 60 s bucket.
        let samples = [
            velocity_sample(120, 500.0),
            velocity_sample(0, 400.0),
            velocity_sample(120, 480.0),
        ];
        let out = preprocess(&samples, &PreprocessConfig::default())
            .expect("samples should preprocess");

        let velocity = out.series.column(Parameter::Velocity);
        assert_eq!(out.series.t0_s(), 0);
        assert_eq!(velocity.len(), 3);
        assert_eq!(velocity[0], 400.0);
        assert!((velocity[1] - 450.0).abs() < 1e-12);
        assert_eq!(velocity[2], 500.0);
        assert!(out
            .notes
            .warnings
            .iter()
            .any(|w| w.contains("duplicate timestamps")));
    }

    #[test]
    fn out_of_range_value_keeps_the_rest_of_the_row() {
        let samples = [Sample {
            velocity: Some(5000.0),
            density: Some(5.0),
            ..Sample::empty(0)
        }];
        let out = preprocess(&samples, &PreprocessConfig::default())
            .expect("density should survive");
        assert!(out.series.column(Parameter::Velocity)[0].is_nan());
        assert_eq!(out.series.column(Parameter::Density)[0], 5.0);
        assert!(out.notes.notes.iter().any(|n| n.contains("velocity")));
    }

    #[test]
    fn samples_in_one_bucket_are_averaged() {
        let samples = [velocity_sample(10, 400.0), velocity_sample(50, 420.0)];
        let out = preprocess(&samples, &PreprocessConfig::default())
            .expect("samples should preprocess");
        assert_eq!(out.series.n(), 1);
        assert_eq!(out.series.t0_s(), 0);
        assert!((out.series.column(Parameter::Velocity)[0] - 410.0).abs() < 1e-12);
    }

    #[test]
    fn statistical_outlier_is_removed_from_large_columns() {
        // Interpolation off so the rejected bucket stays missing.
        let config = PreprocessConfig {
            max_gap_s: 0,
            ..PreprocessConfig::default()
        };
        let mut samples: Vec<Sample> = (0..100)
            .map(|i| velocity_sample(i * 60, 400.0))
            .collect();
        samples.push(velocity_sample(100 * 60, 1150.0));
        let out = preprocess(&samples, &config).expect("samples should preprocess");

        let velocity = out.series.column(Parameter::Velocity);
        assert!(velocity[100].is_nan());
        assert!(out.notes.notes.iter().any(|n| n.contains("outliers")));
    }

    #[test]
    fn outlier_rejection_skipped_on_small_columns() {
        let config = PreprocessConfig {
            max_gap_s: 0,
            ..PreprocessConfig::default()
        };
        let mut samples: Vec<Sample> = (0..4).map(|i| velocity_sample(i * 60, 400.0)).collect();
        samples.push(velocity_sample(4 * 60, 1150.0));
        let out = preprocess(&samples, &config).expect("samples should preprocess");
        assert_eq!(out.series.column(Parameter::Velocity)[4], 1150.0);
    }

    #[test]
    fn long_gaps_stay_missing_and_are_reported() {
        // Valid rows at 0 and 40 min leave a 39-row gap, longer than
        // the 30 min interpolation limit.
        let samples = [velocity_sample(0, 400.0), velocity_sample(2400, 500.0)];
        let out = preprocess(&samples, &PreprocessConfig::default())
            .expect("samples should preprocess");

        let velocity = out.series.column(Parameter::Velocity);
        assert_eq!(velocity.len(), 41);
        assert!(velocity[1..40].iter().all(|v| v.is_nan()));

        assert_eq!(out.quality.gaps().len(), 1);
        let gap = out.quality.gaps()[0];
        assert_eq!(gap.start_s, 60);
        assert_eq!(gap.end_s, 2400);
        assert_eq!(gap.missing_rows, 39);
        assert!(!out.quality.issues().is_empty());
    }

    #[test]
    fn low_availability_is_an_issue() {
        // Flux present on only 2 of 31 rows once resampled.
        let samples: Vec<Sample> = (0..31)
            .map(|i| Sample {
                velocity: Some(400.0),
                density: Some(5.0),
                temperature: Some(1.0e5),
                flux: if i == 0 || i == 30 { Some(2.0e9) } else { None },
                ..Sample::empty(i * 60)
            })
            .collect();
        let config = PreprocessConfig {
            max_gap_s: 0,
            ..PreprocessConfig::default()
        };
        let out = preprocess(&samples, &config).expect("samples should preprocess");
        assert!(out.quality.availability(Parameter::Flux) < 0.1);
        assert!(out
            .quality
            .issues()
            .iter()
            .any(|issue| issue.contains("flux")));
    }

    #[test]
    fn boundary_gaps_are_never_extrapolated() {
        let samples = [
            Sample {
                velocity: Some(400.0),
                density: None,
                ..Sample::empty(0)
            },
            Sample {
                velocity: Some(410.0),
                density: Some(5.0),
                ..Sample::empty(120)
            },
        ];
        let out = preprocess(&samples, &PreprocessConfig::default())
            .expect("samples should preprocess");
        let density = out.series.column(Parameter::Density);
        // Leading missing density rows stay missing.
        assert!(density[0].is_nan());
        assert!(density[1].is_nan());
        assert_eq!(density[2], 5.0);
    }
}
