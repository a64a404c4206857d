// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-row detection over a calibrated artifact.
//!
//! Detection is a pure function of the feature matrix, the calibration
//! artifact, and the method selector. Each row is classified
//! independently; re-running on unchanged inputs reproduces the table
//! bit for bit.

#![forbid(unsafe_code)]

use halo_calibrate::{CalibrationArtifact, CalibrationMethod, MlArtifact, ThresholdSet};
use halo_core::{HaloError, RunNotes};
use halo_features::FeatureMatrix;
use tracing::info;

/// Votes required before the statistical policy fires. One exceeded
/// threshold alone is treated as single-parameter noise.
pub const MIN_VOTES: usize = 2;

/// Flags and confidences of one policy, row-aligned with the matrix.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyOutcome {
    flags: Vec<bool>,
    confidence: Vec<f64>,
}

impl PolicyOutcome {
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn confidence(&self) -> &[f64] {
        &self.confidence
    }

    /// Number of flagged rows.
    pub fn detections(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }
}

/// Output of [`detect`]: one outcome per executed policy.
///
/// A statistical run carries only the statistical outcome, an ml run
/// only the model outcome; a hybrid run carries all three so the fused
/// result can be compared against its inputs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionTable {
    t0_s: i64,
    cadence_s: i64,
    n: usize,
    statistical: Option<PolicyOutcome>,
    ml: Option<PolicyOutcome>,
    hybrid: Option<PolicyOutcome>,
    notes: RunNotes,
}

impl DetectionTable {
    pub fn n(&self) -> usize {
        self.n
    }

    /// Timestamp of row `i` in Unix epoch seconds.
    pub fn timestamp_at(&self, i: usize) -> i64 {
        self.t0_s + self.cadence_s * i as i64
    }

    pub fn statistical(&self) -> Option<&PolicyOutcome> {
        self.statistical.as_ref()
    }

    pub fn ml(&self) -> Option<&PolicyOutcome> {
        self.ml.as_ref()
    }

    pub fn hybrid(&self) -> Option<&PolicyOutcome> {
        self.hybrid.as_ref()
    }

    pub fn notes(&self) -> &RunNotes {
        &self.notes
    }
}

/// Runs the selected detection method over the matrix.
///
/// The `ml` method errors with [`HaloError::MissingModel`] when the
/// artifact has no trained classifier; a `hybrid` run instead degrades
/// to its statistical half with a warning so the run still completes.
pub fn detect(
    matrix: &FeatureMatrix,
    artifact: &CalibrationArtifact,
    method: CalibrationMethod,
) -> Result<DetectionTable, HaloError> {
    let mut notes = RunNotes::new();

    let statistical = match method {
        CalibrationMethod::Statistical | CalibrationMethod::Hybrid => Some(
            statistical_policy(matrix, artifact.thresholds(), &mut notes),
        ),
        CalibrationMethod::Ml => None,
    };

    let ml = if method.wants_model() {
        match artifact.ml() {
            Some(model) => Some(ml_policy(matrix, model)?),
            None if method == CalibrationMethod::Ml => {
                return Err(HaloError::missing_model(
                    "ml detection requested but calibration produced no classifier",
                ));
            }
            None => None,
        }
    } else {
        None
    };

    let hybrid = if method == CalibrationMethod::Hybrid {
        match (&statistical, &ml) {
            (Some(stat), Some(model)) => Some(fuse(stat, model)),
            (Some(stat), None) => {
                notes.warn("hybrid run degraded to statistical: no calibrated classifier");
                Some(stat.clone())
            }
            _ => None,
        }
    } else {
        None
    };

    let table = DetectionTable {
        t0_s: matrix.t0_s(),
        cadence_s: matrix.cadence_s(),
        n: matrix.n(),
        statistical,
        ml,
        hybrid,
        notes,
    };
    info!(
        method = method.as_str(),
        rows = table.n,
        statistical = ?table.statistical.as_ref().map(PolicyOutcome::detections),
        ml = ?table.ml.as_ref().map(PolicyOutcome::detections),
        hybrid = ?table.hybrid.as_ref().map(PolicyOutcome::detections),
        "detection complete"
    );
    Ok(table)
}

/// Corroborating-vote policy: a row fires when at least [`MIN_VOTES`]
/// thresholds are strictly exceeded. Confidence is the vote count over
/// the denominator pinned at calibration time; an empty threshold set
/// yields all-clear with zero confidence.
fn statistical_policy(
    matrix: &FeatureMatrix,
    thresholds: &ThresholdSet,
    notes: &mut RunNotes,
) -> PolicyOutcome {
    let denominator = thresholds.len();
    if denominator == 0 {
        notes.warn("empty threshold set; statistical policy cannot fire");
        return PolicyOutcome {
            flags: vec![false; matrix.n()],
            confidence: vec![0.0; matrix.n()],
        };
    }

    let columns: Vec<(Option<&[f64]>, f64)> = thresholds
        .entries()
        .iter()
        .map(|&(id, threshold)| (matrix.column(id), threshold))
        .collect();

    let mut flags = Vec::with_capacity(matrix.n());
    let mut confidence = Vec::with_capacity(matrix.n());
    for i in 0..matrix.n() {
        let votes = columns
            .iter()
            .filter(|(column, threshold)| {
                column.map_or(false, |values| {
                    values[i].is_finite() && values[i] > *threshold
                })
            })
            .count();
        flags.push(votes >= MIN_VOTES);
        confidence.push(votes as f64 / denominator as f64);
    }
    PolicyOutcome { flags, confidence }
}

/// Classifier policy: probability per row against the calibrated
/// cutoff. Columns the classifier was trained on but the matrix lacks
/// contribute zero, like missing values did during training.
fn ml_policy(matrix: &FeatureMatrix, model: &MlArtifact) -> Result<PolicyOutcome, HaloError> {
    let columns: Vec<Option<&[f64]>> = model
        .feature_ids()
        .iter()
        .map(|&id| matrix.column(id))
        .collect();

    let threshold = model.probability_threshold();
    let mut flags = Vec::with_capacity(matrix.n());
    let mut confidence = Vec::with_capacity(matrix.n());
    let mut row = vec![0.0; columns.len()];
    for i in 0..matrix.n() {
        for (slot, column) in row.iter_mut().zip(&columns) {
            *slot = column.map_or(0.0, |values| values[i]);
        }
        let probability = model.predict_row(&row)?;
        flags.push(probability > threshold);
        confidence.push(probability);
    }
    Ok(PolicyOutcome { flags, confidence })
}

/// Hybrid fusion: OR on flags, element-wise max on confidence.
fn fuse(stat: &PolicyOutcome, ml: &PolicyOutcome) -> PolicyOutcome {
    let flags = stat
        .flags
        .iter()
        .zip(&ml.flags)
        .map(|(&a, &b)| a || b)
        .collect();
    let confidence = stat
        .confidence
        .iter()
        .zip(&ml.confidence)
        .map(|(&a, &b)| a.max(b))
        .collect();
    PolicyOutcome { flags, confidence }
}
