// SPDX-License-Identifier: MIT OR Apache-2.0

//! Threshold calibration against a labeled feature matrix.
//!
//! Produces an immutable [`CalibrationArtifact`]: percentile thresholds
//! for the key statistical features, computed on background rows only,
//! plus (for the model-based and hybrid methods) a trained classifier
//! with its fitted scaler, decision threshold, and ranked feature
//! importances. Detection consumes the artifact as-is; nothing in it is
//! mutated afterwards.

#![forbid(unsafe_code)]

mod forest;
mod model;
mod rng;

pub use model::StandardScaler;

use std::fmt;
use std::str::FromStr;

use halo_core::{HaloError, RunNotes};
use halo_features::{FeatureId, FeatureMatrix, KEY_FEATURES};
use halo_label::LabeledFeatureMatrix;
use tracing::info;

use forest::{ForestParams, RandomForest};

/// Which calibration and detection strategy a run uses.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibrationMethod {
    /// Percentile thresholds with corroborating votes.
    Statistical,
    /// Trained classifier with a calibrated probability cutoff.
    Ml,
    /// Both, fused by OR on flags and max on confidence.
    Hybrid,
}

impl CalibrationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CalibrationMethod::Statistical => "statistical",
            CalibrationMethod::Ml => "ml",
            CalibrationMethod::Hybrid => "hybrid",
        }
    }

    /// True when the method needs a trained classifier.
    pub fn wants_model(self) -> bool {
        matches!(self, CalibrationMethod::Ml | CalibrationMethod::Hybrid)
    }
}

impl fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalibrationMethod {
    type Err = HaloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "statistical" => Ok(CalibrationMethod::Statistical),
            "ml" => Ok(CalibrationMethod::Ml),
            "hybrid" => Ok(CalibrationMethod::Hybrid),
            other => Err(HaloError::invalid_config(format!(
                "unknown calibration method {other:?}; expected statistical, ml, or hybrid"
            ))),
        }
    }
}

/// Configuration for [`calibrate`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationConfig {
    pub method: CalibrationMethod,
    /// Percentile of the background distribution used as threshold.
    pub percentile: f64,
    /// Seed for the stratified split and the forest.
    pub seed: u64,
    /// Fraction of rows in the training split.
    pub train_fraction: f64,
    pub trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            method: CalibrationMethod::Hybrid,
            percentile: 95.0,
            seed: 42,
            train_fraction: 0.7,
            trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
        }
    }
}

impl CalibrationConfig {
    fn validate(&self) -> Result<(), HaloError> {
        if !self.percentile.is_finite() || !(0.0..=100.0).contains(&self.percentile) {
            return Err(HaloError::invalid_config(format!(
                "percentile must be in [0, 100], got {}",
                self.percentile
            )));
        }
        if !self.train_fraction.is_finite() || !(0.0 < self.train_fraction && self.train_fraction < 1.0)
        {
            return Err(HaloError::invalid_config(format!(
                "train_fraction must be in (0, 1), got {}",
                self.train_fraction
            )));
        }
        if self.trees == 0 || self.max_depth == 0 || self.min_samples_split < 2 || self.min_samples_leaf == 0
        {
            return Err(HaloError::invalid_config(
                "forest parameters must be positive (trees, max_depth, min_samples_leaf) with min_samples_split >= 2",
            ));
        }
        Ok(())
    }

    fn forest_params(&self) -> ForestParams {
        ForestParams {
            trees: self.trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Background-percentile thresholds for the key statistical features.
///
/// The entry count is captured here at calibration time and serves as
/// the fixed vote denominator during detection, so confidences stay
/// comparable across runs even if a feature had to be skipped.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ThresholdSet {
    entries: Vec<(FeatureId, f64)>,
}

impl ThresholdSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key-feature order.
    pub fn entries(&self) -> &[(FeatureId, f64)] {
        &self.entries
    }

    pub fn threshold(&self, id: FeatureId) -> Option<f64> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|&(_, threshold)| threshold)
    }
}

/// The trained half of a calibration artifact.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct MlArtifact {
    forest: RandomForest,
    scaler: StandardScaler,
    feature_ids: Vec<FeatureId>,
    probability_threshold: f64,
    train_accuracy: f64,
    test_accuracy: f64,
    feature_importance: Vec<(FeatureId, f64)>,
}

impl MlArtifact {
    /// Columns the classifier was trained on, in design-matrix order.
    pub fn feature_ids(&self) -> &[FeatureId] {
        &self.feature_ids
    }

    /// Calibrated probability cutoff (Youden's index on the held-out
    /// split).
    pub fn probability_threshold(&self) -> f64 {
        self.probability_threshold
    }

    pub fn train_accuracy(&self) -> f64 {
        self.train_accuracy
    }

    pub fn test_accuracy(&self) -> f64 {
        self.test_accuracy
    }

    /// Importances ranked descending.
    pub fn feature_importance(&self) -> &[(FeatureId, f64)] {
        &self.feature_importance
    }

    /// Scores one raw row given in [`MlArtifact::feature_ids`] order.
    /// Missing values are filled with zero before scaling, mirroring
    /// how the training design matrix was assembled.
    pub fn predict_row(&self, raw: &[f64]) -> Result<f64, HaloError> {
        if raw.len() != self.feature_ids.len() {
            return Err(HaloError::invalid_input(format!(
                "classifier expects {} features, got {}",
                self.feature_ids.len(),
                raw.len()
            )));
        }
        let mut row: Vec<f64> = raw
            .iter()
            .map(|&v| if v.is_finite() { v } else { 0.0 })
            .collect();
        self.scaler.transform_row(&mut row);
        self.forest.predict_proba(&row)
    }
}

/// Immutable output of [`calibrate`], consumed by detection.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationArtifact {
    thresholds: ThresholdSet,
    ml: Option<MlArtifact>,
    notes: RunNotes,
}

impl CalibrationArtifact {
    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    pub fn ml(&self) -> Option<&MlArtifact> {
        self.ml.as_ref()
    }

    pub fn notes(&self) -> &RunNotes {
        &self.notes
    }
}

/// Calibrates detection thresholds against a labeled matrix.
///
/// Statistical thresholds are always computed. The classifier is
/// trained only for the `ml` and `hybrid` methods, and is skipped with
/// a warning when the labels are single-class (there is nothing to
/// separate); detection then degrades per its own policy rules.
pub fn calibrate(
    labeled: &LabeledFeatureMatrix,
    config: &CalibrationConfig,
) -> Result<CalibrationArtifact, HaloError> {
    config.validate()?;
    let mut notes = RunNotes::new();

    let thresholds = background_thresholds(
        labeled.matrix(),
        labeled.labels(),
        config.percentile,
        &mut notes,
    );

    let positives = labeled.positive_rows();
    let ml = if config.method.wants_model() {
        if positives == 0 || positives == labeled.labels().len() {
            notes.warn(format!(
                "labels are single-class ({positives} of {} positive); classifier not trained",
                labeled.labels().len()
            ));
            None
        } else {
            Some(train_artifact(labeled, config, &mut notes)?)
        }
    } else {
        None
    };

    info!(
        method = config.method.as_str(),
        thresholds = thresholds.len(),
        model = ml.is_some(),
        positives,
        "calibrated detection thresholds"
    );
    Ok(CalibrationArtifact {
        thresholds,
        ml,
        notes,
    })
}

/// Percentile of each key feature over background (unlabeled) rows.
/// Features with no finite background values are skipped with a
/// warning and shrink the vote denominator for the whole run.
fn background_thresholds(
    matrix: &FeatureMatrix,
    labels: &[bool],
    percentile: f64,
    notes: &mut RunNotes,
) -> ThresholdSet {
    let background_rows = labels.iter().filter(|&&l| !l).count();
    if background_rows == 0 {
        notes.warn("no background rows; statistical thresholds are empty");
        return ThresholdSet::default();
    }

    let mut entries = Vec::with_capacity(KEY_FEATURES.len());
    for id in KEY_FEATURES {
        let Some(column) = matrix.column(id) else {
            notes.warn(format!("key feature {} absent; skipped", id.name()));
            continue;
        };
        let mut values: Vec<f64> = column
            .iter()
            .zip(labels)
            .filter(|&(v, &l)| !l && v.is_finite())
            .map(|(&v, _)| v)
            .collect();
        if values.is_empty() {
            notes.warn(format!(
                "key feature {} has no finite background values; skipped",
                id.name()
            ));
            continue;
        }
        values.sort_by(f64::total_cmp);
        entries.push((id, percentile_of_sorted(&values, percentile)));
    }
    ThresholdSet { entries }
}

/// Percentile with linear interpolation between order statistics.
fn percentile_of_sorted(sorted: &[f64], percentile: f64) -> f64 {
    let rank = percentile / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn train_artifact(
    labeled: &LabeledFeatureMatrix,
    config: &CalibrationConfig,
    notes: &mut RunNotes,
) -> Result<MlArtifact, HaloError> {
    let matrix = labeled.matrix();
    let feature_ids: Vec<FeatureId> = matrix.ids().collect();

    // Design matrix in column order; remaining missing values become
    // zero, explicitly rather than imputed.
    let design: Vec<Vec<f64>> = (0..matrix.n())
        .map(|i| {
            matrix
                .columns()
                .iter()
                .map(|column| {
                    let v = column.values()[i];
                    if v.is_finite() {
                        v
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect();

    let outcome = model::train_model(
        &design,
        labeled.labels(),
        &config.forest_params(),
        config.train_fraction,
        config.seed,
        notes,
    )?;

    let mut feature_importance: Vec<(FeatureId, f64)> = feature_ids
        .iter()
        .copied()
        .zip(outcome.forest.importances().iter().copied())
        .collect();
    feature_importance.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(MlArtifact {
        forest: outcome.forest,
        scaler: outcome.scaler,
        feature_ids,
        probability_threshold: outcome.probability_threshold,
        train_accuracy: outcome.train_accuracy,
        test_accuracy: outcome.test_accuracy,
        feature_importance,
    })
}
