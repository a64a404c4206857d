// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Supervised half of calibration: scaling, stratified splitting,
//! balanced class weights, and the ROC sweep that picks the decision
//! threshold.

use halo_core::{HaloError, RunNotes};
use tracing::debug;

use crate::forest::{self, ForestParams, RandomForest};
use crate::rng::StableRng;

/// Per-feature standardization fitted on the training split only.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    /// Fits mean and population standard deviation per column over the
    /// selected rows. Constant columns scale by one so they pass
    /// through centered instead of exploding.
    fn fit(design: &[Vec<f64>], rows: &[usize]) -> Self {
        let width = design.first().map_or(0, Vec::len);
        let n = rows.len() as f64;
        let mut mean = vec![0.0; width];
        for &r in rows {
            for (m, &v) in mean.iter_mut().zip(&design[r]) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }
        let mut std = vec![0.0; width];
        for &r in rows {
            for (j, &v) in design[r].iter().enumerate() {
                std[j] += (v - mean[j]).powi(2);
            }
        }
        for s in &mut std {
            *s = (*s / n).sqrt();
            if !(s.is_finite() && *s > 0.0) {
                *s = 1.0;
            }
        }
        Self { mean, std }
    }

    pub(crate) fn transform_row(&self, row: &mut [f64]) {
        for (j, value) in row.iter_mut().enumerate() {
            *value = (*value - self.mean[j]) / self.std[j];
        }
    }
}

/// Everything the supervised path produces for the artifact.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TrainOutcome {
    pub forest: RandomForest,
    pub scaler: StandardScaler,
    pub probability_threshold: f64,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
}

/// Deterministic stratified split: each class is shuffled separately
/// and cut at the train fraction, so both splits keep the class ratio.
/// Classes with at least two members land on both sides; singletons go
/// to the training split.
fn stratified_split(
    labels: &[bool],
    train_fraction: f64,
    rng: &mut StableRng,
) -> Result<(Vec<usize>, Vec<usize>), HaloError> {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in [false, true] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        rng.shuffle(&mut members)?;
        let take = if members.len() == 1 {
            1
        } else {
            ((train_fraction * members.len() as f64).round() as usize)
                .clamp(1, members.len() - 1)
        };
        train.extend_from_slice(&members[..take]);
        test.extend_from_slice(&members[take..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Balanced class weight per row: `n / (2 * n_class)` over the
/// training rows, countering the rarity of CME periods.
fn balanced_weights(labels: &[bool], train: &[usize]) -> Vec<f64> {
    let positives = train.iter().filter(|&&i| labels[i]).count();
    let negatives = train.len() - positives;
    let weight_of = |positive: bool| {
        let class_count = if positive { positives } else { negatives };
        if class_count == 0 {
            return 0.0;
        }
        train.len() as f64 / (2.0 * class_count as f64)
    };
    train.iter().map(|&i| weight_of(labels[i])).collect()
}

/// Picks the probability cutoff maximizing Youden's index
/// (`tpr - fpr`) on held-out scores, with detection semantics
/// (positive when probability strictly exceeds the cutoff). Falls back
/// to 0.5 with a warning when the held-out split is single-class.
fn youden_threshold(scores: &[f64], labels: &[bool], notes: &mut RunNotes) -> f64 {
    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        notes.warn("held-out split is single-class; probability threshold defaults to 0.5");
        return 0.5;
    }

    let mut candidates: Vec<f64> = scores.to_vec();
    candidates.push(0.0);
    candidates.sort_by(|a, b| b.total_cmp(a));
    candidates.dedup();

    let mut best_threshold = 0.5;
    let mut best_index = f64::NEG_INFINITY;
    for &threshold in &candidates {
        let mut tp = 0usize;
        let mut fp = 0usize;
        for (&score, &label) in scores.iter().zip(labels) {
            if score > threshold {
                if label {
                    tp += 1;
                } else {
                    fp += 1;
                }
            }
        }
        let index = tp as f64 / positives as f64 - fp as f64 / negatives as f64;
        if index > best_index {
            best_index = index;
            best_threshold = threshold;
        }
    }
    best_threshold
}

fn accuracy(scores: &[f64], labels: &[bool]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = scores
        .iter()
        .zip(labels)
        .filter(|&(&s, &l)| (s > 0.5) == l)
        .count();
    correct as f64 / labels.len() as f64
}

/// Trains the classifier on an already-assembled design matrix
/// (missing values filled with zero by the caller).
pub(crate) fn train_model(
    design: &[Vec<f64>],
    labels: &[bool],
    params: &ForestParams,
    train_fraction: f64,
    seed: u64,
    notes: &mut RunNotes,
) -> Result<TrainOutcome, HaloError> {
    let mut rng = StableRng::new(seed);
    let (train, test) = stratified_split(labels, train_fraction, &mut rng)?;
    if train.is_empty() || test.is_empty() {
        return Err(HaloError::invalid_input(
            "stratified split produced an empty train or test set",
        ));
    }

    let scaler = StandardScaler::fit(design, &train);
    let scale_rows = |rows: &[usize]| -> Vec<Vec<f64>> {
        rows.iter()
            .map(|&r| {
                let mut row = design[r].clone();
                scaler.transform_row(&mut row);
                row
            })
            .collect()
    };
    let x_train = scale_rows(&train);
    let x_test = scale_rows(&test);
    let y_train: Vec<bool> = train.iter().map(|&i| labels[i]).collect();
    let y_test: Vec<bool> = test.iter().map(|&i| labels[i]).collect();
    let weights = balanced_weights(labels, &train);

    let forest = forest::fit(&x_train, &y_train, &weights, params, seed)?;

    let score_all = |rows: &[Vec<f64>]| -> Result<Vec<f64>, HaloError> {
        rows.iter().map(|row| forest.predict_proba(row)).collect()
    };
    let train_scores = score_all(&x_train)?;
    let test_scores = score_all(&x_test)?;

    let probability_threshold = youden_threshold(&test_scores, &y_test, notes);
    let train_accuracy = accuracy(&train_scores, &y_train);
    let test_accuracy = accuracy(&test_scores, &y_test);
    debug!(
        train_rows = train.len(),
        test_rows = test.len(),
        probability_threshold,
        train_accuracy,
        test_accuracy,
        "trained classifier"
    );

    Ok(TrainOutcome {
        forest,
        scaler,
        probability_threshold,
        train_accuracy,
        test_accuracy,
    })
}
