// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation of detection output against the labeled catalog.
//!
//! Produces per-policy confusion counts, threshold metrics with
//! zero-denominator guards, and a trapezoidal ROC AUC where the labels
//! carry both classes. Degenerate inputs yield zeros or `None`, never
//! errors; the only rejected input is a label vector of the wrong
//! length.

#![forbid(unsafe_code)]

use halo_core::HaloError;
use halo_detect::{DetectionTable, PolicyOutcome};
use tracing::info;

/// Raw detection counts against the labels.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

/// Metrics of one detection policy. Ratios with a zero denominator
/// default to 0.0; AUC is `None` when the labels are single-class.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolicyMetrics {
    pub confusion: ConfusionMatrix,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
    pub auc: Option<f64>,
}

/// Per-policy metrics for one detection run; a policy the run did not
/// execute is `None`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValidationReport {
    statistical: Option<PolicyMetrics>,
    ml: Option<PolicyMetrics>,
    hybrid: Option<PolicyMetrics>,
}

impl ValidationReport {
    pub fn statistical(&self) -> Option<&PolicyMetrics> {
        self.statistical.as_ref()
    }

    pub fn ml(&self) -> Option<&PolicyMetrics> {
        self.ml.as_ref()
    }

    pub fn hybrid(&self) -> Option<&PolicyMetrics> {
        self.hybrid.as_ref()
    }
}

/// Scores every executed policy in `table` against the row labels.
pub fn validate(table: &DetectionTable, labels: &[bool]) -> Result<ValidationReport, HaloError> {
    if labels.len() != table.n() {
        return Err(HaloError::invalid_input(format!(
            "label count {} does not match {} detection rows",
            labels.len(),
            table.n()
        )));
    }

    let score = |outcome: Option<&PolicyOutcome>| {
        outcome.map(|o| policy_metrics(o.flags(), o.confidence(), labels))
    };
    let report = ValidationReport {
        statistical: score(table.statistical()),
        ml: score(table.ml()),
        hybrid: score(table.hybrid()),
    };
    info!(
        rows = table.n(),
        positives = labels.iter().filter(|&&l| l).count(),
        statistical_f1 = ?report.statistical.map(|m| m.f1),
        ml_f1 = ?report.ml.map(|m| m.f1),
        hybrid_f1 = ?report.hybrid.map(|m| m.f1),
        "validated detection run"
    );
    Ok(report)
}

fn policy_metrics(flags: &[bool], confidence: &[f64], labels: &[bool]) -> PolicyMetrics {
    let mut confusion = ConfusionMatrix::default();
    for (&flag, &label) in flags.iter().zip(labels) {
        match (flag, label) {
            (true, true) => confusion.true_positives += 1,
            (true, false) => confusion.false_positives += 1,
            (false, false) => confusion.true_negatives += 1,
            (false, true) => confusion.false_negatives += 1,
        }
    }

    let precision = guarded_ratio(
        confusion.true_positives,
        confusion.true_positives + confusion.false_positives,
    );
    let recall = guarded_ratio(
        confusion.true_positives,
        confusion.true_positives + confusion.false_negatives,
    );
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    let accuracy = guarded_ratio(
        confusion.true_positives + confusion.true_negatives,
        labels.len(),
    );

    PolicyMetrics {
        confusion,
        precision,
        recall,
        f1,
        accuracy,
        auc: roc_auc(confidence, labels),
    }
}

fn guarded_ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Trapezoidal area under the ROC curve swept over the unique
/// confidence values, descending. `None` when either class is absent.
fn roc_auc(confidence: &[f64], labels: &[bool]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut scored: Vec<(f64, bool)> = confidence
        .iter()
        .zip(labels)
        .map(|(&c, &l)| (if c.is_finite() { c } else { 0.0 }, l))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut auc = 0.0;
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut prev_tpr = 0.0;
    let mut prev_fpr = 0.0;
    let mut i = 0;
    while i < scored.len() {
        let score = scored[i].0;
        while i < scored.len() && scored[i].0 == score {
            if scored[i].1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let tpr = tp as f64 / positives as f64;
        let fpr = fp as f64 / negatives as f64;
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_tpr = tpr;
        prev_fpr = fpr;
    }
    Some(auc)
}
